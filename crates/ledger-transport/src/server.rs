//! Server side of the single-document wire protocol (§4.5, §5).
//!
//! "Each server process is multi-threaded with one accept loop spawning
//! a handler per inbound connection." One JSON request is read per
//! connection, the handler's reply is written back, and the connection
//! is closed — no keep-alive, no pipelining.

use async_trait::async_trait;
use ledger_core::{Endpoint, LedgerError, LedgerResult, RpcRequest, RpcResponse};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Implemented by whatever owns a node's state (a Raft node, a 2PC
/// participant, the coordinator) to answer one [`RpcRequest`] at a time.
///
/// Handlers are shared across connections behind an `Arc`; the coarse
/// per-node mutex described in §5 lives *inside* the handler's own
/// state, not in this transport layer.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Answer a single request with a single reply. Must never panic;
    /// malformed or unsupported requests are answered with
    /// [`RpcResponse::Error`] rather than propagated as connection
    /// failures (§7).
    async fn handle(&self, request: RpcRequest) -> RpcResponse;

    /// Whether this node is currently willing to accept a new
    /// connection. Returns `false` while a [`SimulateCrash`]-style
    /// detachment is in effect (§4.1: "accept no new connections");
    /// defaults to always available.
    ///
    /// [`SimulateCrash`]: ledger_core::RpcRequest::SimulateCrash
    fn is_available(&self) -> bool {
        true
    }
}

/// Bind `endpoint` and run the accept loop forever, spawning one task
/// per inbound connection per §5. Returns only if binding fails.
///
/// # Errors
///
/// Returns an error if the listen port cannot be bound (§7's
/// fatal-only "inability to bind the listen port").
pub async fn serve<H: RpcHandler>(endpoint: Endpoint, handler: Arc<H>) -> LedgerResult<()> {
    let addr: std::net::SocketAddr = endpoint.into();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| LedgerError::Network(format!("bind {addr}: {err}")))?;

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        if !handler.is_available() {
            debug!(%peer_addr, "dropping connection while detached from the network");
            drop(stream);
            continue;
        }

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, handler.as_ref()).await {
                debug!(%peer_addr, %err, "connection handling failed");
            }
        });
    }
}

async fn handle_connection<H: RpcHandler>(mut stream: TcpStream, handler: &H) -> LedgerResult<()> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .await
        .map_err(|err| LedgerError::Network(err.to_string()))?;

    let response = match serde_json::from_slice::<RpcRequest>(&buf) {
        Ok(request) => handler.handle(request).await,
        Err(err) => RpcResponse::Error {
            error: format!("malformed rpc: {err}"),
        },
    };

    let payload = serde_json::to_vec(&response)?;
    stream
        .write_all(&payload)
        .await
        .map_err(|err| LedgerError::Network(err.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|err| LedgerError::Network(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::client;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct EchoHandler {
        available: AtomicBool,
    }

    #[async_trait]
    impl RpcHandler for EchoHandler {
        async fn handle(&self, request: RpcRequest) -> RpcResponse {
            match request {
                RpcRequest::GetLeaderStatus => RpcResponse::LeaderStatus { is_leader: true },
                _ => RpcResponse::Error {
                    error: "unsupported in test".to_string(),
                },
            }
        }

        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn serves_one_request_per_connection() {
        let endpoint = Endpoint::localhost(0);
        let listener = TcpListener::bind(std::net::SocketAddr::from(endpoint))
            .await
            .unwrap();
        let bound = Endpoint {
            host: endpoint.host,
            port: listener.local_addr().unwrap().port(),
        };
        drop(listener);

        let handler = Arc::new(EchoHandler {
            available: AtomicBool::new(true),
        });
        tokio::spawn(serve(bound, handler));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let response = client::call(bound, &RpcRequest::GetLeaderStatus)
            .await
            .unwrap();
        match response {
            RpcResponse::LeaderStatus { is_leader } => assert!(is_leader),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
