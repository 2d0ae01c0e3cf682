//! Client side of the single-document wire protocol.

use ledger_core::{Endpoint, LedgerError, LedgerResult, RpcRequest, RpcResponse};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connect timeout, per §4.5 ("Connect and read timeouts are
/// 2-3 s by default").
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default read timeout for the single reply.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Open one TCP connection, write a single JSON request, read a single
/// JSON reply, then close — exactly the framing described in §4.5 (no
/// multiplexing, no persistent connections).
///
/// # Errors
///
/// Returns [`LedgerError::Timeout`] if connecting or reading exceeds its
/// bound, and [`LedgerError::Network`] for any other I/O failure.
pub async fn call(endpoint: Endpoint, request: &RpcRequest) -> LedgerResult<RpcResponse> {
    call_with_timeouts(endpoint, request, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Same as [`call`] with explicit timeouts, used by the coordinator's
/// shorter leader-discovery probes (§4.4 uses a 2 s probe).
///
/// # Errors
///
/// See [`call`].
pub async fn call_with_timeouts(
    endpoint: Endpoint,
    request: &RpcRequest,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> LedgerResult<RpcResponse> {
    let addr: std::net::SocketAddr = endpoint.into();

    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| LedgerError::Timeout(connect_timeout))?
        .map_err(|err| LedgerError::Network(err.to_string()))?;

    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    stream
        .write_all(&payload)
        .await
        .map_err(|err| LedgerError::Network(err.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|err| LedgerError::Network(err.to_string()))?;

    let mut buf = Vec::new();
    tokio::time::timeout(read_timeout, stream.read_to_end(&mut buf))
        .await
        .map_err(|_| LedgerError::Timeout(read_timeout))?
        .map_err(|err| LedgerError::Network(err.to_string()))?;

    if buf.is_empty() {
        return Err(LedgerError::Network(format!(
            "connection to {addr} closed with no reply"
        )));
    }

    let response = serde_json::from_slice(&buf)?;
    Ok(response)
}
