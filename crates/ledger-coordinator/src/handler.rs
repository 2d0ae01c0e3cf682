//! The coordinator process's RPC surface: it serves only `2pc_request`
//! (§4.4); every other `RpcRequest` variant is a cluster-node concern.

use async_trait::async_trait;
use ledger_core::{RpcRequest, RpcResponse, SimulationScenario};
use ledger_transport::RpcHandler;
use tracing::warn;

use crate::driver::Coordinator;

#[async_trait]
impl RpcHandler for Coordinator {
    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        match request {
            RpcRequest::TwoPcRequest {
                transactions,
                simulation_num,
            } => {
                let scenario = SimulationScenario::from_wire_tag(simulation_num).unwrap_or_else(|tag| {
                    warn!(tag, "unrecognized simulation_num, treating as None");
                    SimulationScenario::None
                });
                let outcome = self.run_transaction(transactions, scenario).await;
                RpcResponse::TwoPcResult {
                    status: outcome.wire_status().to_string(),
                }
            }
            other => RpcResponse::Error {
                error: format!("{other:?} is not served by the coordinator"),
            },
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}
