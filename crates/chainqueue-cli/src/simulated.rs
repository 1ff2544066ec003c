//! Simulated chain handlers for the demo driver.
//!
//! Every operation waits `latency` split over two stages and fails its first
//! `failing_attempts` attempts with a transient error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use chainqueue_core::domain::TaskKind;
use chainqueue_core::{OperationError, Task, TaskContext};
use chainqueue_core::typed::Handler;

#[derive(Debug, Clone)]
pub struct SimulatedChain {
    pub latency: Duration,
    pub failing_attempts: u32,
}

#[async_trait]
impl<T: Task> Handler<T> for SimulatedChain {
    async fn handle(&self, _task: &T, ctx: &TaskContext) -> Result<serde_json::Value, OperationError> {
        ctx.report_progress("signing transaction").await;
        tokio::time::sleep(self.latency / 2).await;

        if ctx.attempt() <= self.failing_attempts {
            return Err(OperationError::transient(format!(
                "rpc endpoint timed out (attempt {})",
                ctx.attempt()
            )));
        }

        ctx.report_progress("waiting for confirmation").await;
        tokio::time::sleep(self.latency / 2).await;

        let tx_hash = format!("0x{:0>64}", ctx.task_id().as_ulid().to_string().to_lowercase());
        Ok(match T::KIND {
            TaskKind::CreateMarket => {
                json!({ "market_id": format!("market-{}", ctx.task_id().as_ulid()), "tx_hash": tx_hash })
            }
            TaskKind::PlaceBet => json!({ "tx_hash": tx_hash, "shares": "9.42" }),
            TaskKind::SubmitAnswer => json!({ "tx_hash": tx_hash, "bond_xdai": 0.01 }),
            TaskKind::ResearchAndSubmit => {
                json!({ "outcome": "Yes", "confidence": 0.82, "tx_hash": tx_hash })
            }
            TaskKind::FinalizeResolution => json!({ "tx_hash": tx_hash, "resolved": true }),
        })
    }
}

/// A representative JSON payload for `kind`.
pub fn sample_payload(kind: TaskKind, n: usize) -> serde_json::Value {
    let market_id = format!("0x{n:040x}");
    let demo_key = "0x0000000000000000000000000000000000000000000000000000000000000001";
    match kind {
        TaskKind::CreateMarket => json!({
            "application_id": format!("app-{n}"),
            "application_details": {
                "project_name": format!("Project {n}"),
                "funding_program": "Gitcoin Grants",
                "requested_amount_usd": 5000
            }
        }),
        TaskKind::PlaceBet => json!({
            "market_id": market_id,
            "amount_usd": 5.0,
            "outcome": "Yes",
            "from_private_key": demo_key
        }),
        TaskKind::SubmitAnswer => json!({
            "market_id": market_id,
            "outcome": "No",
            "confidence": 0.7,
            "reasoning": "no public milestone report found",
            "from_private_key": demo_key
        }),
        TaskKind::ResearchAndSubmit => json!({
            "market_id": market_id,
            "application_id": format!("app-{n}"),
            "funding_program_name": "Gitcoin Grants"
        }),
        TaskKind::FinalizeResolution => json!({
            "market_id": market_id,
            "from_private_key": demo_key
        }),
    }
}
