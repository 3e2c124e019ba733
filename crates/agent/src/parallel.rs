//! Parallel fan-out over independent agents.

use crate::loop_runner::AgentLoop;
use agentloom_core::error::{AgentError, Error};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Run one turn on each agent concurrently, pairing `agents[i]` with
/// `inputs[i]`, and wait for all of them.
///
/// On success the outputs come back positionally. If any agent fails,
/// *every* error is aggregated into one `AgentError::Parallel` — not just
/// the first.
pub async fn run_parallel(
    agents: &[Arc<AgentLoop>],
    inputs: &[String],
) -> Result<Vec<String>, Error> {
    if agents.len() != inputs.len() {
        return Err(Error::Internal(format!(
            "run_parallel: {} agents but {} inputs",
            agents.len(),
            inputs.len()
        )));
    }

    debug!(count = agents.len(), "Fanning out parallel agent runs");

    let futures = agents.iter().zip(inputs.iter()).map(|(agent, input)| {
        let agent = agent.clone();
        let input = input.clone();
        async move { agent.run(&input).await }
    });

    let results = join_all(futures).await;

    let mut outputs = vec![String::new(); results.len()];
    let mut failures = Vec::new();
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(output) => outputs[i] = output,
            Err(e) => failures.push(e),
        }
    }

    if failures.is_empty() {
        Ok(outputs)
    } else {
        Err(AgentError::Parallel {
            total: agents.len(),
            failures,
        }
        .into())
    }
}
