//! Post-execution processing.
//!
//! Computes final rates for a finished execution and reloads the history list.

use crate::api::ExecutionApi;
use crate::metrics;
use crate::model::{Execution, ExecutionStatus};
use tracing::warn;

/// Result of post-execution processing, ready for presentation layers.
pub(crate) struct ProcessedExecution {
    pub execution: Execution,
    pub history: Option<Vec<Execution>>,
    pub message: String,
}

/// Process a finished (stopped, completed or errored) execution.
pub(crate) async fn process_execution_completion<A: ExecutionApi>(
    api: &A,
    history_limit: u32,
    execution: &Execution,
) -> ProcessedExecution {
    let rates = metrics::execution_rates(execution);

    let history = match api.list_executions(history_limit, 0).await {
        Ok(list) => Some(list),
        Err(e) => {
            warn!(error = %e, "history reload failed");
            None
        }
    };

    let outcome = match execution.status {
        ExecutionStatus::Error => format!(
            "failed: {}",
            execution.error_message.as_deref().unwrap_or("unknown error")
        ),
        ExecutionStatus::Completed => "completed".to_string(),
        ExecutionStatus::Running => "stopped".to_string(),
    };
    let message = format!(
        "Execution {} {outcome}: {} searches, {} clicks, target {:.2}%, click {:.2}%",
        execution.id,
        execution.total_searches,
        execution.total_clicks,
        rates.target_rate,
        rates.click_rate
    );

    ProcessedExecution {
        execution: execution.clone(),
        history,
        message,
    }
}
