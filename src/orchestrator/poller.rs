//! Fixed-interval status poller for the current execution.
//!
//! One task per tracked execution. Fetches are awaited and the next tick is
//! scheduled one interval after the fetch resolves, so requests never overlap.
//! Failed or timed-out fetches are logged and skipped.

use crate::api::ExecutionApi;
use crate::error::ConsoleError;
use crate::model::{Execution, ExecutionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// A successful status fetch, tagged with the generation that issued it.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub generation: u64,
    /// 1-based tick number within the generation.
    pub seq: u64,
    pub execution: Execution,
}

/// Parameters for spawning a poll loop.
pub(crate) struct PollerParams<A: ExecutionApi> {
    pub api: Arc<A>,
    pub id: ExecutionId,
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub generation: u64,
    pub outcome_tx: UnboundedSender<PollOutcome>,
}

/// Handle to a running poll loop. Dropping it cancels the loop.
pub(crate) struct Poller {
    handle: JoinHandle<()>,
    generation: u64,
}

impl Poller {
    pub(crate) fn spawn<A: ExecutionApi>(params: PollerParams<A>) -> Self {
        let generation = params.generation;
        let handle = tokio::spawn(poll_loop(params));
        Self { handle, generation }
    }

    /// Stop scheduling ticks. A fetch already in flight is dropped with the task.
    pub(crate) fn cancel(self) {
        debug!(generation = self.generation, "poller cancelled");
        // Drop aborts the task.
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_loop<A: ExecutionApi>(params: PollerParams<A>) {
    let PollerParams {
        api,
        id,
        interval,
        fetch_timeout,
        generation,
        outcome_tx,
    } = params;

    // The start/attach response already carries fresh counters; first tick is one interval out.
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0u64;

    loop {
        ticker.tick().await;
        seq += 1;

        let fetched = match tokio::time::timeout(fetch_timeout, api.execution_status(id)).await {
            Ok(res) => res.map_err(ConsoleError::transient),
            Err(_) => Err(ConsoleError::TransientFetch(format!(
                "no response within {}",
                humantime::format_duration(fetch_timeout)
            ))),
        };
        ticker.reset();

        match fetched {
            Ok(execution) => {
                let terminal = execution.status.is_terminal();
                let outcome = PollOutcome {
                    generation,
                    seq,
                    execution,
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
                if terminal {
                    debug!(execution_id = %id, generation, "terminal status observed; poller exiting");
                    break;
                }
            }
            Err(e) => {
                warn!(execution_id = %id, tick = seq, error = %e, "status poll failed; retrying next tick");
            }
        }
    }
}
