//! Execution lifecycle controller.
//!
//! Owns the single current execution and its poller. Every operation takes
//! `&mut self`, so start/stop/poll application never interleave on one instance;
//! a poll response is only applied if it carries the current generation.

use super::poller::{PollOutcome, Poller, PollerParams};
use crate::api::ExecutionApi;
use crate::error::{ConsoleError, Result};
use crate::model::{ConsoleEvent, Execution, ExecutionId, ExecutionMode, ExecutionStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    Idle,
    Starting,
    Running,
    Stopping,
    Error,
}

impl ControllerState {
    /// States from which a new execution may be started.
    pub fn accepts_start(self) -> bool {
        matches!(self, ControllerState::Idle | ControllerState::Error)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Starting => "starting",
            ControllerState::Running => "running",
            ControllerState::Stopping => "stopping",
            ControllerState::Error => "error",
        };
        f.write_str(s)
    }
}

/// What applying a poll outcome did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollApplied {
    Updated,
    Finished(ExecutionStatus),
    /// Stale generation, out-of-order tick, or no longer running.
    Discarded,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ExecutionController<A: ExecutionApi> {
    api: Arc<A>,
    settings: PollSettings,
    state: ControllerState,
    current: Option<Execution>,
    last_finished: Option<Execution>,
    last_error: Option<String>,
    generation: u64,
    last_seq: u64,
    poller: Option<Poller>,
    outcome_tx: UnboundedSender<PollOutcome>,
    outcome_rx: UnboundedReceiver<PollOutcome>,
    event_tx: Option<UnboundedSender<ConsoleEvent>>,
}

impl<A: ExecutionApi> ExecutionController<A> {
    pub fn new(api: Arc<A>, settings: PollSettings) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            api,
            settings,
            state: ControllerState::Idle,
            current: None,
            last_finished: None,
            last_error: None,
            generation: 0,
            last_seq: 0,
            poller: None,
            outcome_tx,
            outcome_rx,
            event_tx: None,
        }
    }

    /// Publish state and execution changes on `event_tx`.
    pub fn with_events(mut self, event_tx: UnboundedSender<ConsoleEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Last-known snapshot of the current execution; at most one poll interval stale.
    pub fn current(&self) -> Option<&Execution> {
        self.current.as_ref()
    }

    /// Final snapshot of the most recently stopped or finished execution.
    pub fn last_finished(&self) -> Option<&Execution> {
        self.last_finished.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Start a new execution. Rejected with `Conflict` unless idle or errored.
    pub async fn start(&mut self, mode: ExecutionMode) -> Result<Execution> {
        self.ensure_can_start()?;
        self.last_error = None;
        self.set_state(ControllerState::Starting);

        match self.api.start_execution(mode).await {
            Ok(execution) => {
                info!(execution_id = %execution.id, mode = mode.as_str(), "execution started");
                self.track(execution.clone());
                Ok(execution)
            }
            Err(e) => {
                warn!(error = %e, "execution start failed");
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Adopt an execution started elsewhere and poll it like our own.
    pub async fn attach(&mut self, id: ExecutionId) -> Result<Execution> {
        self.ensure_can_start()?;
        self.last_error = None;
        self.set_state(ControllerState::Starting);

        match self.api.execution_status(id).await {
            Ok(execution) => {
                info!(execution_id = %id, status = execution.status.as_str(), "attached to execution");
                self.track(execution.clone());
                Ok(execution)
            }
            Err(e) => {
                warn!(execution_id = %id, error = %e, "attach failed");
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop the current execution. Polling is cancelled before the stop request is sent.
    pub async fn stop(&mut self) -> Result<Execution> {
        let Some(current) = self.current.clone() else {
            return Err(ConsoleError::NotRunning);
        };

        self.cancel_polling();
        self.set_state(ControllerState::Stopping);

        match self.api.stop_execution(current.id).await {
            Ok(()) => {
                info!(execution_id = %current.id, "execution stopped");
                self.current = None;
                self.last_finished = Some(current.clone());
                self.set_state(ControllerState::Idle);
                self.emit(ConsoleEvent::ExecutionFinished {
                    execution: Box::new(current.clone()),
                });
                Ok(current)
            }
            Err(e) => {
                // The job is presumably still alive: keep tracking it so stop can be retried.
                warn!(execution_id = %current.id, error = %e, "stop failed; resuming polling");
                self.set_state(ControllerState::Running);
                self.spawn_poller(current.id);
                Err(e)
            }
        }
    }

    /// Wait for the next poll outcome. Cancel-safe.
    pub async fn next_poll(&mut self) -> PollOutcome {
        loop {
            // The controller holds a sender, so the channel never closes.
            if let Some(outcome) = self.outcome_rx.recv().await {
                return outcome;
            }
        }
    }

    /// Merge a poll outcome into the current execution, driving terminal transitions.
    pub fn apply_poll(&mut self, outcome: PollOutcome) -> PollApplied {
        if outcome.generation != self.generation || self.state != ControllerState::Running {
            debug!(
                outcome_generation = outcome.generation,
                generation = self.generation,
                state = %self.state,
                "discarding stale poll response"
            );
            return PollApplied::Discarded;
        }
        if outcome.seq <= self.last_seq {
            debug!(seq = outcome.seq, last_seq = self.last_seq, "discarding out-of-order poll response");
            return PollApplied::Discarded;
        }
        let Some(current) = self.current.as_mut() else {
            return PollApplied::Discarded;
        };
        if outcome.execution.id != current.id {
            warn!(expected = %current.id, got = %outcome.execution.id, "poll response for another execution");
            return PollApplied::Discarded;
        }

        self.last_seq = outcome.seq;
        *current = outcome.execution.clone();
        self.emit(ConsoleEvent::ExecutionUpdated {
            execution: Box::new(outcome.execution.clone()),
        });

        let status = outcome.execution.status;
        if status.is_terminal() {
            self.finish(outcome.execution);
            return PollApplied::Finished(status);
        }
        PollApplied::Updated
    }

    /// `next_poll` followed by `apply_poll`.
    pub async fn pump(&mut self) -> PollApplied {
        let outcome = self.next_poll().await;
        self.apply_poll(outcome)
    }

    /// Cancel polling without contacting the remote service.
    pub fn shutdown(&mut self) {
        self.cancel_polling();
    }

    fn ensure_can_start(&self) -> Result<()> {
        if self.state.accepts_start() {
            return Ok(());
        }
        warn!(state = %self.state, "start rejected: an execution is already current");
        Err(ConsoleError::Conflict { state: self.state })
    }

    fn track(&mut self, execution: Execution) {
        self.current = Some(execution.clone());
        self.emit(ConsoleEvent::ExecutionUpdated {
            execution: Box::new(execution.clone()),
        });
        if execution.status.is_terminal() {
            self.finish(execution);
            return;
        }
        self.set_state(ControllerState::Running);
        self.spawn_poller(execution.id);
    }

    fn finish(&mut self, execution: Execution) {
        self.cancel_polling();
        self.current = None;
        info!(execution_id = %execution.id, status = execution.status.as_str(), "execution finished");
        self.last_finished = Some(execution.clone());
        if execution.status == ExecutionStatus::Error {
            let message = execution
                .error_message
                .clone()
                .unwrap_or_else(|| "execution failed".to_string());
            self.fail(message);
        } else {
            self.set_state(ControllerState::Idle);
        }
        self.emit(ConsoleEvent::ExecutionFinished {
            execution: Box::new(execution),
        });
    }

    fn fail(&mut self, message: String) {
        self.last_error = Some(message);
        self.set_state(ControllerState::Error);
    }

    fn spawn_poller(&mut self, id: ExecutionId) {
        self.generation += 1;
        self.last_seq = 0;
        self.poller = Some(Poller::spawn(PollerParams {
            api: self.api.clone(),
            id,
            interval: self.settings.interval,
            fetch_timeout: self.settings.fetch_timeout,
            generation: self.generation,
            outcome_tx: self.outcome_tx.clone(),
        }));
        debug!(execution_id = %id, generation = self.generation, "poller started");
    }

    fn cancel_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
        // Anything still queued or in flight belongs to a dead generation now.
        self.generation += 1;
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "controller state change");
        }
        self.state = state;
        self.emit(ConsoleEvent::StateChanged {
            state,
            error: self.last_error.clone(),
        });
    }

    fn emit(&self, event: ConsoleEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
