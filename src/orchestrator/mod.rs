//! Execution orchestration.
//!
//! This module owns the execution lifecycle (start/stop/attach and status polling) and
//! post-execution processing such as rates and history refresh. UI/CLI layers call into
//! this module to keep responsibilities separated.

mod controller;
#[cfg(feature = "tui")]
mod hub;
mod poller;
mod post_process;

pub use controller::{ControllerState, ExecutionController, PollApplied, PollSettings};
#[cfg(feature = "tui")]
pub(crate) use hub::{run_console, UiCommand};
pub(crate) use post_process::process_execution_completion;
