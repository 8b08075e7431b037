//! Console hub.
//!
//! Single async task that owns the controller and the keyword registry, turns UI
//! commands into calls on them, and drives the only timers in the process: the
//! controller's poller and the periodic stats refresh.

use super::controller::{ExecutionController, PollApplied, PollSettings};
use super::post_process::process_execution_completion;
use crate::api::{DateRange, ExecutionApi, KeywordApi, StatsApi};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::keywords::KeywordRegistry;
use crate::model::{ConsoleEvent, Execution, ExecutionMode, InfoEvent, KeywordId};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Window for the position distribution shown on the dashboard.
const POSITION_WINDOW_DAYS: u32 = 30;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(ExecutionMode),
    Stop,
    AddKeywords(String),
    ToggleKeyword(KeywordId),
    RemoveKeyword(KeywordId),
    Refresh,
    Quit,
}

/// Everything the hub needs from the remote service.
pub(crate) trait ConsoleApi: ExecutionApi + KeywordApi + StatsApi {}

impl<T: ExecutionApi + KeywordApi + StatsApi> ConsoleApi for T {}

struct Hub<S: ConsoleApi> {
    api: Arc<S>,
    cfg: ConsoleConfig,
    controller: ExecutionController<S>,
    keywords: KeywordRegistry<S>,
    event_tx: UnboundedSender<ConsoleEvent>,
}

impl<S: ConsoleApi> Hub<S> {
    fn info(&self, info: InfoEvent) {
        let _ = self.event_tx.send(ConsoleEvent::Info(info));
    }

    fn report(&self, what: &str, err: &ConsoleError) {
        let info = match err {
            ConsoleError::Conflict { state } => InfoEvent::Busy { state: *state },
            ConsoleError::NotRunning => InfoEvent::NothingRunning,
            other => InfoEvent::Message(format!("{what} failed: {other}")),
        };
        self.info(info);
    }

    async fn refresh_keywords(&mut self) {
        match self.keywords.refresh().await.map(<[_]>::to_vec) {
            Ok(keywords) => {
                let _ = self.event_tx.send(ConsoleEvent::KeywordsLoaded { keywords });
            }
            Err(e) => self.report("Keyword refresh", &e),
        }
    }

    fn publish_keywords(&self) {
        let _ = self.event_tx.send(ConsoleEvent::KeywordsLoaded {
            keywords: self.keywords.list().to_vec(),
        });
    }

    async fn refresh_history(&self) {
        match self.api.list_executions(self.cfg.history_limit, 0).await {
            Ok(executions) => {
                let _ = self.event_tx.send(ConsoleEvent::HistoryLoaded { executions });
            }
            Err(e) => self.report("History refresh", &e),
        }
    }

    async fn refresh_stats(&self) {
        let today = crate::metrics::today();
        let range = DateRange::default();
        let (daily, positions, calendar) = futures::join!(
            self.api.daily_stats(&range),
            self.api.position_counts(POSITION_WINDOW_DAYS),
            self.api
                .execution_calendar(today.year(), Some(u8::from(today.month()))),
        );
        match (daily, positions, calendar) {
            (Ok(daily), Ok(positions), Ok(calendar)) => {
                debug!(days = daily.len(), "stats refreshed");
                let _ = self.event_tx.send(ConsoleEvent::StatsLoaded {
                    daily,
                    positions,
                    calendar,
                });
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.report("Stats refresh", &e)
            }
        }
    }

    async fn handle(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Start(mode) => {
                if let Err(e) = self.controller.start(mode).await {
                    self.report("Start", &e);
                }
            }
            UiCommand::Stop => match self.controller.stop().await {
                Ok(execution) => self.finished(&execution).await,
                Err(e) => self.report("Stop", &e),
            },
            UiCommand::AddKeywords(raw) => match self.keywords.bulk_add(&raw).await {
                Ok(outcome) => {
                    self.publish_keywords();
                    self.info(InfoEvent::KeywordsAdded {
                        submitted: outcome.submitted.len(),
                        added: outcome.added.len(),
                    });
                }
                Err(e) => self.report("Add keywords", &e),
            },
            UiCommand::ToggleKeyword(id) => match self.keywords.toggle(id).await {
                Ok(()) => self.publish_keywords(),
                Err(e) => self.report("Toggle keyword", &e),
            },
            UiCommand::RemoveKeyword(id) => match self.keywords.remove(id).await {
                Ok(()) => self.publish_keywords(),
                Err(e) => self.report("Remove keyword", &e),
            },
            UiCommand::Refresh => {
                self.refresh_keywords().await;
                self.refresh_history().await;
                self.refresh_stats().await;
            }
            UiCommand::Quit => {}
        }
    }

    async fn finished(&self, execution: &Execution) {
        let processed =
            process_execution_completion(self.api.as_ref(), self.cfg.history_limit, execution)
                .await;
        self.info(InfoEvent::Message(processed.message));
        if let Some(executions) = processed.history {
            let _ = self.event_tx.send(ConsoleEvent::HistoryLoaded { executions });
        }
        self.refresh_stats().await;
    }
}

/// Run the hub until `Quit` or until the command channel closes.
pub(crate) async fn run_console<S: ConsoleApi>(
    api: Arc<S>,
    cfg: &ConsoleConfig,
    event_tx: UnboundedSender<ConsoleEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let settings = PollSettings {
        interval: cfg.poll_interval,
        fetch_timeout: cfg.request_timeout,
    };
    let mut hub = Hub {
        api: api.clone(),
        cfg: cfg.clone(),
        controller: ExecutionController::new(api.clone(), settings).with_events(event_tx.clone()),
        keywords: KeywordRegistry::new(api),
        event_tx,
    };

    // First tick fires immediately and doubles as the initial load.
    let mut stats_timer = tokio::time::interval(cfg.stats_refresh_interval);
    stats_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    hub.refresh_keywords().await;
    hub.refresh_history().await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => hub.handle(cmd).await,
                }
            }
            outcome = hub.controller.next_poll() => {
                if let PollApplied::Finished(status) = hub.controller.apply_poll(outcome) {
                    debug!(status = status.as_str(), "execution reached terminal status");
                    if let Some(execution) = hub.controller.last_finished().cloned() {
                        hub.finished(&execution).await;
                    }
                }
            }
            _ = stats_timer.tick() => {
                hub.refresh_stats().await;
            }
        }
    }

    // Leave the remote job running; only local polling is torn down.
    if hub.controller.current().is_some() {
        warn!("console closing while an execution is still running");
    }
    hub.controller.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PositionCount, StatSnapshot};
    use crate::orchestrator::ControllerState;
    use crate::testing::{FakeService, Tick};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_config() -> ConsoleConfig {
        ConsoleConfig {
            poll_interval: Duration::from_secs(5),
            stats_refresh_interval: Duration::from_secs(300),
            ..Default::default()
        }
    }

    async fn next_matching(
        rx: &mut UnboundedReceiver<ConsoleEvent>,
        pred: impl Fn(&ConsoleEvent) -> bool,
    ) -> ConsoleEvent {
        loop {
            let ev = rx.recv().await.unwrap();
            if pred(&ev) {
                return ev;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_publishes_keywords_history_and_stats() {
        let api = Arc::new(FakeService::default());
        api.set_stats(
            vec![StatSnapshot {
                date: "2024-03-15".into(),
                total_executions: 1,
                total_searches: 10,
                total_clicks: 2,
                total_target_found: 1,
            }],
            vec![PositionCount {
                position: 1,
                count: 3,
                percentage: 100.0,
            }],
            Vec::new(),
        );
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cfg = test_config();
        let handle = tokio::spawn(async move { run_console(api, &cfg, event_tx, cmd_rx).await });

        next_matching(&mut event_rx, |e| matches!(e, ConsoleEvent::KeywordsLoaded { .. })).await;
        next_matching(&mut event_rx, |e| matches!(e, ConsoleEvent::HistoryLoaded { .. })).await;
        let stats =
            next_matching(&mut event_rx, |e| matches!(e, ConsoleEvent::StatsLoaded { .. })).await;
        if let ConsoleEvent::StatsLoaded { daily, positions, .. } = stats {
            assert_eq!(daily.len(), 1);
            assert_eq!(positions[0].count, 3);
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_poll_and_finish_through_commands() {
        let api = Arc::new(FakeService::default());
        api.script([
            Tick::Progress {
                searches: 10,
                clicks: 1,
                found: 1,
            },
            Tick::Completed,
        ]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cfg = test_config();
        let service = api.clone();
        let handle =
            tokio::spawn(async move { run_console(service, &cfg, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Start(ExecutionMode::Headless)).unwrap();
        cmd_tx.send(UiCommand::Start(ExecutionMode::Visible)).unwrap();

        let busy = next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::Info(InfoEvent::Busy { .. }))
        })
        .await;
        assert!(matches!(
            busy,
            ConsoleEvent::Info(InfoEvent::Busy {
                state: ControllerState::Running
            })
        ));

        let finished = next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::ExecutionFinished { .. })
        })
        .await;
        if let ConsoleEvent::ExecutionFinished { execution } = finished {
            assert_eq!(execution.total_searches, 10);
        }
        next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::Info(InfoEvent::Message(m)) if m.contains("completed"))
        })
        .await;

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_execution_reports_nothing_running() {
        let api = Arc::new(FakeService::default());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cfg = test_config();
        let handle = tokio::spawn(async move { run_console(api, &cfg, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Stop).unwrap();
        next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::Info(InfoEvent::NothingRunning))
        })
        .await;

        drop(cmd_tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keyword_commands_publish_fresh_snapshots() {
        let api = Arc::new(FakeService::default());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cfg = test_config();
        let handle = tokio::spawn(async move { run_console(api, &cfg, event_tx, cmd_rx).await });

        cmd_tx
            .send(UiCommand::AddKeywords("shoes, ,boots".into()))
            .unwrap();
        let added = next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::Info(InfoEvent::KeywordsAdded { .. }))
        })
        .await;
        assert!(matches!(
            added,
            ConsoleEvent::Info(InfoEvent::KeywordsAdded {
                submitted: 2,
                added: 2
            })
        ));

        cmd_tx.send(UiCommand::AddKeywords(" , ".into())).unwrap();
        next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::Info(InfoEvent::Message(m)) if m.contains("no keywords given"))
        })
        .await;

        cmd_tx.send(UiCommand::ToggleKeyword(KeywordId(1))).unwrap();
        let loaded = next_matching(&mut event_rx, |e| {
            matches!(e, ConsoleEvent::KeywordsLoaded { keywords } if keywords.iter().any(|k| !k.active))
        })
        .await;
        if let ConsoleEvent::KeywordsLoaded { keywords } = loaded {
            assert_eq!(keywords.len(), 2);
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }
}
