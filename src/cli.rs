use crate::api::{
    ApiClient, CompetitionApi, ContactApi, ContactFilter, DateRange, ExecutionApi, StatsApi,
};
use crate::competition::{self, DEFAULT_TOP_LIMIT, DEFAULT_WINDOW_DAYS};
use crate::config::ConsoleConfig;
use crate::keywords::KeywordRegistry;
use crate::metrics;
use crate::model::{CompetitorId, ExecutionId, ExecutionMode, KeywordId};
use crate::orchestrator::{self, ControllerState, ExecutionController, PollApplied, PollSettings};
use crate::text_summary;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "adrank-console",
    version,
    about = "Operator console for the ad-position crawler"
)]
pub struct Cli {
    /// JSON config file (defaults to <config dir>/adrank-console/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the crawler API
    #[arg(long, env = "ADRANK_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Status poll interval while an execution runs
    #[arg(long, env = "ADRANK_POLL_INTERVAL", global = true)]
    pub poll_interval: Option<humantime::Duration>,

    /// Per-request timeout
    #[arg(long, env = "ADRANK_REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<humantime::Duration>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "ADRANK_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Interactive dashboard (default)
    Tui,
    /// Start an execution and follow it until it finishes (Ctrl-C stops it)
    Run {
        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
        /// Print the final execution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow an execution that is already running
    Watch {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Show one execution
    Status {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Ask the service to stop an execution
    Stop { id: u64 },
    /// Recent executions, newest first
    History {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        json: bool,
    },
    /// Manage search keywords
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },
    /// Performance statistics
    Stats {
        #[command(subcommand)]
        view: StatsView,
    },
    /// Advertisers competing for the same ad slots
    Competitors {
        #[command(subcommand)]
        view: CompetitorView,
    },
    /// Contact channels scraped from competitors
    Contacts {
        /// Only this type, e.g. whatsapp or phone
        #[arg(long = "type")]
        kind: Option<String>,
        /// Only contacts first seen within this many days
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
        days: u32,
        /// Every contact of one competitor (ignores --type and --days)
        #[arg(long)]
        competitor: Option<u64>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum CompetitorView {
    /// Competitors ranked by appearances
    Top {
        #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Per-keyword appearances and contacts of one competitor
    Details {
        id: u64,
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum KeywordAction {
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add comma-separated keywords
    Add { keywords: String },
    /// Flip a keyword between active and inactive
    Toggle { id: u64 },
    Remove { id: u64 },
}

#[derive(Debug, Subcommand, Clone)]
pub enum StatsView {
    /// Latest period against the previous one
    Overview {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Per-day counters and rates
    Timeline {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Distribution of target appearances over ad positions 1-4
    Positions {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Executions per day for one month
    Calendar {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u8>,
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Whether this invocation hands the terminal to the dashboard.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui))
    }
}

/// Layer CLI flags and environment over the file/default configuration.
pub fn build_config(args: &Cli) -> Result<ConsoleConfig> {
    let mut cfg = ConsoleConfig::load(args.config.as_deref()).context("load configuration")?;
    if let Some(url) = args.base_url.as_ref() {
        cfg.base_url = url.clone();
    }
    if let Some(d) = args.poll_interval {
        cfg.poll_interval = d.into();
    }
    if let Some(d) = args.request_timeout {
        cfg.request_timeout = d.into();
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let command = args.command.clone().unwrap_or(Command::Tui);

    if let Command::Tui = command {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            return Err(anyhow::anyhow!(
                "built without the dashboard; use a subcommand such as `run` or `history`"
            ));
        }
    }

    let api = Arc::new(ApiClient::new(&cfg).context("create API client")?);
    let (out_tx, out_handle) = spawn_output_writer();
    let res = dispatch(command, api, &cfg, &out_tx).await;
    drop(out_tx);
    let _ = out_handle.await;
    res
}

async fn dispatch(
    command: Command,
    api: Arc<ApiClient>,
    cfg: &ConsoleConfig,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match command {
        Command::Tui => Ok(()),
        Command::Run { headless, json } => {
            let mut controller = controller(api.clone(), cfg);
            let execution = controller
                .start(ExecutionMode::from_headless(headless))
                .await
                .context("start execution")?;
            let _ = out.send(OutputLine::Stderr(format!(
                "Started execution {} ({})",
                execution.id,
                execution.mode.as_str()
            )));
            follow(&mut controller, api.as_ref(), cfg, out, json).await
        }
        Command::Watch { id, json } => {
            let mut controller = controller(api.clone(), cfg);
            let execution = controller
                .attach(ExecutionId(id))
                .await
                .with_context(|| format!("attach to execution {id}"))?;
            let _ = out.send(OutputLine::Stderr(text_summary::progress_line(&execution)));
            follow(&mut controller, api.as_ref(), cfg, out, json).await
        }
        Command::Status { id, json } => {
            let execution = api
                .execution_status(ExecutionId(id))
                .await
                .with_context(|| format!("fetch execution {id}"))?;
            if json {
                emit_json(out, &execution)
            } else {
                let summary = text_summary::build_text_summary(&execution, SystemTime::now());
                emit_lines(out, summary.lines);
                Ok(())
            }
        }
        Command::Stop { id } => {
            api.stop_execution(ExecutionId(id))
                .await
                .with_context(|| format!("stop execution {id}"))?;
            info!(execution_id = id, "stop requested");
            let _ = out.send(OutputLine::Stdout(format!("Stop requested for execution {id}")));
            Ok(())
        }
        Command::History {
            limit,
            offset,
            json,
        } => {
            let executions = api
                .list_executions(limit.unwrap_or(cfg.history_limit), offset)
                .await
                .context("list executions")?;
            if json {
                emit_json(out, &executions)
            } else {
                emit_lines(out, text_summary::history_lines(&executions));
                Ok(())
            }
        }
        Command::Keywords { action } => keywords(action, api, out).await,
        Command::Stats { view } => stats(view, api.as_ref(), out).await,
        Command::Competitors { view } => competitors(view, api.as_ref(), out).await,
        Command::Contacts {
            kind,
            days,
            competitor,
            json,
        } => contacts(kind, days, competitor, api.as_ref(), out, json).await,
    }
}

fn controller(api: Arc<ApiClient>, cfg: &ConsoleConfig) -> ExecutionController<ApiClient> {
    ExecutionController::new(
        api,
        PollSettings {
            interval: cfg.poll_interval,
            fetch_timeout: cfg.request_timeout,
        },
    )
}

/// Print progress until the execution finishes. Ctrl-C stops it remotely.
async fn follow(
    controller: &mut ExecutionController<ApiClient>,
    api: &ApiClient,
    cfg: &ConsoleConfig,
    out: &mpsc::UnboundedSender<OutputLine>,
    json: bool,
) -> Result<()> {
    while controller.current().is_some() {
        tokio::select! {
            applied = controller.pump() => {
                if let PollApplied::Updated = applied {
                    if let Some(execution) = controller.current() {
                        let _ = out.send(OutputLine::Stderr(text_summary::progress_line(execution)));
                    }
                }
            }
            res = tokio::signal::ctrl_c() => {
                res.context("listen for Ctrl-C")?;
                let _ = out.send(OutputLine::Stderr("Stopping execution...".into()));
                controller.stop().await.context("stop execution")?;
            }
        }
    }

    let Some(execution) = controller.last_finished().cloned() else {
        return Ok(());
    };
    let processed =
        orchestrator::process_execution_completion(api, cfg.history_limit, &execution).await;
    let _ = out.send(OutputLine::Stderr(processed.message));

    if json {
        emit_json(out, &processed.execution)?;
    } else {
        let summary = text_summary::build_text_summary(&processed.execution, SystemTime::now());
        emit_lines(out, summary.lines);
    }

    if controller.state() == ControllerState::Error {
        return Err(anyhow::anyhow!(
            "execution {} failed: {}",
            execution.id,
            controller.last_error().unwrap_or("unknown error")
        ));
    }
    Ok(())
}

async fn keywords(
    action: KeywordAction,
    api: Arc<ApiClient>,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let mut registry = KeywordRegistry::new(api);
    match action {
        KeywordAction::List { json } => {
            registry.refresh().await.context("list keywords")?;
            if json {
                return emit_json(out, &registry.list());
            }
        }
        KeywordAction::Add { keywords } => {
            let outcome = registry.bulk_add(&keywords).await.context("add keywords")?;
            let _ = out.send(OutputLine::Stderr(format!(
                "Added {} of {} keyword(s)",
                outcome.added.len(),
                outcome.submitted.len()
            )));
        }
        KeywordAction::Toggle { id } => {
            registry
                .toggle(KeywordId(id))
                .await
                .with_context(|| format!("toggle keyword {id}"))?;
        }
        KeywordAction::Remove { id } => {
            registry
                .remove(KeywordId(id))
                .await
                .with_context(|| format!("remove keyword {id}"))?;
        }
    }
    emit_lines(out, text_summary::keyword_lines(registry.list()));
    let _ = out.send(OutputLine::Stderr(format!(
        "{} of {} keyword(s) active",
        registry.active_count(),
        registry.list().len()
    )));
    Ok(())
}

async fn stats(
    view: StatsView,
    api: &ApiClient,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match view {
        StatsView::Overview { start, end, json } => {
            let daily = api
                .daily_stats(&DateRange { start, end })
                .await
                .context("fetch daily stats")?;
            let overview = metrics::overview(&daily);
            if json {
                return emit_json(out, &overview);
            }
            emit_lines(out, text_summary::overview_lines(&overview));
        }
        StatsView::Timeline { start, end, json } => {
            let daily = api
                .daily_stats(&DateRange { start, end })
                .await
                .context("fetch daily stats")?;
            let timeline = metrics::timeline(&daily);
            if json {
                return emit_json(out, &timeline);
            }
            emit_lines(out, text_summary::timeline_lines(&timeline));
        }
        StatsView::Positions { days, json } => {
            let counts = api
                .position_counts(days)
                .await
                .context("fetch position counts")?;
            let distribution = metrics::position_distribution(&counts);
            if distribution.excluded > 0 {
                warn!(
                    excluded = distribution.excluded,
                    "position counts outside 1-4 were left out"
                );
            }
            if json {
                return emit_json(out, &distribution);
            }
            emit_lines(out, text_summary::position_lines(&distribution));
        }
        StatsView::Calendar { year, month, json } => {
            let today = metrics::today();
            let year = year.unwrap_or(today.year());
            let month = match month {
                Some(m) => time::Month::try_from(m)
                    .with_context(|| format!("invalid month {m}; expected 1-12"))?,
                None => today.month(),
            };
            let days = api
                .execution_calendar(year, Some(u8::from(month)))
                .await
                .context("fetch execution calendar")?;
            let grid = metrics::calendar(year, month, &days)
                .with_context(|| format!("no calendar for {year}-{:02}", u8::from(month)))?;
            if json {
                return emit_json(out, &grid);
            }
            emit_lines(out, text_summary::calendar_lines(&grid));
        }
    }
    Ok(())
}

async fn competitors(
    view: CompetitorView,
    api: &ApiClient,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match view {
        CompetitorView::Top { limit, days, json } => {
            let rankings = api
                .top_competitors(limit, days)
                .await
                .context("fetch top competitors")?;
            let shares = competition::appearance_shares(&rankings);
            if json {
                return emit_json(out, &shares);
            }
            emit_lines(out, text_summary::competitor_lines(&shares));
        }
        CompetitorView::Details { id, days, json } => {
            let profile = competition::load_profile(api, CompetitorId(id), days)
                .await
                .with_context(|| format!("fetch competitor {id}"))?;
            if json {
                return emit_json(out, &profile);
            }
            emit_lines(out, text_summary::profile_lines(&profile));
        }
    }
    Ok(())
}

async fn contacts(
    kind: Option<String>,
    days: u32,
    competitor: Option<u64>,
    api: &ApiClient,
    out: &mpsc::UnboundedSender<OutputLine>,
    json: bool,
) -> Result<()> {
    let list = match competitor {
        Some(id) => api
            .competitor_contacts(CompetitorId(id))
            .await
            .with_context(|| format!("fetch contacts of competitor {id}"))?,
        None => api
            .list_contacts(&ContactFilter { kind, days })
            .await
            .context("list contacts")?,
    };
    if json {
        return emit_json(out, &list);
    }
    emit_lines(out, text_summary::contact_lines(&list));
    for line in text_summary::contact_kind_lines(&competition::contact_kinds(&list)) {
        let _ = out.send(OutputLine::Stderr(line));
    }
    Ok(())
}

fn emit_lines(out: &mpsc::UnboundedSender<OutputLine>, lines: Vec<String>) {
    for line in lines {
        let _ = out.send(OutputLine::Stdout(line));
    }
}

fn emit_json<T: Serialize + ?Sized>(out: &mpsc::UnboundedSender<OutputLine>, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let _ = out.send(OutputLine::Stdout(rendered));
    Ok(())
}
