mod charts;
mod help;
mod state;

use crate::api::ApiClient;
use crate::config::ConsoleConfig;
use crate::metrics;
use crate::model::{ConsoleEvent, ExecutionMode};
use crate::orchestrator::{self, ControllerState, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Sparkline, Tabs},
    Terminal,
};
use state::{
    kv_line, state_color, UiState, TAB_COUNT, TAB_EXECUTION, TAB_HELP, TAB_HISTORY,
    TAB_PERFORMANCE,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant, time::SystemTime};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: ConsoleConfig) -> Result<()> {
    let api = Arc::new(ApiClient::new(&cfg).context("create API client")?);

    // Unbounded channels avoid backpressure between the hub and the render loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ConsoleEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let base_url = cfg.base_url.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(base_url, event_rx, cmd_tx));

    let res = orchestrator::run_console(api, &cfg, event_tx, cmd_rx)
        .await
        .context("console hub failed");

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    base_url: String,
    mut event_rx: UnboundedReceiver<ConsoleEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state, &base_url)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.keyword_editing {
                    handle_edit_key(&mut state, &cmd_tx, k.code);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) => {
                        state.info = "Starting execution…".into();
                        let _ = cmd_tx.send(UiCommand::Start(ExecutionMode::Visible));
                    }
                    (_, KeyCode::Char('h')) => {
                        state.info = "Starting headless execution…".into();
                        let _ = cmd_tx.send(UiCommand::Start(ExecutionMode::Headless));
                    }
                    (_, KeyCode::Char('x')) => {
                        state.info = "Stop requested…".into();
                        let _ = cmd_tx.send(UiCommand::Stop);
                    }
                    (_, KeyCode::Char('r')) => {
                        state.info = "Refreshing…".into();
                        let _ = cmd_tx.send(UiCommand::Refresh);
                    }
                    (_, KeyCode::Char('a')) => {
                        state.tab = TAB_EXECUTION;
                        state.keyword_editing = true;
                        state.keyword_input.clear();
                        state.info = "Type keywords separated by commas; Enter to add, Esc to cancel".into();
                    }
                    (_, KeyCode::Char('t')) | (_, KeyCode::Char(' ')) => {
                        if state.tab == TAB_EXECUTION {
                            if let Some(id) = state.selected_keyword_id() {
                                let _ = cmd_tx.send(UiCommand::ToggleKeyword(id));
                            }
                        }
                    }
                    (_, KeyCode::Char('d')) => {
                        if state.tab == TAB_EXECUTION {
                            if let Some((id, text)) =
                                state.selected_keyword().map(|k| (k.id, k.text.clone()))
                            {
                                state.info = format!("Deleting \"{text}\"…");
                                let _ = cmd_tx.send(UiCommand::RemoveKeyword(id));
                            }
                        }
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % TAB_COUNT;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = TAB_HELP;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.select_prev(),
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.select_next(),
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn handle_edit_key(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, code: KeyCode) {
    match code {
        KeyCode::Enter => {
            state.keyword_editing = false;
            let raw = std::mem::take(&mut state.keyword_input);
            state.info = "Adding keywords…".into();
            let _ = cmd_tx.send(UiCommand::AddKeywords(raw));
        }
        KeyCode::Esc => {
            state.keyword_editing = false;
            state.keyword_input.clear();
            state.info = "Cancelled".into();
        }
        KeyCode::Backspace => {
            state.keyword_input.pop();
        }
        KeyCode::Char(c) => state.keyword_input.push(c),
        _ => {}
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, base_url: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Execution"),
        Line::from("Performance"),
        Line::from("History"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("adrank-console ({base_url})")),
    )
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_EXECUTION => draw_execution(chunks[1], f, state),
        TAB_PERFORMANCE => charts::draw_performance(chunks[1], f, state),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }

    let status = if state.keyword_editing {
        Line::from(vec![
            Span::styled("Add: ", Style::default().fg(Color::Magenta)),
            Span::raw(state.keyword_input.as_str()),
            Span::styled("▏", Style::default().fg(Color::Gray)),
        ])
    } else {
        Line::from(state.info.as_str())
    };
    f.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::ALL).title("Status")),
        chunks[2],
    );
}

fn draw_execution(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(0)].as_ref())
        .split(cols[0]);

    let mut lines = vec![kv_line(
        "State:        ",
        state.controller_state.to_string(),
        state_color(state.controller_state),
    )];
    if let Some(err) = state.last_error.as_deref() {
        lines.push(kv_line("Error:        ", err.to_string(), Color::Red));
    }
    match state.shown_execution() {
        Some(execution) => {
            let rates = metrics::execution_rates(execution);
            lines.push(kv_line(
                "Execution:    ",
                format!(
                    "#{} ({}, {})",
                    execution.id,
                    execution.mode.as_str(),
                    execution.status.as_str()
                ),
                Color::White,
            ));
            if state.current.is_some() {
                let running = metrics::running_time(&execution.start_time, SystemTime::now())
                    .map(crate::text_summary::format_elapsed)
                    .unwrap_or_else(|| "-".into());
                lines.push(kv_line("Running time: ", running, Color::Cyan));
            }
            lines.push(kv_line(
                "Searches:     ",
                execution.total_searches.to_string(),
                Color::Cyan,
            ));
            lines.push(kv_line(
                "Clicks:       ",
                execution.total_clicks.to_string(),
                Color::Green,
            ));
            lines.push(kv_line(
                "Target found: ",
                execution.total_target_found.to_string(),
                Color::Magenta,
            ));
            lines.push(kv_line(
                "Rates:        ",
                format!(
                    "target {:.2}%  click {:.2}%",
                    rates.target_rate, rates.click_rate
                ),
                Color::Yellow,
            ));
        }
        None => lines.push(Line::from("No execution yet. Press s or h to start one.")),
    }
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Execution")),
        left[0],
    );

    let spark_title = if state.controller_state == ControllerState::Running {
        "Searches per poll"
    } else {
        "Searches per poll (idle)"
    };
    f.render_widget(
        Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(spark_title))
            .data(&state.searches_series)
            .style(Style::default().fg(Color::Cyan)),
        left[1],
    );

    draw_keywords(cols[1], f, state);
}

fn draw_keywords(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let items: Vec<ListItem> = state
        .keywords
        .iter()
        .map(|k| {
            let (mark, color) = if k.active {
                ("●", Color::Green)
            } else {
                ("○", Color::DarkGray)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{mark} "), Style::default().fg(color)),
                Span::raw(k.text.clone()),
                Span::styled(
                    format!("  ({}x)", k.use_count),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();
    let title = format!(
        "Keywords ({} active / {})",
        state.active_keywords(),
        state.keywords.len()
    );
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state = ListState::default();
    if !state.keywords.is_empty() {
        list_state.select(Some(state.keyword_selected));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let items: Vec<ListItem> = crate::text_summary::history_lines(&state.history)
        .into_iter()
        .map(ListItem::new)
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Recent executions ({})", state.history.len())),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state = ListState::default();
    if !state.history.is_empty() {
        list_state.select(Some(state.history_selected));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}
