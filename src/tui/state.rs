use crate::metrics::{self, CalendarMonth, Overview, PositionDistribution, Timeline};
use crate::model::{ConsoleEvent, Execution, Keyword, KeywordId};
use crate::orchestrator::ControllerState;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub const TAB_EXECUTION: usize = 0;
pub const TAB_PERFORMANCE: usize = 1;
pub const TAB_HISTORY: usize = 2;
pub const TAB_HELP: usize = 3;
pub const TAB_COUNT: usize = 4;

/// Longest progress series kept for the sparkline.
const MAX_SERIES: usize = 240;

pub struct UiState {
    pub tab: usize,
    pub info: String,

    pub controller_state: ControllerState,
    pub last_error: Option<String>,
    pub current: Option<Execution>,
    pub last_finished: Option<Execution>,
    // Searches per poll for the current execution
    pub searches_series: Vec<u64>,

    pub keywords: Vec<Keyword>,
    pub keyword_selected: usize,
    pub keyword_input: String,
    pub keyword_editing: bool,

    pub history: Vec<Execution>,
    pub history_selected: usize,

    pub overview: Overview,
    pub timeline: Timeline,
    pub positions: PositionDistribution,
    pub calendar: Option<CalendarMonth>,
    pub stats_loaded: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_EXECUTION,
            info: String::new(),
            controller_state: ControllerState::Idle,
            last_error: None,
            current: None,
            last_finished: None,
            searches_series: Vec::new(),
            keywords: Vec::new(),
            keyword_selected: 0,
            keyword_input: String::new(),
            keyword_editing: false,
            history: Vec::new(),
            history_selected: 0,
            overview: metrics::overview(&[]),
            timeline: metrics::timeline(&[]),
            positions: metrics::position_distribution(&[]),
            calendar: None,
            stats_loaded: false,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: ConsoleEvent) {
        match ev {
            ConsoleEvent::StateChanged { state, error } => {
                self.controller_state = state;
                self.last_error = error;
                if state == ControllerState::Starting {
                    self.searches_series.clear();
                }
            }
            ConsoleEvent::ExecutionUpdated { execution } => {
                let searches = execution.total_searches;
                // Per-poll delta; the first snapshot seeds the series.
                let delta = self
                    .current
                    .as_ref()
                    .map_or(0, |prev| searches.saturating_sub(prev.total_searches));
                self.searches_series.push(delta);
                if self.searches_series.len() > MAX_SERIES {
                    let excess = self.searches_series.len() - MAX_SERIES;
                    self.searches_series.drain(0..excess);
                }
                self.current = Some(*execution);
            }
            ConsoleEvent::ExecutionFinished { execution } => {
                self.current = None;
                self.last_finished = Some(*execution);
            }
            ConsoleEvent::KeywordsLoaded { keywords } => {
                self.keywords = keywords;
                self.keyword_selected = clamp_index(self.keyword_selected, self.keywords.len());
            }
            ConsoleEvent::HistoryLoaded { executions } => {
                self.history = executions;
                self.history_selected = clamp_index(self.history_selected, self.history.len());
            }
            ConsoleEvent::StatsLoaded {
                daily,
                positions,
                calendar,
            } => {
                self.overview = metrics::overview(&daily);
                self.timeline = metrics::timeline(&daily);
                self.positions = metrics::position_distribution(&positions);
                if self.positions.excluded > 0 {
                    tracing::debug!(
                        excluded = self.positions.excluded,
                        "position counts outside 1-4 were left out"
                    );
                }
                let today = metrics::today();
                self.calendar = metrics::calendar(today.year(), today.month(), &calendar);
                self.stats_loaded = true;
            }
            ConsoleEvent::Info(info) => {
                self.info = info.to_message();
            }
        }
    }

    /// Execution whose numbers the dashboard shows: the live one, else the last finished.
    pub fn shown_execution(&self) -> Option<&Execution> {
        self.current.as_ref().or(self.last_finished.as_ref())
    }

    pub fn selected_keyword(&self) -> Option<&Keyword> {
        self.keywords.get(self.keyword_selected)
    }

    pub fn selected_keyword_id(&self) -> Option<KeywordId> {
        self.selected_keyword().map(|k| k.id)
    }

    pub fn select_next(&mut self) {
        match self.tab {
            TAB_EXECUTION => {
                if self.keyword_selected + 1 < self.keywords.len() {
                    self.keyword_selected += 1;
                }
            }
            TAB_HISTORY => {
                if self.history_selected + 1 < self.history.len() {
                    self.history_selected += 1;
                }
            }
            _ => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.tab {
            TAB_EXECUTION => self.keyword_selected = self.keyword_selected.saturating_sub(1),
            TAB_HISTORY => self.history_selected = self.history_selected.saturating_sub(1),
            _ => {}
        }
    }

    pub fn active_keywords(&self) -> usize {
        self.keywords.iter().filter(|k| k.active).count()
    }
}

fn clamp_index(idx: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        idx.min(len - 1)
    }
}

pub fn state_color(state: ControllerState) -> Color {
    match state {
        ControllerState::Idle => Color::Gray,
        ControllerState::Starting | ControllerState::Stopping => Color::Yellow,
        ControllerState::Running => Color::Green,
        ControllerState::Error => Color::Red,
    }
}

/// `label value` pair with the value colored.
pub fn kv_line<'a>(label: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::raw(label),
        Span::styled(value, Style::default().fg(color)),
    ])
}
