use crate::orchestrator::ControllerState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote-assigned execution identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordId(pub u64);

impl fmt::Display for KeywordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Visible,
    Headless,
}

impl ExecutionMode {
    pub fn from_headless(headless: bool) -> Self {
        if headless {
            ExecutionMode::Headless
        } else {
            ExecutionMode::Visible
        }
    }

    pub fn is_headless(self) -> bool {
        matches!(self, ExecutionMode::Headless)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Visible => "visible",
            ExecutionMode::Headless => "headless",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    /// Completed and errored executions are never polled again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        }
    }
}

/// One crawler run as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_searches: u64,
    #[serde(default)]
    pub total_clicks: u64,
    // The service still reports target appearances under their legacy name.
    #[serde(default, alias = "total_lidery_found")]
    pub total_target_found: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(rename = "execution_mode")]
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub text: String,
    #[serde(rename = "is_active")]
    pub active: bool,
    pub created_at: String,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub use_count: u64,
}

/// Period-bucketed counters produced by the analytics source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub date: String,
    #[serde(default)]
    pub total_executions: u64,
    #[serde(default)]
    pub total_searches: u64,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default, alias = "total_lidery")]
    pub total_target_found: u64,
}

/// Raw per-position count; the service-side percentage is recomputed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCount {
    pub position: i64,
    pub count: u64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub executions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetitorId(pub u64);

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Advertiser seen next to the target in search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub domain: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    /// Lifetime count kept by the crawler, independent of any window.
    #[serde(default)]
    pub total_appearances: u64,
}

/// A competitor's standing over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRanking {
    #[serde(flatten)]
    pub competitor: Competitor,
    pub appearances: u64,
    pub average_position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordAppearance {
    pub keyword: String,
    pub appearances: u64,
    pub average_position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorDetails {
    #[serde(flatten)]
    pub competitor: Competitor,
    #[serde(default)]
    pub keyword_analysis: Vec<KeywordAppearance>,
}

/// Contact channel scraped from a competitor's ad or landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: u64,
    pub competitor_id: CompetitorId,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub times_found: u64,
    // Only the cross-competitor listing joins these in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_name: Option<String>,
}

/// Structured info events emitted by the orchestrator and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    Busy { state: ControllerState },
    NothingRunning,
    KeywordsAdded { submitted: usize, added: usize },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Busy { state } => {
                format!("Cannot start: an execution is already active ({state})")
            }
            InfoEvent::NothingRunning => "Nothing to stop: no execution is running".to_string(),
            InfoEvent::KeywordsAdded { submitted, added } => {
                format!("Added {added} of {submitted} keyword(s)")
            }
        }
    }
}

/// Events published by the console hub; presentation layers render from these only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConsoleEvent {
    StateChanged {
        state: ControllerState,
        error: Option<String>,
    },
    ExecutionUpdated {
        execution: Box<Execution>,
    },
    ExecutionFinished {
        execution: Box<Execution>,
    },
    KeywordsLoaded {
        keywords: Vec<Keyword>,
    },
    HistoryLoaded {
        executions: Vec<Execution>,
    },
    StatsLoaded {
        daily: Vec<StatSnapshot>,
        positions: Vec<PositionCount>,
        calendar: Vec<CalendarDay>,
    },
    Info(InfoEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_accepts_legacy_counter_name() {
        let raw = r#"{
            "id": 7,
            "start_time": "2024-03-15T10:20:30",
            "total_searches": 12,
            "total_clicks": 3,
            "total_lidery_found": 2,
            "is_running": true,
            "execution_mode": "headless",
            "status": "running"
        }"#;
        let execution: Execution = serde_json::from_str(raw).unwrap();
        assert_eq!(execution.id, ExecutionId(7));
        assert_eq!(execution.total_target_found, 2);
        assert_eq!(execution.mode, ExecutionMode::Headless);
        assert!(execution.end_time.is_none());
        assert!(!execution.status.is_terminal());
    }

    #[test]
    fn stat_snapshot_defaults_missing_counters() {
        let snapshot: StatSnapshot =
            serde_json::from_str(r#"{"date": "2024-03-15", "total_lidery": 4}"#).unwrap();
        assert_eq!(snapshot.total_target_found, 4);
        assert_eq!(snapshot.total_searches, 0);
    }

    #[test]
    fn ranking_flattens_competitor_fields() {
        let raw = r#"{
            "id": 12,
            "domain": "rival.example",
            "business_name": null,
            "first_seen": "2024-03-01T08:00:00",
            "last_seen": "2024-03-15T09:30:00",
            "total_appearances": 340,
            "appearances": 41,
            "average_position": 1.75
        }"#;
        let ranking: CompetitorRanking = serde_json::from_str(raw).unwrap();
        assert_eq!(ranking.competitor.id, CompetitorId(12));
        assert_eq!(ranking.competitor.domain, "rival.example");
        assert!(ranking.competitor.business_name.is_none());
        assert_eq!(ranking.appearances, 41);
        assert_eq!(ranking.average_position, 1.75);
    }

    #[test]
    fn contact_reads_type_and_optional_join() {
        let listed: Contact = serde_json::from_str(
            r#"{"id": 3, "competitor_id": 12, "type": "whatsapp", "value": "+55 11 91234-5678",
                "times_found": 6, "competitor_domain": "rival.example", "competitor_name": "Rival"}"#,
        )
        .unwrap();
        assert_eq!(listed.kind, "whatsapp");
        assert_eq!(listed.competitor_domain.as_deref(), Some("rival.example"));

        let direct: Contact = serde_json::from_str(
            r#"{"id": 4, "competitor_id": 12, "type": "phone", "value": "1133334444"}"#,
        )
        .unwrap();
        assert_eq!(direct.times_found, 0);
        assert!(direct.competitor_domain.is_none());
        let out = serde_json::to_value(&direct).unwrap();
        assert_eq!(out["type"], "phone");
        assert!(out.get("competitor_domain").is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }
}
