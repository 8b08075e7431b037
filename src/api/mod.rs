//! Remote service seams.
//!
//! The controller, registry and hub only see these traits; `http::ApiClient` is the
//! production implementation and tests substitute in-memory fakes.

mod http;

pub use http::ApiClient;

use crate::error::Result;
use crate::model::{
    CalendarDay, CompetitorDetails, CompetitorId, CompetitorRanking, Contact, Execution,
    ExecutionId, ExecutionMode, Keyword, KeywordId, PositionCount, StatSnapshot,
};
use async_trait::async_trait;

#[async_trait]
pub trait ExecutionApi: Send + Sync + 'static {
    /// `POST /execution/start`
    async fn start_execution(&self, mode: ExecutionMode) -> Result<Execution>;
    /// `POST /execution/stop/{id}`; idempotent on an already-stopped id.
    async fn stop_execution(&self, id: ExecutionId) -> Result<()>;
    /// `GET /execution/status/{id}`
    async fn execution_status(&self, id: ExecutionId) -> Result<Execution>;
    /// `GET /execution/list?limit&offset`
    async fn list_executions(&self, limit: u32, offset: u32) -> Result<Vec<Execution>>;
}

#[async_trait]
pub trait KeywordApi: Send + Sync + 'static {
    async fn list_keywords(&self) -> Result<Vec<Keyword>>;
    /// Returns the texts the store actually added.
    async fn add_keywords(&self, keywords: &[String]) -> Result<Vec<String>>;
    async fn delete_keyword(&self, id: KeywordId) -> Result<()>;
    async fn toggle_keyword(&self, id: KeywordId) -> Result<()>;
}

/// Optional inclusive date window (`YYYY-MM-DD`) for daily stats.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[async_trait]
pub trait StatsApi: Send + Sync + 'static {
    async fn daily_stats(&self, range: &DateRange) -> Result<Vec<StatSnapshot>>;
    async fn position_counts(&self, days: u32) -> Result<Vec<PositionCount>>;
    async fn execution_calendar(&self, year: i32, month: Option<u8>) -> Result<Vec<CalendarDay>>;
}

#[async_trait]
pub trait CompetitionApi: Send + Sync + 'static {
    /// `GET /competition/top-competitors?limit&days`, most appearances first.
    async fn top_competitors(&self, limit: u32, days: u32) -> Result<Vec<CompetitorRanking>>;
    /// `GET /competition/competitor/{id}/details?days`
    async fn competitor_details(&self, id: CompetitorId, days: u32) -> Result<CompetitorDetails>;
}

/// Server-side filter for the contact listing.
#[derive(Debug, Clone)]
pub struct ContactFilter {
    /// Wire value such as `whatsapp` or `phone`; `None` lists every type.
    pub kind: Option<String>,
    /// Only contacts first seen within this many days.
    pub days: u32,
}

#[async_trait]
pub trait ContactApi: Send + Sync + 'static {
    /// `GET /contacts/?contact_type&days`, most frequently found first.
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>>;
    /// `GET /contacts/competitor/{id}`
    async fn competitor_contacts(&self, id: CompetitorId) -> Result<Vec<Contact>>;
}
