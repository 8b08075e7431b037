//! In-memory stand-ins for the remote service, shared by unit tests.

use crate::api::{
    CompetitionApi, ContactApi, ContactFilter, DateRange, ExecutionApi, KeywordApi, StatsApi,
};
use crate::error::{ConsoleError, Result};
use crate::model::{
    CalendarDay, CompetitorDetails, CompetitorId, CompetitorRanking, Contact, Execution,
    ExecutionId, ExecutionMode, ExecutionStatus, Keyword, KeywordAppearance, KeywordId,
    PositionCount, StatSnapshot,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer to a status poll.
#[derive(Debug, Clone)]
pub(crate) enum Tick {
    Progress { searches: u64, clicks: u64, found: u64 },
    Completed,
    Failed(String),
    FetchError,
    /// Never answers within any sane fetch bound.
    Hang,
}

const HANG: Duration = Duration::from_secs(3600);

#[derive(Default)]
struct FakeState {
    next_execution_id: u64,
    executions: HashMap<ExecutionId, Execution>,
    ticks: VecDeque<Tick>,
    status_calls: usize,
    stop_calls: Vec<ExecutionId>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    keywords: Vec<Keyword>,
    next_keyword_id: u64,
    keyword_calls: usize,
    daily: Vec<StatSnapshot>,
    positions: Vec<PositionCount>,
    calendar: Vec<CalendarDay>,
    competitors: Vec<(CompetitorRanking, Vec<KeywordAppearance>)>,
    contacts: Vec<Contact>,
    fail_contacts: Option<String>,
}

#[derive(Default)]
pub(crate) struct FakeService {
    state: Mutex<FakeState>,
}

pub(crate) fn running_execution(id: u64, mode: ExecutionMode) -> Execution {
    Execution {
        id: ExecutionId(id),
        start_time: "2024-03-15T10:00:00".into(),
        end_time: None,
        total_searches: 0,
        total_clicks: 0,
        total_target_found: 0,
        is_running: true,
        mode,
        status: ExecutionStatus::Running,
        error_message: None,
    }
}

pub(crate) fn contact(
    id: u64,
    competitor: u64,
    kind: &str,
    value: &str,
    times_found: u64,
) -> Contact {
    Contact {
        id,
        competitor_id: CompetitorId(competitor),
        kind: kind.into(),
        value: value.into(),
        first_seen: Some("2024-03-10T08:00:00".into()),
        last_seen: Some("2024-03-15T09:00:00".into()),
        times_found,
        competitor_domain: None,
        competitor_name: None,
    }
}

impl FakeService {
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn script(&self, ticks: impl IntoIterator<Item = Tick>) {
        self.lock().ticks.extend(ticks);
    }

    pub(crate) fn fail_next_start(&self, message: &str) {
        self.lock().fail_start = Some(message.to_string());
    }

    pub(crate) fn fail_next_stop(&self, message: &str) {
        self.lock().fail_stop = Some(message.to_string());
    }

    /// Register an execution that was started outside this console.
    pub(crate) fn seed(&self, execution: Execution) {
        let mut st = self.lock();
        st.next_execution_id = st.next_execution_id.max(execution.id.0);
        st.executions.insert(execution.id, execution);
    }

    pub(crate) fn set_stats(
        &self,
        daily: Vec<StatSnapshot>,
        positions: Vec<PositionCount>,
        calendar: Vec<CalendarDay>,
    ) {
        let mut st = self.lock();
        st.daily = daily;
        st.positions = positions;
        st.calendar = calendar;
    }

    /// Competitors are ranked in insertion order.
    pub(crate) fn add_competitor(
        &self,
        ranking: CompetitorRanking,
        keyword_analysis: Vec<KeywordAppearance>,
    ) {
        self.lock().competitors.push((ranking, keyword_analysis));
    }

    pub(crate) fn add_contact(&self, contact: Contact) {
        self.lock().contacts.push(contact);
    }

    pub(crate) fn fail_next_contacts(&self, message: &str) {
        self.lock().fail_contacts = Some(message.to_string());
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub(crate) fn stop_calls(&self) -> Vec<ExecutionId> {
        self.lock().stop_calls.clone()
    }

    pub(crate) fn keyword_calls(&self) -> usize {
        self.lock().keyword_calls
    }
}

fn remote(status: u16, message: impl Into<String>) -> ConsoleError {
    ConsoleError::Remote {
        status,
        message: message.into(),
    }
}

#[async_trait]
impl ExecutionApi for FakeService {
    async fn start_execution(&self, mode: ExecutionMode) -> Result<Execution> {
        let mut st = self.lock();
        if let Some(msg) = st.fail_start.take() {
            return Err(remote(500, msg));
        }
        st.next_execution_id += 1;
        let execution = running_execution(st.next_execution_id, mode);
        st.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn stop_execution(&self, id: ExecutionId) -> Result<()> {
        let mut st = self.lock();
        st.stop_calls.push(id);
        if let Some(msg) = st.fail_stop.take() {
            return Err(remote(500, msg));
        }
        let execution = st
            .executions
            .get_mut(&id)
            .ok_or_else(|| remote(404, "Execution not found"))?;
        if execution.status == ExecutionStatus::Running {
            execution.status = ExecutionStatus::Completed;
            execution.is_running = false;
            execution.end_time = Some("2024-03-15T11:00:00".into());
        }
        Ok(())
    }

    async fn execution_status(&self, id: ExecutionId) -> Result<Execution> {
        let tick = {
            let mut st = self.lock();
            st.status_calls += 1;
            st.ticks.pop_front()
        };
        if let Some(Tick::Hang) = tick {
            tokio::time::sleep(HANG).await;
        }
        let mut st = self.lock();
        let execution = st
            .executions
            .get_mut(&id)
            .ok_or_else(|| remote(404, "Execution not found"))?;
        match tick {
            Some(Tick::Progress {
                searches,
                clicks,
                found,
            }) => {
                execution.total_searches = searches;
                execution.total_clicks = clicks;
                execution.total_target_found = found;
            }
            Some(Tick::Completed) => {
                execution.status = ExecutionStatus::Completed;
                execution.is_running = false;
            }
            Some(Tick::Failed(msg)) => {
                execution.status = ExecutionStatus::Error;
                execution.is_running = false;
                execution.error_message = Some(msg);
            }
            Some(Tick::FetchError) => return Err(remote(503, "service unavailable")),
            Some(Tick::Hang) | None => {}
        }
        Ok(execution.clone())
    }

    async fn list_executions(&self, limit: u32, offset: u32) -> Result<Vec<Execution>> {
        let st = self.lock();
        let mut all: Vec<Execution> = st.executions.values().cloned().collect();
        all.sort_by(|a, b| b.id.0.cmp(&a.id.0));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl KeywordApi for FakeService {
    async fn list_keywords(&self) -> Result<Vec<Keyword>> {
        let mut st = self.lock();
        st.keyword_calls += 1;
        Ok(st.keywords.clone())
    }

    async fn add_keywords(&self, keywords: &[String]) -> Result<Vec<String>> {
        let mut st = self.lock();
        st.keyword_calls += 1;
        let mut added = Vec::new();
        for text in keywords {
            if st.keywords.iter().any(|k| &k.text == text) {
                continue;
            }
            st.next_keyword_id += 1;
            let id = KeywordId(st.next_keyword_id);
            st.keywords.push(Keyword {
                id,
                text: text.clone(),
                active: true,
                created_at: "2024-03-15T09:00:00".into(),
                last_used: None,
                use_count: 0,
            });
            added.push(text.clone());
        }
        Ok(added)
    }

    async fn delete_keyword(&self, id: KeywordId) -> Result<()> {
        let mut st = self.lock();
        st.keyword_calls += 1;
        let before = st.keywords.len();
        st.keywords.retain(|k| k.id != id);
        if st.keywords.len() == before {
            return Err(ConsoleError::NotFound {
                resource: "keyword",
                id: id.0,
            });
        }
        Ok(())
    }

    async fn toggle_keyword(&self, id: KeywordId) -> Result<()> {
        let mut st = self.lock();
        st.keyword_calls += 1;
        let keyword = st
            .keywords
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or(ConsoleError::NotFound {
                resource: "keyword",
                id: id.0,
            })?;
        keyword.active = !keyword.active;
        Ok(())
    }
}

#[async_trait]
impl StatsApi for FakeService {
    async fn daily_stats(&self, _range: &DateRange) -> Result<Vec<StatSnapshot>> {
        Ok(self.lock().daily.clone())
    }

    async fn position_counts(&self, _days: u32) -> Result<Vec<PositionCount>> {
        Ok(self.lock().positions.clone())
    }

    async fn execution_calendar(
        &self,
        _year: i32,
        _month: Option<u8>,
    ) -> Result<Vec<CalendarDay>> {
        Ok(self.lock().calendar.clone())
    }
}

#[async_trait]
impl CompetitionApi for FakeService {
    async fn top_competitors(&self, limit: u32, _days: u32) -> Result<Vec<CompetitorRanking>> {
        Ok(self
            .lock()
            .competitors
            .iter()
            .take(limit as usize)
            .map(|(ranking, _)| ranking.clone())
            .collect())
    }

    async fn competitor_details(&self, id: CompetitorId, _days: u32) -> Result<CompetitorDetails> {
        let st = self.lock();
        let (ranking, keyword_analysis) = st
            .competitors
            .iter()
            .find(|(r, _)| r.competitor.id == id)
            .ok_or(ConsoleError::NotFound {
                resource: "competitor",
                id: id.0,
            })?;
        Ok(CompetitorDetails {
            competitor: ranking.competitor.clone(),
            keyword_analysis: keyword_analysis.clone(),
        })
    }
}

#[async_trait]
impl ContactApi for FakeService {
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let st = self.lock();
        let mut listed: Vec<Contact> = st
            .contacts
            .iter()
            .filter(|c| filter.kind.as_deref().map_or(true, |k| c.kind == k))
            .cloned()
            .map(|mut c| {
                if let Some((ranking, _)) =
                    st.competitors.iter().find(|(r, _)| r.competitor.id == c.competitor_id)
                {
                    c.competitor_domain = Some(ranking.competitor.domain.clone());
                    c.competitor_name = ranking.competitor.business_name.clone();
                }
                c
            })
            .collect();
        listed.sort_by(|a, b| b.times_found.cmp(&a.times_found));
        Ok(listed)
    }

    async fn competitor_contacts(&self, id: CompetitorId) -> Result<Vec<Contact>> {
        let mut st = self.lock();
        if let Some(msg) = st.fail_contacts.take() {
            return Err(remote(500, msg));
        }
        Ok(st
            .contacts
            .iter()
            .filter(|c| c.competitor_id == id)
            .cloned()
            .collect())
    }
}
