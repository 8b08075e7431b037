use super::{CompetitionApi, ContactApi, ContactFilter, DateRange, ExecutionApi, KeywordApi, StatsApi};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::model::{
    CalendarDay, CompetitorDetails, CompetitorId, CompetitorRanking, Contact, Execution,
    ExecutionId, ExecutionMode, Keyword, KeywordId, PositionCount, StatSnapshot,
};
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct StartRequest {
    headless: bool,
}

#[derive(Serialize)]
struct AddKeywordsRequest<'a> {
    keywords: &'a [String],
}

#[derive(Deserialize)]
struct AddKeywordsResponse {
    #[serde(default)]
    added: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// `reqwest` client for the crawler service REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(cfg: &ConsoleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| ConsoleError::Config(format!("invalid URL {raw}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Turn non-2xx responses into `ConsoleError::Remote`, preferring the service's `detail` message.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ConsoleError::Remote {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn not_found_as(err: ConsoleError, resource: &'static str, id: u64) -> ConsoleError {
    match err {
        ConsoleError::Remote { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            ConsoleError::NotFound { resource, id }
        }
        other => other,
    }
}

#[async_trait]
impl ExecutionApi for ApiClient {
    async fn start_execution(&self, mode: ExecutionMode) -> Result<Execution> {
        let url = self.url("execution/start")?;
        let resp = self
            .http
            .post(url)
            .json(&StartRequest {
                headless: mode.is_headless(),
            })
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn stop_execution(&self, id: ExecutionId) -> Result<()> {
        let url = self.url(&format!("execution/stop/{id}"))?;
        let resp = self.http.post(url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn execution_status(&self, id: ExecutionId) -> Result<Execution> {
        let url = self.url(&format!("execution/status/{id}"))?;
        self.get_json(url).await
    }

    async fn list_executions(&self, limit: u32, offset: u32) -> Result<Vec<Execution>> {
        let mut url = self.url("execution/list")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.get_json(url).await
    }
}

#[async_trait]
impl KeywordApi for ApiClient {
    async fn list_keywords(&self) -> Result<Vec<Keyword>> {
        let url = self.url("keywords")?;
        self.get_json(url).await
    }

    async fn add_keywords(&self, keywords: &[String]) -> Result<Vec<String>> {
        let url = self.url("keywords")?;
        let resp = self
            .http
            .post(url)
            .json(&AddKeywordsRequest { keywords })
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let body: AddKeywordsResponse = resp.json().await?;
        Ok(body.added)
    }

    async fn delete_keyword(&self, id: KeywordId) -> Result<()> {
        let url = self.url(&format!("keywords/{id}"))?;
        let resp = self.http.delete(url).send().await?;
        check_status(resp)
            .await
            .map_err(|e| not_found_as(e, "keyword", id.0))?;
        Ok(())
    }

    async fn toggle_keyword(&self, id: KeywordId) -> Result<()> {
        // The body is not needed: the registry re-lists after every mutation.
        let url = self.url(&format!("keywords/{id}/toggle"))?;
        let resp = self.http.put(url).send().await?;
        check_status(resp)
            .await
            .map_err(|e| not_found_as(e, "keyword", id.0))?;
        Ok(())
    }
}

#[async_trait]
impl StatsApi for ApiClient {
    async fn daily_stats(&self, range: &DateRange) -> Result<Vec<StatSnapshot>> {
        let mut url = self.url("performance/daily-stats")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(start) = range.start.as_deref() {
                pairs.append_pair("start_date", start);
            }
            if let Some(end) = range.end.as_deref() {
                pairs.append_pair("end_date", end);
            }
        }
        self.get_json(url).await
    }

    async fn position_counts(&self, days: u32) -> Result<Vec<PositionCount>> {
        let mut url = self.url("performance/lidery-positions")?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    async fn execution_calendar(&self, year: i32, month: Option<u8>) -> Result<Vec<CalendarDay>> {
        let mut url = self.url("performance/execution-calendar")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("year", &year.to_string());
            if let Some(month) = month {
                pairs.append_pair("month", &month.to_string());
            }
        }
        self.get_json(url).await
    }
}

#[async_trait]
impl CompetitionApi for ApiClient {
    async fn top_competitors(&self, limit: u32, days: u32) -> Result<Vec<CompetitorRanking>> {
        let mut url = self.url("competition/top-competitors")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    async fn competitor_details(&self, id: CompetitorId, days: u32) -> Result<CompetitorDetails> {
        let mut url = self.url(&format!("competition/competitor/{id}/details"))?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url)
            .await
            .map_err(|e| not_found_as(e, "competitor", id.0))
    }
}

#[async_trait]
impl ContactApi for ApiClient {
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let url = contacts_url(self.url("contacts/")?, filter);
        self.get_json(url).await
    }

    async fn competitor_contacts(&self, id: CompetitorId) -> Result<Vec<Contact>> {
        let url = self.url(&format!("contacts/competitor/{id}"))?;
        self.get_json(url).await
    }
}

fn contacts_url(mut url: Url, filter: &ContactFilter) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(kind) = filter.kind.as_deref() {
            pairs.append_pair("contact_type", kind);
        }
        pairs.append_pair("days", &filter.days.to_string());
    }
    url
}
