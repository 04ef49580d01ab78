//! HTTP client for the external bookkeeping API: token lifecycle, paginated
//! list fetch, per-record detail lookup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use finboard_core::TransactionKind;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "finboard-api";

/// Fixed page size the list endpoints are walked with.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    RateLimited,
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::RateLimited
    } else if status.is_server_error() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Access or refresh token rejected; the tenant must reconnect. Fatal for
    /// the current round, never retried automatically.
    #[error("bookkeeping token rejected; reconnection required")]
    Unauthorized,
    #[error("rate limited by bookkeeping API")]
    RateLimited,
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("decoding bookkeeping response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Due-date window the list endpoints are filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// True category for one record, extracted from the detail endpoint's nested
/// allocation structure. `None` means the source itself has no category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordDetail {
    pub category_name: Option<String>,
}

/// Typed view of one raw list item; the mapper deserializes into this while
/// keeping the original `JsonValue` for audit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawFinancialRecord {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub entity: Option<RawEntity>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEntity {
    pub name: String,
}

/// External bookkeeping API surface the pipeline depends on. Implementations:
/// [`HttpBookkeepingClient`] against the real service, scripted fakes in tests.
///
/// `fetch_page` may retry transient failures internally per its backoff
/// policy. `fetch_detail` is single-attempt; the enrichment engine owns that
/// retry policy.
#[async_trait]
pub trait BookkeepingApi: Send + Sync {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ApiError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ApiError>;

    async fn fetch_page(
        &self,
        access_token: &str,
        kind: TransactionKind,
        range: &DateRange,
        page: u32,
    ) -> Result<Vec<JsonValue>, ApiError>;

    async fn fetch_detail(
        &self,
        access_token: &str,
        kind: TransactionKind,
        source_id: i64,
    ) -> Result<RecordDetail, ApiError>;
}

/// Walks a list endpoint page by page until an empty page, with a fixed
/// inter-page delay. Strictly sequential; a 401 anywhere aborts the walk.
pub async fn fetch_all_pages(
    api: &dyn BookkeepingApi,
    access_token: &str,
    kind: TransactionKind,
    range: &DateRange,
    page_delay: Duration,
) -> Result<Vec<JsonValue>, ApiError> {
    let mut items = Vec::new();
    let mut page = 1u32;
    loop {
        let batch = api.fetch_page(access_token, kind, range, page).await?;
        if batch.is_empty() {
            break;
        }
        debug!(kind = kind.as_str(), page, count = batch.len(), "fetched page");
        items.extend(batch);
        page += 1;
        tokio::time::sleep(page_delay).await;
    }
    Ok(items)
}

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
}

#[derive(Debug)]
pub struct HttpBookkeepingClient {
    client: reqwest::Client,
    config: ApiClientConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    allocations: Vec<DetailAllocation>,
}

#[derive(Debug, Deserialize)]
struct DetailAllocation {
    category: Option<DetailCategory>,
}

#[derive(Debug, Deserialize)]
struct DetailCategory {
    name: String,
}

impl HttpBookkeepingClient {
    pub fn new(config: ApiClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn list_path(kind: TransactionKind) -> &'static str {
        match kind {
            TransactionKind::Income => "receivables",
            TransactionKind::Expense => "payables",
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let resp = self
            .client
            .post(&self.config.auth_url)
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url: self.config.auth_url.clone(),
            });
        }
        resp.json::<TokenResponse>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// GET with bounded retries on transient failures. 401 and 429 are
    /// surfaced immediately as their typed variants.
    async fn get_json(
        &self,
        access_token: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<JsonValue, ApiError> {
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..=self.config.backoff.max_retries {
            let result = self
                .client
                .get(url)
                .bearer_auth(access_token)
                .query(query)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ApiError::Unauthorized);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(ApiError::RateLimited);
                    }
                    if status.is_success() {
                        return resp
                            .json::<JsonValue>()
                            .await
                            .map_err(|err| ApiError::Decode(err.to_string()));
                    }
                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.config.backoff.max_retries
                    {
                        last_error = Some(ApiError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        tokio::time::sleep(self.config.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(ApiError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.config.backoff.max_retries
                    {
                        last_error = Some(err.into());
                        tokio::time::sleep(self.config.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Network("retries exhausted".into())))
    }
}

#[async_trait]
impl BookkeepingApi for HttpBookkeepingClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ApiError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        kind: TransactionKind,
        range: &DateRange,
        page: u32,
    ) -> Result<Vec<JsonValue>, ApiError> {
        let url = format!("{}/{}", self.config.base_url, Self::list_path(kind));
        let query = vec![
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), PAGE_SIZE.to_string()),
            ("due_date_start".to_string(), range.start.to_string()),
            ("due_date_end".to_string(), range.end.to_string()),
        ];
        let body = self.get_json(access_token, &url, &query).await?;
        let parsed: ListResponse = serde_json::from_value(body)
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(parsed.items)
    }

    async fn fetch_detail(
        &self,
        access_token: &str,
        kind: TransactionKind,
        source_id: i64,
    ) -> Result<RecordDetail, ApiError> {
        let url = format!(
            "{}/{}/{}",
            self.config.base_url,
            Self::list_path(kind),
            source_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        let body: DetailResponse = resp
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(RecordDetail {
            category_name: body
                .allocations
                .into_iter()
                .find_map(|a| a.category.map(|c| c.name)),
        })
    }
}
