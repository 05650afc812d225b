use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock},
};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{ClientOptions, Headers, Logger, RequestOptions, ResponseSummary, RetryLimit};

/// Header a caller can set to choose the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Retry bookkeeping for one logical request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryRecord {
    retries: u32,
    retry_wait_ms: u64,
    retry_responses: Vec<ResponseSummary>,
    start_time: i64,
    end_time: i64,
}

/// Mutable record of one logical request across all of its attempts.
///
/// Created once before the first attempt and updated in place; it is owned by
/// that request alone and never shared.
pub struct RequestState {
    request: RequestOptions,
    count: RetryLimit,
    delay_ms: u64,
    delay_multiple: f64,
    request_id: OnceLock<String>,
    retry: RetryRecord,
    logger: Arc<dyn Logger>,
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestState")
            .field("request_id", &self.request_id())
            .field("method", &self.request.method)
            .field("url", &self.request.url)
            .field("headers", &self.request.headers.redacted())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RequestState {
    pub fn new(mut request: RequestOptions, options: &ClientOptions, logger: Arc<dyn Logger>) -> Self {
        request.timeout_ms.get_or_insert(options.timeout_ms);
        Self {
            request,
            count: options.retry.count,
            delay_ms: options.retry.delay_ms,
            delay_multiple: options.retry.delay_multiple,
            request_id: OnceLock::new(),
            retry: RetryRecord::default(),
            logger,
        }
    }

    pub fn request(&self) -> &RequestOptions {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestOptions {
        &mut self.request
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn headers(&self) -> &Headers {
        &self.request.headers
    }

    /// Value of an exact-case `x-request-id` header, or a generated id.
    ///
    /// Resolved on first use and stable for the lifetime of the state.
    pub fn request_id(&self) -> &str {
        self.request_id.get_or_init(|| {
            self.request
                .headers
                .get_exact(REQUEST_ID_HEADER)
                .map(str::to_owned)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
        })
    }

    pub fn retries(&self) -> u32 {
        self.retry.retries
    }

    pub fn retry_wait_ms(&self) -> u64 {
        self.retry.retry_wait_ms
    }

    pub fn retry_responses(&self) -> &[ResponseSummary] {
        &self.retry.retry_responses
    }

    pub fn start_time(&self) -> i64 {
        self.retry.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.retry.end_time
    }

    /// Duration of the current attempt in ms, or 0 while it is in flight.
    pub fn request_time(&self) -> i64 {
        if self.retry.start_time > 0 && self.retry.end_time > 0 {
            self.retry.end_time - self.retry.start_time
        } else {
            0
        }
    }

    /// Records the dispatch time of a new attempt and clears its end time.
    pub fn set_start_time(&mut self, epoch_ms: i64) {
        self.retry.start_time = epoch_ms;
        self.retry.end_time = 0;
    }

    pub fn set_end_time(&mut self, epoch_ms: i64) {
        self.retry.end_time = epoch_ms;
    }

    pub fn mark_start(&mut self) {
        self.set_start_time(now_ms());
    }

    pub fn mark_end(&mut self) {
        self.set_end_time(now_ms());
    }

    /// Records one retried attempt and the delay applied before the next one.
    pub fn add_retry(&mut self, summary: ResponseSummary, delay_ms: u64) {
        self.retry.retry_responses.push(summary);
        self.retry.retries += 1;
        self.retry.retry_wait_ms = self.retry.retry_wait_ms.saturating_add(delay_ms);
    }

    /// Redacted, serializable snapshot.
    ///
    /// The body, retry strategies and credentials are left out.
    pub fn to_json(&self) -> RequestSnapshot {
        RequestSnapshot {
            request_id: self.request_id().to_owned(),
            method: self.request.method.clone(),
            url: self.request.url.clone(),
            headers: self.request.headers.redacted(),
            timeout: self.request.timeout_ms,
            options: self.request.extra.clone(),
            retry: RetrySnapshot {
                count: self.count,
                delay: self.delay_ms,
                delay_multiple: self.delay_multiple,
                retries: self.retry.retries,
                retry_wait_ms: self.retry.retry_wait_ms,
                retry_responses: self.retry.retry_responses.clone(),
                start_time: self.retry.start_time,
                end_time: self.retry.end_time,
            },
            request_time: self.request_time(),
        }
    }

    pub fn debug(&self, message: fmt::Arguments<'_>) {
        self.logger.debug(format_args!("{} {}", self.prefix(), message));
    }

    pub fn info(&self, message: fmt::Arguments<'_>) {
        self.logger.info(format_args!("{} {}", self.prefix(), message));
    }

    pub fn warn(&self, message: fmt::Arguments<'_>) {
        self.logger.warn(format_args!("{} {}", self.prefix(), message));
    }

    pub fn error(&self, message: fmt::Arguments<'_>) {
        self.logger.error(format_args!("{} {}", self.prefix(), message));
    }

    fn prefix(&self) -> String {
        format!(
            "[{}] {} {}",
            self.request_id(),
            self.request.method,
            self.request.url
        )
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serializable view of a [`RequestState`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Transport pass-through options.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    pub retry: RetrySnapshot,
    pub request_time: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySnapshot {
    pub count: RetryLimit,
    pub delay: u64,
    pub delay_multiple: f64,
    pub retries: u32,
    pub retry_wait_ms: u64,
    pub retry_responses: Vec<ResponseSummary>,
    pub start_time: i64,
    pub end_time: i64,
}
