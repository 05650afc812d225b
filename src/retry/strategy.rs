use std::{fmt, sync::Arc};

use crate::{
    error::BoxError, RequestOptions, RequestOverrides, ResponseEnvelope, ResubmitError, Result,
    RetryLimit,
};

/// Inputs available to a strategy when judging one attempt.
#[derive(Clone, Copy, Debug)]
pub struct AttemptContext<'a> {
    /// 1-based count of attempts sent so far, including the one being judged.
    pub attempts: u32,
    /// Ambient attempt cap.
    pub max_attempts: RetryLimit,
    /// Ambient base delay, already replaced by `Retry-After` when present.
    pub delay_ms: u64,
    /// Ambient backoff multiple, forced to `1` by `Retry-After`.
    pub delay_multiple: f64,
    pub response: &'a ResponseEnvelope,
    pub url: &'a str,
    /// Options the judged attempt was sent with.
    pub options: &'a RequestOptions,
}

impl AttemptContext<'_> {
    /// Status of the judged attempt, `None` on a pure transport failure.
    pub fn status(&self) -> Option<u16> {
        self.response.status()
    }
}

type Hook<T> = Arc<dyn Fn(&AttemptContext<'_>) -> std::result::Result<T, BoxError> + Send + Sync>;

/// User-defined strategy.
///
/// Every hook is optional. A missing `should_retry` never matches; the other
/// missing hooks fall back to the ambient [`AttemptContext`] values.
///
/// ```
/// use http_resubmit::CustomStrategy;
///
/// let throttled = CustomStrategy::new("throttled")
///     .should_retry(|ctx| Ok(ctx.status() == Some(429)))
///     .delay(|_| Ok(250));
/// ```
#[derive(Clone)]
pub struct CustomStrategy {
    name: String,
    should_retry: Option<Hook<bool>>,
    delay: Option<Hook<u64>>,
    delay_multiple: Option<Hook<f64>>,
    max_retries: Option<Hook<RetryLimit>>,
    request_options: Option<Hook<RequestOverrides>>,
}

impl fmt::Debug for CustomStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStrategy")
            .field("name", &self.name)
            .field("should_retry", &self.should_retry.is_some())
            .field("delay", &self.delay.is_some())
            .field("delay_multiple", &self.delay_multiple.is_some())
            .field("max_retries", &self.max_retries.is_some())
            .field("request_options", &self.request_options.is_some())
            .finish()
    }
}

impl CustomStrategy {
    /// Strategy named `name` with no hooks; it never matches until `should_retry` is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            should_retry: None,
            delay: None,
            delay_multiple: None,
            max_retries: None,
            request_options: None,
        }
    }

    /// Name reported in logs and in [`crate::Termination::Exhausted`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decides whether this strategy claims the attempt.
    pub fn should_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(hook));
        self
    }

    /// Base delay in milliseconds, before the multiple is applied.
    pub fn delay<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>) -> std::result::Result<u64, BoxError> + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(hook));
        self
    }

    /// Growth factor for the backoff.
    pub fn delay_multiple<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>) -> std::result::Result<f64, BoxError> + Send + Sync + 'static,
    {
        self.delay_multiple = Some(Arc::new(hook));
        self
    }

    /// Attempt cap used in place of [`crate::RetryOptions::count`].
    pub fn max_retries<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>) -> std::result::Result<RetryLimit, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.max_retries = Some(Arc::new(hook));
        self
    }

    /// Overrides merged onto the next attempt's request.
    pub fn request_options<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptContext<'_>) -> std::result::Result<RequestOverrides, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.request_options = Some(Arc::new(hook));
        self
    }

    fn call<T>(&self, hook: &Option<Hook<T>>, ctx: &AttemptContext<'_>, fallback: T) -> Result<T> {
        match hook {
            Some(hook) => hook(ctx).map_err(|source| ResubmitError::Strategy {
                strategy: self.name.clone(),
                source,
            }),
            None => Ok(fallback),
        }
    }
}

/// One rule in the retry chain.
#[derive(Clone, Debug)]
pub enum RetryStrategy {
    /// Retries any `5xx` response.
    ErrorStatusCode,
    /// Retries attempts that produced no HTTP response.
    NetworkError,
    /// Retries `404` until a created resource becomes visible.
    EventuallyConsistentCreate,
    /// Retries `200` until the `ETag` matches the request's `If-Match`.
    EventuallyConsistentUpdate,
    /// Retries until a deleted resource answers `404`.
    EventuallyConsistentDelete,
    Custom(CustomStrategy),
}

impl RetryStrategy {
    pub fn name(&self) -> &str {
        match self {
            Self::ErrorStatusCode => "ErrorStatusCode",
            Self::NetworkError => "NetworkError",
            Self::EventuallyConsistentCreate => "EventuallyConsistentCreate",
            Self::EventuallyConsistentUpdate => "EventuallyConsistentUpdate",
            Self::EventuallyConsistentDelete => "EventuallyConsistentDelete",
            Self::Custom(custom) => custom.name(),
        }
    }

    /// Whether this strategy wants another attempt.
    pub fn should_retry(&self, ctx: &AttemptContext<'_>) -> Result<bool> {
        let status = ctx.status();
        Ok(match self {
            Self::ErrorStatusCode => status.is_some_and(|status| status >= 500),
            Self::NetworkError => status.is_none(),
            Self::EventuallyConsistentCreate => status == Some(404),
            Self::EventuallyConsistentUpdate => {
                status == Some(200)
                    && ctx.options.headers.get("if-match").is_some_and(|if_match| {
                        !if_match_satisfied(if_match, ctx.response.header("etag"))
                    })
            }
            Self::EventuallyConsistentDelete => status != Some(404),
            Self::Custom(custom) => custom.call(&custom.should_retry, ctx, false)?,
        })
    }

    /// Base delay; the ambient one unless a custom hook says otherwise.
    pub fn delay(&self, ctx: &AttemptContext<'_>) -> Result<u64> {
        match self {
            Self::Custom(custom) => custom.call(&custom.delay, ctx, ctx.delay_ms),
            _ => Ok(ctx.delay_ms),
        }
    }

    /// Backoff multiple; the ambient one unless a custom hook says otherwise.
    pub fn delay_multiple(&self, ctx: &AttemptContext<'_>) -> Result<f64> {
        match self {
            Self::Custom(custom) => custom.call(&custom.delay_multiple, ctx, ctx.delay_multiple),
            _ => Ok(ctx.delay_multiple),
        }
    }

    /// Attempt cap; the ambient one unless a custom hook says otherwise.
    pub fn max_retries(&self, ctx: &AttemptContext<'_>) -> Result<RetryLimit> {
        match self {
            Self::Custom(custom) => custom.call(&custom.max_retries, ctx, ctx.max_attempts),
            _ => Ok(ctx.max_attempts),
        }
    }

    /// Overrides for the next attempt; empty for built-in strategies.
    pub fn request_options(&self, ctx: &AttemptContext<'_>) -> Result<RequestOverrides> {
        match self {
            Self::Custom(custom) => {
                custom.call(&custom.request_options, ctx, RequestOverrides::default())
            }
            _ => Ok(RequestOverrides::default()),
        }
    }
}

/// Weak `If-Match` evaluation against a response `ETag`.
///
/// `*` matches any present tag; a list matches if any member does. A missing
/// `ETag` never matches.
pub(crate) fn if_match_satisfied(if_match: &str, etag: Option<&str>) -> bool {
    let Some(etag) = etag.map(opaque_tag) else {
        return false;
    };
    if_match
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| candidate == "*" || opaque_tag(candidate) == etag)
}

fn opaque_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix("W/").unwrap_or(tag)
}
