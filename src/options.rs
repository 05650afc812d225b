use serde::{Deserialize, Serialize};

use crate::{retry::CustomStrategy, ResubmitError, Result};

/// Upper bound on attempts for a logical request.
///
/// Serialized as an integer where `-1` means [`RetryLimit::Unbounded`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RetryLimit {
    /// Stop once this many attempts have been sent.
    Limited(u32),
    /// Never stop because of the attempt count.
    Unbounded,
}

impl RetryLimit {
    /// Integer form of [`RetryLimit::Unbounded`].
    pub const UNBOUNDED: i64 = -1;

    /// Returns `true` once `attempts` (1-based) has used up the limit.
    pub fn is_reached(self, attempts: u32) -> bool {
        match self {
            Self::Limited(max) => attempts >= max,
            Self::Unbounded => false,
        }
    }
}

impl Default for RetryLimit {
    fn default() -> Self {
        Self::Limited(3)
    }
}

impl From<i64> for RetryLimit {
    fn from(value: i64) -> Self {
        if value == Self::UNBOUNDED {
            Self::Unbounded
        } else {
            Self::Limited(u32::try_from(value.max(0)).unwrap_or(u32::MAX))
        }
    }
}

impl From<RetryLimit> for i64 {
    fn from(limit: RetryLimit) -> Self {
        match limit {
            RetryLimit::Limited(max) => i64::from(max),
            RetryLimit::Unbounded => RetryLimit::UNBOUNDED,
        }
    }
}

/// Ambient retry defaults and user-supplied strategies.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryOptions {
    /// Default maximum number of attempts.
    pub count: RetryLimit,
    /// Base delay in milliseconds.
    #[serde(rename = "delay")]
    pub delay_ms: u64,
    /// Growth factor applied per attempt.
    pub delay_multiple: f64,
    /// Custom strategies, consulted after the built-in ones.
    #[serde(skip)]
    pub strategies: Vec<CustomStrategy>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            count: RetryLimit::default(),
            delay_ms: 1_000,
            delay_multiple: 2.0,
            strategies: Vec::new(),
        }
    }
}

/// Configures timeout, retry and cookie behavior.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds, enforced by the transport.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub retry: RetryOptions,
    /// Retry `404` until the created resource becomes visible.
    pub eventually_consistent_create: bool,
    /// Retry `200` until the response `ETag` matches the request `If-Match`.
    pub eventually_consistent_update: bool,
    /// Retry until the deleted resource answers `404`.
    pub eventually_consistent_delete: bool,
    /// Attach and collect cookies through the client-lifetime jar.
    pub cookies: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry: RetryOptions::default(),
            eventually_consistent_create: false,
            eventually_consistent_update: false,
            eventually_consistent_delete: false,
            cookies: false,
        }
    }
}

impl ClientOptions {
    /// Builds options from defaults overlaid with environment variables.
    ///
    /// Reads (all optional):
    /// - `HTTP_RESUBMIT_TIMEOUT_MS`
    /// - `HTTP_RESUBMIT_RETRY_COUNT` (`-1` for unbounded)
    /// - `HTTP_RESUBMIT_RETRY_DELAY_MS`
    /// - `HTTP_RESUBMIT_RETRY_DELAY_MULTIPLE`
    /// - `HTTP_RESUBMIT_COOKIES` (`true`/`false`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();
        if let Some(timeout) = parse_var(&lookup, "HTTP_RESUBMIT_TIMEOUT_MS")? {
            options.timeout_ms = timeout;
        }
        if let Some(count) = parse_var::<i64>(&lookup, "HTTP_RESUBMIT_RETRY_COUNT")? {
            options.retry.count = count.into();
        }
        if let Some(delay) = parse_var(&lookup, "HTTP_RESUBMIT_RETRY_DELAY_MS")? {
            options.retry.delay_ms = delay;
        }
        if let Some(multiple) = parse_var(&lookup, "HTTP_RESUBMIT_RETRY_DELAY_MULTIPLE")? {
            options.retry.delay_multiple = multiple;
        }
        if let Some(cookies) = parse_var(&lookup, "HTTP_RESUBMIT_COOKIES")? {
            options.cookies = cookies;
        }
        Ok(options)
    }

    /// Appends a custom strategy after the ones already configured.
    pub fn with_strategy(mut self, strategy: CustomStrategy) -> Self {
        self.retry.strategies.push(strategy);
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|err| ResubmitError::Config(format!("{name}={raw:?} is invalid: {err}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ClientOptions, RetryLimit};
    use crate::ResubmitError;

    #[test]
    fn defaults_match_documented_values() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout_ms, 10_000);
        assert_eq!(options.retry.count, RetryLimit::Limited(3));
        assert_eq!(options.retry.delay_ms, 1_000);
        assert_eq!(options.retry.delay_multiple, 2.0);
        assert!(!options.eventually_consistent_create);
        assert!(!options.cookies);
    }

    #[test]
    fn retry_limit_sentinel() {
        assert_eq!(RetryLimit::from(-1), RetryLimit::Unbounded);
        assert_eq!(RetryLimit::from(-5), RetryLimit::Limited(0));
        assert_eq!(i64::from(RetryLimit::Unbounded), -1);
        assert!(!RetryLimit::Unbounded.is_reached(u32::MAX));
        assert!(RetryLimit::Limited(3).is_reached(3));
        assert!(!RetryLimit::Limited(3).is_reached(2));
    }

    #[test]
    fn deserializes_namespaced_block() {
        let options: ClientOptions = serde_json::from_value(serde_json::json!({
            "timeout": 500,
            "retry": { "count": -1, "delay": 10, "delayMultiple": 1.5 },
            "eventuallyConsistentDelete": true,
            "cookies": true
        }))
        .expect("options must deserialize");

        assert_eq!(options.timeout_ms, 500);
        assert_eq!(options.retry.count, RetryLimit::Unbounded);
        assert_eq!(options.retry.delay_ms, 10);
        assert_eq!(options.retry.delay_multiple, 1.5);
        assert!(options.eventually_consistent_delete);
        assert!(!options.eventually_consistent_update);
        assert!(options.cookies);
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("HTTP_RESUBMIT_RETRY_COUNT", "5"),
            ("HTTP_RESUBMIT_RETRY_DELAY_MS", "25"),
            ("HTTP_RESUBMIT_COOKIES", "true"),
        ]
        .into();
        let options = ClientOptions::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
            .expect("env must parse");

        assert_eq!(options.retry.count, RetryLimit::Limited(5));
        assert_eq!(options.retry.delay_ms, 25);
        assert_eq!(options.timeout_ms, 10_000);
        assert!(options.cookies);
    }

    #[test]
    fn env_lookup_rejects_garbage() {
        let err = ClientOptions::from_lookup(|name| {
            (name == "HTTP_RESUBMIT_TIMEOUT_MS").then(|| "soon".to_owned())
        })
        .expect_err("must reject non-numeric timeout");
        assert!(matches!(err, ResubmitError::Config(_)));
    }
}
