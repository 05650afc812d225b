use serde::Serialize;
use serde_json::{Map, Value};

use crate::Headers;

/// Everything the transport needs to send one attempt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestOptions {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    /// Request body, never included in snapshots.
    #[serde(skip)]
    pub body: Option<Vec<u8>>,
    /// Per-attempt timeout; falls back to [`crate::ClientOptions::timeout_ms`].
    #[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Opaque transport-specific settings passed through untouched.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into().to_ascii_uppercase(),
            headers: Headers::new(),
            body: None,
            timeout_ms: None,
            extra: Map::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Shallow-merges `overrides` onto these options.
    ///
    /// Fields left unset in `overrides` keep their current value. `headers`
    /// replaces the whole header map; `extra` replaces key by key.
    pub fn apply(&mut self, overrides: RequestOverrides) {
        let RequestOverrides {
            url,
            method,
            headers,
            body,
            timeout_ms,
            extra,
        } = overrides;

        if let Some(url) = url {
            self.url = url;
        }
        if let Some(method) = method {
            self.method = method.to_ascii_uppercase();
        }
        if let Some(headers) = headers {
            self.headers = headers;
        }
        if let Some(body) = body {
            self.body = Some(body);
        }
        if let Some(timeout_ms) = timeout_ms {
            self.timeout_ms = Some(timeout_ms);
        }
        self.extra.extend(extra);
    }
}

/// Fields a retry strategy may change for the next attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOverrides {
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<Headers>,
    pub body: Option<Vec<u8>>,
    pub timeout_ms: Option<u64>,
    pub extra: Map<String, Value>,
}

impl RequestOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
