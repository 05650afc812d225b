use async_trait::async_trait;
use reqwest::header::{HeaderMap, SET_COOKIE};

use crate::{cookie::split_set_cookie, error::BoxError, RequestOptions, RequestState};

/// Classifies why no usable HTTP response was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    /// The configured timeout elapsed.
    Timeout,
    /// Connection could not be established.
    Connect,
    /// The attempt was cancelled.
    Aborted,
    /// The request could not be built (bad method, header, URL).
    InvalidRequest,
    Other,
}

/// Raw HTTP response as produced by a transport.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    /// Effective URL after redirects.
    pub url: String,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: HeaderMap::new(),
            url: String::new(),
            body: Vec::new(),
        }
    }

    /// Case-insensitive header lookup; the first value wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name.to_ascii_lowercase().as_str())
            .and_then(|value| value.to_str().ok())
    }
}

/// Error raised by a transport when an attempt fails.
///
/// Some transports still expose the response that caused the failure; it is
/// kept in [`TransportError::response`] so retry strategies can inspect it.
#[derive(Debug, thiserror::Error)]
#[error("{name}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub name: String,
    pub message: String,
    pub response: Option<TransportResponse>,
    #[source]
    pub source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        let name = match kind {
            TransportErrorKind::Timeout => "TimeoutError",
            TransportErrorKind::Connect => "ConnectError",
            TransportErrorKind::Aborted => "AbortError",
            TransportErrorKind::InvalidRequest => "RequestError",
            TransportErrorKind::Other => "TransportError",
        };
        Self {
            kind,
            name: name.to_owned(),
            message: message.into(),
            response: None,
            source: None,
        }
    }

    pub fn with_response(mut self, response: TransportResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

/// Sends requests on behalf of [`crate::ResubmitClient`].
///
/// Implementations only move bytes: retry, backoff and cookies are handled
/// by the caller. Timeouts are enforced here using
/// [`RequestOptions::timeout_ms`] and reported as
/// [`TransportErrorKind::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, request: &RequestOptions) -> Result<TransportResponse, TransportError>;

    /// Every `Set-Cookie` value of `response`, with folded values split apart.
    fn set_cookies(&self, response: &TransportResponse) -> Vec<String> {
        response
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(split_set_cookie)
            .collect()
    }

    /// Response carried by a failed attempt, if the transport exposes one.
    fn error_response(
        &self,
        _state: &RequestState,
        error: &TransportError,
    ) -> Option<TransportResponse> {
        error.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderValue, SET_COOKIE};

    use super::{TransportError, TransportErrorKind, TransportResponse};

    #[test]
    fn header_lookup_ignores_case() {
        let mut response = TransportResponse::new(200);
        response
            .headers
            .insert("etag", HeaderValue::from_static("\"abc\""));
        assert_eq!(response.header("ETag"), Some("\"abc\""));
        assert_eq!(response.header("Retry-After"), None);
    }

    #[test]
    fn error_names_follow_kind() {
        let err = TransportError::new(TransportErrorKind::Timeout, "timed out after 20ms");
        assert_eq!(err.name, "TimeoutError");
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "TimeoutError: timed out after 20ms");
    }

    #[test]
    fn folded_set_cookie_values_are_split() {
        struct Noop;
        #[async_trait::async_trait]
        impl super::Transport for Noop {
            async fn submit(
                &self,
                _request: &crate::RequestOptions,
            ) -> Result<TransportResponse, TransportError> {
                Ok(TransportResponse::new(204))
            }
        }

        let mut response = TransportResponse::new(200);
        response.headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a=1; Expires=Wed, 21 Oct 2037 07:28:00 GMT, b=2"),
        );
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static("c=3; Path=/"));

        let cookies = super::Transport::set_cookies(&Noop, &response);
        assert_eq!(
            cookies,
            vec![
                "a=1; Expires=Wed, 21 Oct 2037 07:28:00 GMT".to_owned(),
                "b=2".to_owned(),
                "c=3; Path=/".to_owned(),
            ]
        );
    }
}
