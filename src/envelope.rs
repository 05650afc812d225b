use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    headers::redact, RequestSnapshot, ResubmitError, Result, TransportError, TransportResponse,
};

/// Why the attempt loop handed the result back to the caller.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum Termination {
    /// No strategy asked for another attempt.
    Completed,
    /// A strategy wanted to retry but its attempt cap was reached.
    #[serde(rename_all = "camelCase")]
    Exhausted { strategy: String, max_retries: u32 },
}

/// Name and message of a failed attempt.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body-free, redacted record of one attempt.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}

#[derive(Debug)]
enum Outcome {
    Response(TransportResponse),
    Failed {
        error: TransportError,
        response: Option<TransportResponse>,
    },
}

/// Normalized outcome of one attempt: a response, an error, or an error that
/// still exposes the response it came from.
#[derive(Debug)]
pub struct ResponseEnvelope {
    outcome: Outcome,
    request_time_ms: i64,
}

impl ResponseEnvelope {
    pub fn from_response(response: TransportResponse, request_time_ms: i64) -> Self {
        Self {
            outcome: Outcome::Response(response),
            request_time_ms,
        }
    }

    /// Wraps a failed attempt; `response` is whatever partial HTTP response
    /// the transport could recover from the error.
    pub fn from_error(
        error: TransportError,
        response: Option<TransportResponse>,
        request_time_ms: i64,
    ) -> Self {
        Self {
            outcome: Outcome::Failed { error, response },
            request_time_ms,
        }
    }

    /// `None` when no HTTP response was obtained at all.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    pub fn status_text(&self) -> Option<&str> {
        self.response().map(|response| response.status_text.as_str())
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.response().map(|response| &response.headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response()?.header(name)
    }

    pub fn response(&self) -> Option<&TransportResponse> {
        match &self.outcome {
            Outcome::Response(response) => Some(response),
            Outcome::Failed { response, .. } => response.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match &self.outcome {
            Outcome::Response(_) => None,
            Outcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn request_time_ms(&self) -> i64 {
        self.request_time_ms
    }

    pub fn to_json(&self) -> ResponseSummary {
        ResponseSummary {
            status: self.status(),
            status_text: self
                .status_text()
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
            headers: self.headers().map(redacted_headers),
            request_time: Some(self.request_time_ms),
            error: self.error().map(|error| ErrorSummary {
                name: Some(error.name.clone()),
                message: Some(error.message.clone()),
            }),
        }
    }

    /// Attaches `request` and the envelope's own summary to the underlying
    /// outcome: an error becomes `Err`, a response becomes `Ok`.
    pub fn into_client_result(
        self,
        request: RequestSnapshot,
        termination: Termination,
    ) -> Result<ClientResponse> {
        let summary = self.to_json();
        match self.outcome {
            Outcome::Response(response) => Ok(ClientResponse {
                response,
                request,
                summary,
                termination,
            }),
            Outcome::Failed { error, .. } => Err(ResubmitError::Transport {
                source: error,
                request: Box::new(request),
                summary,
                termination,
            }),
        }
    }
}

fn redacted_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = redact(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        out.entry(name.as_str().to_owned())
            .and_modify(|existing| {
                if existing.as_str() != value {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
            })
            .or_insert(value);
    }
    out
}

/// Final response handed back to the caller, with its retry provenance.
#[derive(Debug)]
pub struct ClientResponse {
    pub response: TransportResponse,
    /// Redacted request state including the retry history.
    pub request: RequestSnapshot,
    /// Redacted summary of the final attempt.
    pub summary: ResponseSummary,
    pub termination: Termination,
}

impl ClientResponse {
    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.response.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.response.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.response.body)
    }

    pub fn retries(&self) -> u32 {
        self.request.retry.retries
    }
}
