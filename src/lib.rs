//! `http-resubmit` adds retry/backoff policy and cookie sessions to any async
//! HTTP transport.
//!
//! The crate does no I/O itself. A [`Transport`] sends each attempt;
//! [`ResubmitClient`] decides whether to resubmit, how long to wait, and which
//! cookies to attach:
//! - [`ResubmitClient::send`]
//! - [`ResubmitClient::send_with_options`]
//! - [`retry::RetryCoordinator::evaluate`]
//!
//! ```no_run
//! use http_resubmit::{ClientOptions, RequestOptions, ResubmitClient};
//!
//! # async fn run() -> http_resubmit::Result<()> {
//! let mut options = ClientOptions::default();
//! options.eventually_consistent_create = true;
//! options.cookies = true;
//!
//! let client = ResubmitClient::reqwest().with_options(options);
//! let response = client
//!     .send(RequestOptions::get("https://api.example.com/items/42"))
//!     .await?;
//! println!("{} after {} retries", response.status(), response.retries());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod cookie;
mod envelope;
mod error;
mod headers;
mod logger;
mod options;
mod reqwest_transport;
mod request;
pub mod retry;
mod state;
mod transport;

pub use client::ResubmitClient;
pub use cookie::CookieJar;
pub use envelope::{ClientResponse, ErrorSummary, ResponseEnvelope, ResponseSummary, Termination};
pub use error::{BoxError, ResubmitError};
pub use headers::{Headers, REDACTED};
pub use logger::{Logger, TracingLogger};
pub use options::{ClientOptions, RetryLimit, RetryOptions};
pub use reqwest_transport::ReqwestTransport;
pub use request::{RequestOptions, RequestOverrides};
pub use retry::{AttemptContext, CustomStrategy, RetryStrategy};
pub use state::{RequestSnapshot, RequestState, RetrySnapshot, REQUEST_ID_HEADER};
pub use transport::{Transport, TransportError, TransportErrorKind, TransportResponse};

pub type Result<T> = std::result::Result<T, ResubmitError>;
