use std::{fmt, sync::Arc};

use crate::{
    cookie::{CookieJar, CookieSession},
    retry::RetryCoordinator,
    ClientOptions, ClientResponse, Logger, ReqwestTransport, RequestOptions, RequestState, Result,
    TracingLogger, Transport,
};

/// HTTP client that retries and carries cookies on top of a [`Transport`].
///
/// Cloning is cheap; clones share the transport and the cookie jar.
pub struct ResubmitClient<T> {
    transport: Arc<T>,
    options: ClientOptions,
    cookie_jar: Arc<CookieJar>,
    logger: Arc<dyn Logger>,
}

impl<T> Clone for ResubmitClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            options: self.options.clone(),
            cookie_jar: self.cookie_jar.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<T> fmt::Debug for ResubmitClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResubmitClient")
            .field("options", &self.options)
            .field("cookies", &self.cookie_jar.len())
            .finish()
    }
}

impl ResubmitClient<ReqwestTransport> {
    /// Client over a default `reqwest::Client`.
    pub fn reqwest() -> Self {
        Self::new(ReqwestTransport::default())
    }
}

impl<T: Transport> ResubmitClient<T> {
    /// Client over `transport` with default options, an empty jar and [`TracingLogger`].
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            options: ClientOptions::default(),
            cookie_jar: Arc::new(CookieJar::new()),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Applies client-wide defaults for timeout, retries and cookies.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the default [`TracingLogger`].
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Client-wide options used by [`Self::send`].
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Transport every attempt is sent through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Jar fed by every `Set-Cookie` received while cookies are enabled.
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    /// Empties the shared cookie jar.
    pub fn clear_cookies(&self) {
        self.cookie_jar.clear();
    }

    /// Sends a `GET` to `url` with the client-wide options.
    pub async fn get(&self, url: impl Into<String>) -> Result<ClientResponse> {
        self.send(RequestOptions::get(url)).await
    }

    /// Sends `request` with the client-wide options.
    pub async fn send(&self, request: RequestOptions) -> Result<ClientResponse> {
        self.send_with_options(request, &self.options).await
    }

    /// Sends `request` with `options` in place of the client-wide ones.
    ///
    /// On success the final response is returned even if its status is an
    /// error; `Err` means the last attempt produced no usable response or a
    /// strategy failed.
    pub async fn send_with_options(
        &self,
        request: RequestOptions,
        options: &ClientOptions,
    ) -> Result<ClientResponse> {
        let cookies = if options.cookies {
            Some(CookieSession::new(&self.cookie_jar, &request)?)
        } else {
            None
        };
        let mut state = RequestState::new(request, options, self.logger.clone());
        RetryCoordinator::new(options)
            .run(self.transport.as_ref(), &mut state, cookies.as_ref())
            .await
    }
}
