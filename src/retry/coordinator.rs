use std::time::Duration;

use crate::{
    cookie::CookieSession, ClientOptions, ClientResponse, RequestOptions, RequestOverrides,
    RequestState, ResponseEnvelope, Result, RetryLimit, Termination, Transport,
};

use super::{backoff_delay, retry_after_ms, AttemptContext, RetryChain};

/// Outcome of evaluating the chain for one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryDecision {
    pub should_retry: bool,
    /// Wait before the next attempt; `0` when not retrying.
    pub delay_ms: u64,
    /// Shallow overrides for the next attempt's request options.
    pub request_overrides: RequestOverrides,
    /// Strategy that matched, if any.
    pub strategy: Option<String>,
    /// Set when a matching strategy was overruled by its attempt cap.
    pub max_retries: Option<u32>,
}

impl RetryDecision {
    fn no_match() -> Self {
        Self {
            should_retry: false,
            delay_ms: 0,
            request_overrides: RequestOverrides::default(),
            strategy: None,
            max_retries: None,
        }
    }

    /// How the loop ends when this decision stops it.
    pub fn termination(&self) -> Termination {
        match (&self.strategy, self.max_retries) {
            (Some(strategy), Some(max_retries)) if !self.should_retry => Termination::Exhausted {
                strategy: strategy.clone(),
                max_retries,
            },
            _ => Termination::Completed,
        }
    }
}

/// Drives the attempt loop of one logical request.
#[derive(Clone, Debug)]
pub struct RetryCoordinator {
    chain: RetryChain,
    max_attempts: RetryLimit,
    delay_ms: u64,
    delay_multiple: f64,
}

impl RetryCoordinator {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            chain: RetryChain::from_options(options),
            max_attempts: options.retry.count,
            delay_ms: options.retry.delay_ms,
            delay_multiple: options.retry.delay_multiple,
        }
    }

    pub fn chain(&self) -> &RetryChain {
        &self.chain
    }

    /// Decides whether the attempt in `envelope` is retried.
    ///
    /// `attempts` is the 1-based number of the attempt being judged and
    /// `request` the options it was sent with.
    pub fn evaluate(
        &self,
        envelope: &ResponseEnvelope,
        attempts: u32,
        request: &RequestOptions,
    ) -> Result<RetryDecision> {
        let (delay_ms, delay_multiple) = match envelope
            .header("retry-after")
            .and_then(|value| retry_after_ms(value, chrono::Utc::now()))
        {
            Some(retry_after) => (retry_after, 1.0),
            None => (self.delay_ms, self.delay_multiple),
        };

        let ctx = AttemptContext {
            attempts,
            max_attempts: self.max_attempts,
            delay_ms,
            delay_multiple,
            response: envelope,
            url: &request.url,
            options: request,
        };

        let Some(strategy) = self.chain.first_match(&ctx)? else {
            return Ok(RetryDecision::no_match());
        };

        let limit = strategy.max_retries(&ctx)?;
        if limit.is_reached(attempts) {
            return Ok(RetryDecision {
                strategy: Some(strategy.name().to_owned()),
                max_retries: match limit {
                    RetryLimit::Limited(max) => Some(max),
                    RetryLimit::Unbounded => None,
                },
                ..RetryDecision::no_match()
            });
        }

        let base = strategy.delay(&ctx)?;
        let multiple = strategy.delay_multiple(&ctx)?;
        Ok(RetryDecision {
            should_retry: true,
            delay_ms: backoff_delay(base, multiple, attempts),
            request_overrides: strategy.request_options(&ctx)?,
            strategy: Some(strategy.name().to_owned()),
            max_retries: None,
        })
    }

    /// Sends `state`'s request until the chain stops asking for retries.
    ///
    /// When `cookies` is set, the outgoing `Cookie` header is rebuilt before
    /// every attempt and each response's `Set-Cookie` values are stored.
    pub async fn run<T>(
        &self,
        transport: &T,
        state: &mut RequestState,
        cookies: Option<&CookieSession<'_>>,
    ) -> Result<ClientResponse>
    where
        T: Transport + ?Sized,
    {
        loop {
            if let Some(cookies) = cookies {
                cookies.attach(state)?;
            }

            let attempts = state.retries() + 1;
            state.debug(format_args!("sending attempt {attempts}"));
            state.mark_start();
            let outcome = transport.submit(state.request()).await;
            state.mark_end();

            let envelope = match outcome {
                Ok(response) => ResponseEnvelope::from_response(response, state.request_time()),
                Err(error) => {
                    let response = transport.error_response(state, &error);
                    ResponseEnvelope::from_error(error, response, state.request_time())
                }
            };

            if let (Some(cookies), Some(response)) = (cookies, envelope.response()) {
                cookies.collect(state, response, transport.set_cookies(response));
            }

            let decision = match self.evaluate(&envelope, attempts, state.request()) {
                Ok(decision) => decision,
                Err(err) => {
                    state.error(format_args!("attempt {attempts} could not be evaluated: {err}"));
                    return Err(err);
                }
            };
            if !decision.should_retry {
                let termination = decision.termination();
                if let Termination::Exhausted {
                    strategy,
                    max_retries,
                } = &termination
                {
                    state.warn(format_args!(
                        "strategy {strategy} still matches after {attempts} of {max_retries} attempts, giving up"
                    ));
                }
                state.debug(format_args!(
                    "finished after {attempts} attempt(s) with status {:?} in {} ms",
                    envelope.status(),
                    envelope.request_time_ms()
                ));
                let snapshot = state.to_json();
                return envelope.into_client_result(snapshot, termination);
            }

            state.info(format_args!(
                "attempt {attempts} matched {}, retrying in {} ms",
                decision.strategy.as_deref().unwrap_or_default(),
                decision.delay_ms
            ));
            state.add_retry(envelope.to_json(), decision.delay_ms);
            state.request_mut().apply(decision.request_overrides);
            tokio::time::sleep(Duration::from_millis(decision.delay_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::RetryCoordinator;
    use crate::{
        ClientOptions, CustomStrategy, RequestOptions, ResponseEnvelope, RetryLimit, Termination,
        TransportResponse,
    };

    fn options(delay_ms: u64, delay_multiple: f64) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.retry.delay_ms = delay_ms;
        options.retry.delay_multiple = delay_multiple;
        options
    }

    fn envelope(status: u16) -> ResponseEnvelope {
        ResponseEnvelope::from_response(TransportResponse::new(status), 0)
    }

    #[test]
    fn successful_response_is_final_without_opt_ins() {
        let coordinator = RetryCoordinator::new(&ClientOptions::default());
        let decision = coordinator
            .evaluate(&envelope(200), 1, &RequestOptions::get("https://api.test"))
            .expect("no error");

        assert!(!decision.should_retry);
        assert_eq!(decision.strategy, None);
        assert_eq!(decision.termination(), Termination::Completed);
    }

    #[test]
    fn backoff_uses_attempt_number() {
        let coordinator = RetryCoordinator::new(&options(10, 2.0));
        let request = RequestOptions::get("https://api.test");
        let delays: Vec<u64> = (1..=2)
            .map(|attempt| {
                coordinator
                    .evaluate(&envelope(500), attempt, &request)
                    .expect("no error")
                    .delay_ms
            })
            .collect();
        assert_eq!(delays, [10, 20]);
    }

    #[test]
    fn retry_after_overrides_ambient_delay_and_multiple() {
        let throttled =
            CustomStrategy::new("throttled").should_retry(|ctx| Ok(ctx.status() == Some(429)));
        let coordinator = RetryCoordinator::new(&options(1_000, 2.0).with_strategy(throttled));

        let mut response = TransportResponse::new(429);
        response
            .headers
            .insert("retry-after", HeaderValue::from_static("5"));
        let envelope = ResponseEnvelope::from_response(response, 0);
        let request = RequestOptions::get("https://api.test");

        for attempt in 1..=2 {
            let decision = coordinator
                .evaluate(&envelope, attempt, &request)
                .expect("no error");
            assert!(decision.should_retry);
            assert_eq!(decision.delay_ms, 5_000, "attempt {attempt}");
        }
    }

    #[test]
    fn strategy_may_override_retry_after_defaults() {
        let strategy = CustomStrategy::new("slow")
            .should_retry(|ctx| Ok(ctx.status() == Some(429)))
            .delay(|ctx| Ok(ctx.delay_ms * 2))
            .delay_multiple(|_| Ok(3.0));
        let mut options = options(1_000, 2.0).with_strategy(strategy);
        options.retry.count = RetryLimit::Limited(10);
        let coordinator = RetryCoordinator::new(&options);

        let mut response = TransportResponse::new(429);
        response
            .headers
            .insert("Retry-After", HeaderValue::from_static("1"));
        let decision = coordinator
            .evaluate(
                &ResponseEnvelope::from_response(response, 0),
                3,
                &RequestOptions::get("https://api.test"),
            )
            .expect("no error");

        assert_eq!(decision.strategy.as_deref(), Some("slow"));
        assert_eq!(decision.delay_ms, 18_000);
    }

    #[test]
    fn attempt_cap_overrules_matching_strategy() {
        let coordinator = RetryCoordinator::new(&ClientOptions::default());
        let request = RequestOptions::get("https://api.test");

        assert!(coordinator.evaluate(&envelope(500), 2, &request).expect("no error").should_retry);

        let decision = coordinator
            .evaluate(&envelope(500), 3, &request)
            .expect("no error");
        assert!(!decision.should_retry);
        assert_eq!(
            decision.termination(),
            Termination::Exhausted {
                strategy: "ErrorStatusCode".to_owned(),
                max_retries: 3,
            }
        );
    }

    #[test]
    fn unbounded_limit_never_stops() {
        let mut options = options(1, 1.0);
        options.retry.count = RetryLimit::Unbounded;
        let coordinator = RetryCoordinator::new(&options);
        let request = RequestOptions::get("https://api.test");

        for attempt in [1, 3, 1_000, u32::MAX] {
            assert!(
                coordinator
                    .evaluate(&envelope(500), attempt, &request)
                    .expect("no error")
                    .should_retry,
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn strategy_limit_replaces_ambient_limit() {
        let strategy = CustomStrategy::new("teapot")
            .should_retry(|ctx| Ok(ctx.status() == Some(418)))
            .max_retries(|_| Ok(RetryLimit::Limited(1)));
        let coordinator = RetryCoordinator::new(&ClientOptions::default().with_strategy(strategy));

        let decision = coordinator
            .evaluate(&envelope(418), 1, &RequestOptions::get("https://api.test"))
            .expect("no error");
        assert!(!decision.should_retry);
        assert_eq!(decision.strategy.as_deref(), Some("teapot"));
    }
}
