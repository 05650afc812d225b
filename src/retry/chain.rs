use crate::{ClientOptions, Result};

use super::{AttemptContext, CustomStrategy, RetryStrategy};

/// Ordered strategies evaluated with first-match-wins semantics.
///
/// Order: `ErrorStatusCode`, `NetworkError`, custom strategies as supplied,
/// then the enabled eventually-consistent strategies (create, update, delete).
#[derive(Clone, Debug)]
pub struct RetryChain {
    strategies: Vec<RetryStrategy>,
}

impl RetryChain {
    /// Chain for `options`, with only the enabled opt-in strategies.
    pub fn from_options(options: &ClientOptions) -> Self {
        let mut strategies = vec![RetryStrategy::ErrorStatusCode, RetryStrategy::NetworkError];
        strategies.extend(
            options
                .retry
                .strategies
                .iter()
                .cloned()
                .map(RetryStrategy::Custom),
        );
        for (enabled, strategy) in [
            (
                options.eventually_consistent_create,
                RetryStrategy::EventuallyConsistentCreate,
            ),
            (
                options.eventually_consistent_update,
                RetryStrategy::EventuallyConsistentUpdate,
            ),
            (
                options.eventually_consistent_delete,
                RetryStrategy::EventuallyConsistentDelete,
            ),
        ] {
            if enabled {
                strategies.push(strategy);
            }
        }
        Self { strategies }
    }

    /// Chain of the two built-in strategies followed by `custom`.
    pub fn with_custom(custom: impl IntoIterator<Item = CustomStrategy>) -> Self {
        let mut options = ClientOptions::default();
        options.retry.strategies = custom.into_iter().collect();
        Self::from_options(&options)
    }

    /// Strategies in evaluation order.
    pub fn strategies(&self) -> &[RetryStrategy] {
        &self.strategies
    }

    /// First strategy that wants to retry; later ones are not consulted.
    pub fn first_match(&self, ctx: &AttemptContext<'_>) -> Result<Option<&RetryStrategy>> {
        for strategy in &self.strategies {
            if strategy.should_retry(ctx)? {
                return Ok(Some(strategy));
            }
        }
        Ok(None)
    }
}
