//! Retry decision engine.
//!
//! A [`RetryChain`] of [`RetryStrategy`] values is evaluated in order for every
//! attempt; the first strategy that asks for a retry decides the delay, the
//! attempt cap and any request overrides. [`RetryCoordinator`] runs the attempt
//! loop around it.

mod backoff;
mod chain;
mod coordinator;
mod strategy;

pub use backoff::{backoff_delay, retry_after_ms};
pub use chain::RetryChain;
pub use coordinator::{RetryCoordinator, RetryDecision};
pub use strategy::{AttemptContext, CustomStrategy, RetryStrategy};
