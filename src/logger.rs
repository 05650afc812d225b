use std::fmt;

/// Log sink used by the retry loop and cookie bridge.
///
/// The crate never filters by level; that is left to the implementation.
pub trait Logger: Send + Sync {
    fn debug(&self, message: fmt::Arguments<'_>);
    fn info(&self, message: fmt::Arguments<'_>);
    fn warn(&self, message: fmt::Arguments<'_>);
    fn error(&self, message: fmt::Arguments<'_>);
}

/// Forwards every line to a `tracing` event under the `http_resubmit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: fmt::Arguments<'_>) {
        tracing::debug!(target: "http_resubmit", "{}", message);
    }

    fn info(&self, message: fmt::Arguments<'_>) {
        tracing::info!(target: "http_resubmit", "{}", message);
    }

    fn warn(&self, message: fmt::Arguments<'_>) {
        tracing::warn!(target: "http_resubmit", "{}", message);
    }

    fn error(&self, message: fmt::Arguments<'_>) {
        tracing::error!(target: "http_resubmit", "{}", message);
    }
}
