//! Logger Collaborator
//!
//! The table reports scheduler arm/disarm events to an optional logger.
//! Formatting and output destination belong to the logger, not the table.

use std::fmt;

/// Receives descriptive messages from a cache table.
pub trait Logger: Send + Sync {
    fn log(&self, message: fmt::Arguments<'_>);
}

impl<F> Logger for F
where
    F: Fn(fmt::Arguments<'_>) + Send + Sync,
{
    fn log(&self, message: fmt::Arguments<'_>) {
        self(message)
    }
}

// == Tracing Logger ==
/// Forwards table messages to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: fmt::Arguments<'_>) {
        tracing::info!("{}", message);
    }
}
