//! Logger facade passed explicitly through component constructors.
//!
//! The process builds one root [`Logger`] after the `tracing` subscriber is
//! installed and hands clones of it (or children derived from it) to every
//! component. Each logger owns a [`tracing::Span`]; futures run under that
//! span via [`Logger::instrument`], so plain `tracing` macros inside them
//! pick up the `service`, `actor`, `session_id` and `trace_id` fields.

use std::future::Future;
use tracing::instrument::Instrumented;
use tracing::{info_span, Instrument, Span};

/// Structured logging handle scoped to a component.
#[derive(Debug, Clone)]
pub struct Logger {
    span: Span,
}

impl Logger {
    /// Root logger for a service.
    pub fn new(service: &str) -> Self {
        Self {
            span: info_span!("service", service = %service),
        }
    }

    /// A logger that attaches no fields. Events still reach the subscriber.
    pub fn detached() -> Self {
        Self { span: Span::none() }
    }

    /// Child logger for a named actor.
    pub fn actor(&self, name: &str) -> Self {
        Self {
            span: info_span!(parent: &self.span, "actor", actor = %name),
        }
    }

    /// Child logger for one client session on a transport.
    pub fn session(&self, protocol: &str, session_id: i64) -> Self {
        Self {
            span: info_span!(parent: &self.span, "session", protocol = %protocol, session_id),
        }
    }

    /// Child logger tagged with a trace id.
    pub fn with_trace_id(&self, trace_id: &str) -> Self {
        Self {
            span: info_span!(parent: &self.span, "trace", trace_id = %trace_id),
        }
    }

    /// Runs `future` inside this logger's span.
    pub fn instrument<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(self.span.clone())
    }

    /// Runs a synchronous closure inside this logger's span.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_loggers_run_closures_in_place() {
        let logger = Logger::new("test").actor("portal").with_trace_id("trace-1");
        assert_eq!(logger.in_scope(|| 7), 7);
        assert_eq!(Logger::default().session("tcp", 3).in_scope(|| "done"), "done");
    }
}
