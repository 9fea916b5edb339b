//! Error types and the error sink.
//!
//! User-authored code (watch getters and callbacks) returns [`BoxError`].
//! The runtime wraps those failures in [`Error`], then either hands them to
//! the configured [`ErrorSink`] (user watchers) or returns them to the caller.

use thiserror::Error;

use crate::reactive::Scope;

/// Error type returned by user-authored getters and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the reactive runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A watcher's evaluation function failed.
    #[error("getter for watcher \"{expression}\" failed: {source}")]
    Getter {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// A watcher's change callback failed.
    #[error("callback for watcher \"{expression}\" failed: {source}")]
    Callback {
        expression: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// The expression of the watcher that produced this error.
    pub fn expression(&self) -> &str {
        match self {
            Error::Getter { expression, .. } | Error::Callback { expression, .. } => expression,
        }
    }
}

/// Destination for errors raised by user-defined watchers.
///
/// `info` describes where the error happened, e.g.
/// `getter for watcher "a.b"`.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &Error, scope: Option<&Scope>, info: &str);
}

/// Default sink: logs every report through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &Error, scope: Option<&Scope>, info: &str) {
        tracing::error!(
            scope = scope.map(|s| s.name()).unwrap_or("<none>"),
            %info,
            %error,
            "error in reactive watcher"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reports_expression() {
        let err = Error::Getter {
            expression: "a.b".to_string(),
            source: "boom".into(),
        };
        assert_eq!(err.expression(), "a.b");
        assert_eq!(err.to_string(), "getter for watcher \"a.b\" failed: boom");
    }

    #[test]
    fn callback_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::Callback {
            expression: "count".to_string(),
            source: "bad callback".into(),
        };
        assert_eq!(err.source().map(|s| s.to_string()), Some("bad callback".to_string()));
    }
}
