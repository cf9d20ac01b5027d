//! Error types.
//!
//! Only [`MetricError`] crosses the public collection boundary. [`ParseError`]
//! and [`ExecutionError`] describe the failure of a single metric; the source
//! turns them into a null-valued property plus a warning instead of returning
//! them to the caller.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::address::Address;

/// Errors surfaced by registry lookups and source-level operations.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{0} not started")]
    NotStarted(Address),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport could not be brought up by `start()`.
    #[error("transport failure: {0}")]
    Transport(#[from] ExecutionError),
}

impl MetricError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        MetricError::InvalidArgument(msg.into())
    }
}

/// Invalid user-provided configuration: metric ids, addresses, source options.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),
}

/// A parser could not extract a value from its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Failure to run a command or read a file on a metric source.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The child process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{0}' timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("'{command}' exited with code {exit_code}")]
    NonZeroExit { command: String, exit_code: i32 },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Remote transport failure not attributable to the command itself.
    #[error("remote transport error: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_converts_into_metric_error() {
        let err: MetricError = ConfigurationError::UnknownMetric("Nope".into()).into();
        assert!(matches!(
            err,
            MetricError::Configuration(ConfigurationError::UnknownMetric(ref id)) if id == "Nope"
        ));
        assert_eq!(err.to_string(), "unknown metric 'Nope'");
    }

    #[test]
    fn test_not_started_message_names_the_source() {
        let err = MetricError::NotStarted(Address::Local);
        assert_eq!(err.to_string(), "local not started");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("no match");
        assert_eq!(err.to_string(), "parse error: no match");
    }
}
