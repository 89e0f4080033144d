//! Result and error types for navsmoke.

use thiserror::Error;

/// Result type for navsmoke operations
pub type SmokeResult<T> = Result<T, SmokeError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum SmokeError {
    /// A polled condition never became true within its budget
    #[error("Timed out after {ms}ms waiting for {waited_for} (last observed: {last_observation})")]
    TimeoutExceeded {
        /// What was being waited for
        waited_for: String,
        /// Budget in milliseconds
        ms: u64,
        /// Last observation made before giving up
        last_observation: String,
    },

    /// A selector resolved to nothing after the readiness wait
    #[error("No element matched {selector} within {ms}ms")]
    TargetNotFound {
        /// Selector that failed to resolve
        selector: String,
        /// Budget in milliseconds
        ms: u64,
    },

    /// The remote page refused a dispatched action
    #[error("{action} on {selector} was rejected: {reason}")]
    ActionRejected {
        /// Action that was dispatched
        action: String,
        /// Target selector
        selector: String,
        /// Reason reported by the page
        reason: String,
    },

    /// The environment itself broke (browser crash, navigation aborted)
    #[error("Environment failure: {message}")]
    FatalEnvironment {
        /// Error message
        message: String,
    },

    /// A predicate evaluated false at assertion time
    #[error("Assertion failed: {message} (observed: {observation})")]
    AssertionFailed {
        /// What was asserted
        message: String,
        /// What the page showed
        observation: String,
    },

    /// A recoverable error reported by the remote driver
    #[error("Remote error: {message}")]
    Remote {
        /// Error message
        message: String,
    },

    /// Operation called in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Invalid configuration or scenario definition
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SmokeError {
    /// Create a fatal environment error
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::FatalEnvironment {
            message: message.into(),
        }
    }

    /// Create a recoverable remote error
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error must abort the scenario regardless of step severity
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalEnvironment { .. })
    }

    /// Whether a poller may swallow this error and evaluate again
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::TargetNotFound { .. })
    }

    /// Short machine-friendly name of the error kind, used by reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TimeoutExceeded { .. } => "TimeoutExceeded",
            Self::TargetNotFound { .. } => "TargetNotFound",
            Self::ActionRejected { .. } => "ActionRejected",
            Self::FatalEnvironment { .. } => "FatalEnvironmentError",
            Self::AssertionFailed { .. } => "AssertionFailed",
            Self::Remote { .. } => "RemoteError",
            Self::InvalidState { .. } => "InvalidState",
            Self::Config { .. } | Self::Yaml(_) => "ConfigError",
            Self::Io(_) | Self::Json(_) => "IoError",
        }
    }

    /// Last observation carried by the error, if any
    #[must_use]
    pub fn observation(&self) -> Option<&str> {
        match self {
            Self::TimeoutExceeded {
                last_observation, ..
            } => Some(last_observation),
            Self::AssertionFailed { observation, .. } => Some(observation),
            _ => None,
        }
    }
}
