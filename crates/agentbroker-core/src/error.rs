//! Error taxonomy.
//!
//! Every failure surfaced by the broker is a [`BrokerError`]. Each variant is
//! classified exactly once into [`ErrorClass::Transient`] or
//! [`ErrorClass::Terminal`] by [`BrokerError::class`], a fixed table over the
//! variant itself. Call history never influences classification.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by adapters and core components.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrokerError {
    /// A caller argument violates a documented invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport failure or timeout.
    #[error("network error: {message}")]
    Network {
        message: String,
        /// Whether the transport gave up because of a timeout.
        timeout: bool,
    },

    /// Explicit throttling by the backend.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        /// Backend-supplied hint for how long to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The backend reported an internal failure.
    #[error("upstream service error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// A required capability or adapter was never registered.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Retry eligibility of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying.
    Transient,
    /// Surfaced immediately.
    Terminal,
}

impl BrokerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Network { .. } | Self::RateLimit { .. } | Self::Upstream { .. } => {
                ErrorClass::Transient
            }
            Self::Validation(_) | Self::Configuration(_) => ErrorClass::Terminal,
        }
    }

    /// Shorthand for `class() == ErrorClass::Transient`.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// The retry-after hint, if the backend sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Stable machine-readable kind, used in structured logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Network { .. } => "network",
            Self::RateLimit { .. } => "rate_limit",
            Self::Upstream { .. } => "upstream",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// Broker Result type alias.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(BrokerError::validation("x").class(), ErrorClass::Terminal);
        assert_eq!(BrokerError::configuration("x").class(), ErrorClass::Terminal);
        assert_eq!(BrokerError::network("x").class(), ErrorClass::Transient);
        assert_eq!(BrokerError::timeout("x").class(), ErrorClass::Transient);
        assert_eq!(
            BrokerError::rate_limited("x", None).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            BrokerError::upstream(Some(503), "x").class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn test_retry_after_only_on_rate_limit() {
        let hint = Duration::from_secs(7);
        assert_eq!(
            BrokerError::rate_limited("slow down", Some(hint)).retry_after(),
            Some(hint)
        );
        assert_eq!(BrokerError::network("reset").retry_after(), None);
    }

    #[test]
    fn test_display_includes_status() {
        let err = BrokerError::upstream(Some(502), "bad gateway");
        assert_eq!(err.to_string(), "upstream service error (502): bad gateway");
        let err = BrokerError::upstream(None, "oops");
        assert_eq!(err.to_string(), "upstream service error: oops");
    }
}
