//! Core traits for flag-evaluation providers
//!
//! This module defines the capability every provider adapter exposes to the
//! benchmark harness: evaluate a named boolean flag for an identity, with a
//! fallback default.

use crate::identity::Identity;
use thiserror::Error;

/// Errors that can occur when constructing or querying a provider client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// No credential was supplied to the client
    #[error("Missing credential for provider {0}")]
    MissingCredential(String),

    /// The client could not be constructed
    #[error("Client construction failed: {0}")]
    Construction(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// The flag is not known to the provider
    #[error("Unknown flag: {0}")]
    FlagNotFound(String),

    /// The evaluated value had a different type than requested
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A custom event was rejected before queueing
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The client has not received its configuration yet
    #[error("Client not initialized")]
    NotInitialized,

    /// The stored flag data cannot be evaluated
    #[error("Malformed flag {key}: {reason}")]
    MalformedFlag { key: String, reason: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Uniform boolean flag evaluation over a concrete provider client.
///
/// Implementations are shared by reference across every benchmark worker, so
/// they must be safe for concurrent read-only use. Evaluation never panics on
/// an unknown flag; provider-level default substitution applies instead.
#[cfg_attr(test, mockall::automock)]
pub trait FlagProvider: Send + Sync {
    /// Returns the unique name of this provider
    fn name(&self) -> &'static str;

    /// Evaluate `flag_key` for `identity`, falling back to `default` when the
    /// provider cannot produce a value.
    fn bool_variation(
        &self,
        identity: &Identity,
        flag_key: &str,
        default: bool,
    ) -> ProviderResult<bool>;

    /// Get provider-specific health/status information
    fn health(&self) -> ProviderHealth {
        ProviderHealth::healthy(self.name())
    }
}

/// Health status for a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealth {
    /// Provider name
    pub provider: String,
    /// Whether the client has usable configuration
    pub initialized: bool,
    /// Number of flags or cached evaluations held locally
    pub cached_entries: usize,
}

impl ProviderHealth {
    /// Create a healthy status
    pub fn healthy(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            initialized: true,
            cached_entries: 0,
        }
    }

    /// Create a status for a client still waiting on configuration
    pub fn uninitialized(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            initialized: false,
            cached_entries: 0,
        }
    }

    pub fn with_cached_entries(mut self, count: usize) -> Self {
        self.cached_entries = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::TypeMismatch {
            expected: "Boolean",
            actual: "String",
        };
        assert_eq!(err.to_string(), "Type mismatch: expected Boolean, got String");

        let err = ProviderError::Http {
            status: 401,
            message: "invalid sdk key".into(),
        };
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_provider_health() {
        let health = ProviderHealth::healthy("devcycle").with_cached_entries(3);
        assert!(health.initialized);
        assert_eq!(health.cached_entries, 3);

        let waiting = ProviderHealth::uninitialized("launchdarkly");
        assert!(!waiting.initialized);
    }
}
