//! Error types for fixture setup and benchmark execution

use crate::providers::ProviderError;
use thiserror::Error;

/// Fatal errors raised before any timed case runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    /// The credential environment variable is unset or empty
    #[error("{var} not set")]
    MissingCredential { var: String },

    /// The credential environment variable is not valid UTF-8
    #[error("{var} contains invalid UTF-8")]
    InvalidCredential { var: String },

    /// The provider client could not be constructed
    #[error("failed to construct {provider} client: {source}")]
    Client {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    /// The benchmark configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failures that abort a benchmark run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BenchmarkError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// A provider call returned an error
    #[error("case {case}: evaluation failed at iteration {iteration}: {source}")]
    Evaluation {
        case: String,
        iteration: u64,
        #[source]
        source: ProviderError,
    },

    /// A provider returned an unexpected value
    #[error("case {case}: expected {expected}, got {actual}")]
    ValueMismatch {
        case: String,
        expected: bool,
        actual: bool,
    },

    /// No case matches the requested id
    #[error("unknown benchmark case: {0}")]
    UnknownCase(String),

    /// Results could not be written or read
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BenchmarkError {
    fn from(e: std::io::Error) -> Self {
        BenchmarkError::Io(e.to_string())
    }
}

pub type BenchResult<T> = Result<T, BenchmarkError>;
