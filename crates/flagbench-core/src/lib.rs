//! Comparative micro-benchmark of boolean feature-flag evaluation.
//!
//! Two providers are driven through the same [`FlagProvider`] capability:
//! DevCycle and the incumbent LaunchDarkly. Each is measured evaluating one
//! boolean flag for a fixed identity, serially and fanned out across many
//! workers, and every evaluation must return the expected value.
//!
//! # Layout
//!
//! ```text
//! providers   clients, adapters and the FlagProvider trait
//! fixtures    credential lookup and client construction
//! benchmarks  driver, cases, results and reports
//! ```

pub mod benchmarks;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod identity;
pub mod providers;
pub mod value;

pub use benchmarks::{run_and_save, run_suite, BenchTarget, BenchmarkResult};
pub use config::{BenchConfig, HarnessConfig};
pub use error::{BenchResult, BenchmarkError, SetupError};
pub use fixtures::{Fixture, Fixtures};
pub use identity::Identity;
pub use providers::{FlagProvider, ProviderError, ProviderResult};
pub use value::{VariableType, VariableValue};
