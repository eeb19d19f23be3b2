//! Flag-evaluation providers
//!
//! This module holds the two concrete provider clients and the adapters that
//! put them behind the uniform [`FlagProvider`] capability the benchmark
//! harness drives.
//!
//! # Supported Providers
//!
//! - **DevCycle**: bucketing API, cloud or locally-cached evaluation
//! - **LaunchDarkly**: polled server-side flag data, evaluated in memory
//!
//! # Example
//!
//! ```rust,ignore
//! use flagbench_core::providers::{DevCycleAdapter, DevCycleClient, DevCycleOptions, FlagProvider};
//! use flagbench_core::identity::default_identity;
//!
//! let client = DevCycleClient::new(sdk_key, DevCycleOptions::default())?;
//! let adapter = DevCycleAdapter::new(client, default_identity());
//! let value = adapter.bool_variation(&default_identity(), "basic-boolean", false)?;
//! ```

pub mod adapters;
pub mod devcycle;
pub mod env;
pub mod launchdarkly;
pub mod traits;

pub use adapters::{DevCycleAdapter, LaunchDarklyAdapter};
pub use devcycle::{DevCycleClient, DevCycleEvent, DevCycleOptions, DevCycleUser, Variable};
pub use env::{read_credential, read_credential_with, Credential};
pub use launchdarkly::{EvaluationDetail, EvaluationReason, LdClient, LdConfig, LdUser};
pub use traits::{FlagProvider, ProviderError, ProviderHealth, ProviderResult};

#[cfg(test)]
pub use traits::MockFlagProvider;
