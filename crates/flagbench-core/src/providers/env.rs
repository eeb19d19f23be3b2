//! Environment-sourced credentials
//!
//! Provider credentials are opaque strings read from one environment variable
//! each. There is no default: an unset or empty variable is a setup error.
//!
//! # Example
//!
//! ```rust,ignore
//! use flagbench_core::providers::env::read_credential;
//!
//! let key = read_credential("DC_KEY")?;
//! ```

use crate::error::SetupError;
use std::fmt;

/// Environment variable holding the provider A server key
pub const DEVCYCLE_KEY_VAR: &str = "DC_KEY";

/// Environment variable holding the provider B SDK key
pub const LAUNCHDARKLY_KEY_VAR: &str = "LD_KEY";

/// An account credential for a flag provider.
///
/// The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    var: String,
    value: String,
}

impl Credential {
    /// Name of the environment variable the credential came from
    pub fn source(&self) -> &str {
        &self.var
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("var", &self.var)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Read a credential from the process environment
pub fn read_credential(var: &str) -> Result<Credential, SetupError> {
    match std::env::var(var) {
        Ok(value) => credential_from(var, Some(value)),
        Err(std::env::VarError::NotPresent) => credential_from(var, None),
        Err(std::env::VarError::NotUnicode(_)) => Err(SetupError::InvalidCredential {
            var: var.to_string(),
        }),
    }
}

/// Read a credential through an arbitrary lookup
pub fn read_credential_with<F>(var: &str, lookup: F) -> Result<Credential, SetupError>
where
    F: FnOnce(&str) -> Option<String>,
{
    credential_from(var, lookup(var))
}

fn credential_from(var: &str, value: Option<String>) -> Result<Credential, SetupError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(Credential {
            var: var.to_string(),
            value,
        }),
        _ => {
            tracing::error!(var = var, "credential not set");
            Err(SetupError::MissingCredential {
                var: var.to_string(),
            })
        }
    }
}
