//! Tagged variable values
//!
//! Provider A answers every evaluation with a value union. The boolean payload
//! is only reachable through [`VariableValue::as_bool`], which fails with a
//! typed error instead of assuming the variant.

use crate::providers::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};

/// Wire-level type tag of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Boolean,
    Number,
    String,
    #[serde(rename = "JSON")]
    Json,
}

/// A variable value as returned by a flag provider
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
}

impl VariableValue {
    /// Name of the contained type, matching the wire tag
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableValue::Bool(_) => "Boolean",
            VariableValue::Number(_) => "Number",
            VariableValue::String(_) => "String",
            VariableValue::Json(_) => "JSON",
        }
    }

    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Bool(_) => VariableType::Boolean,
            VariableValue::Number(_) => VariableType::Number,
            VariableValue::String(_) => VariableType::String,
            VariableValue::Json(_) => VariableType::Json,
        }
    }

    /// Extract the boolean payload.
    pub fn as_bool(&self) -> ProviderResult<bool> {
        match self {
            VariableValue::Bool(value) => Ok(*value),
            other => Err(ProviderError::TypeMismatch {
                expected: "Boolean",
                actual: other.type_name(),
            }),
        }
    }

    /// Build a value from a wire type tag and its JSON payload.
    ///
    /// Returns `None` when the payload does not match the tag.
    pub fn from_wire(kind: VariableType, value: serde_json::Value) -> Option<Self> {
        match kind {
            VariableType::Boolean => value.as_bool().map(VariableValue::Bool),
            VariableType::Number => value.as_f64().map(VariableValue::Number),
            VariableType::String => match value {
                serde_json::Value::String(s) => Some(VariableValue::String(s)),
                _ => None,
            },
            VariableType::Json => match value {
                serde_json::Value::Object(_) => Some(VariableValue::Json(value)),
                _ => None,
            },
        }
    }

    /// JSON payload for event reporting
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VariableValue::Bool(b) => serde_json::Value::Bool(*b),
            VariableValue::Number(n) => serde_json::json!(n),
            VariableValue::String(s) => serde_json::Value::String(s.clone()),
            VariableValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Bool(value)
    }
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableValue::Bool(b) => write!(f, "{}", b),
            VariableValue::Number(n) => write!(f, "{}", n),
            VariableValue::String(s) => write!(f, "{}", s),
            VariableValue::Json(v) => write!(f, "{}", v),
        }
    }
}
