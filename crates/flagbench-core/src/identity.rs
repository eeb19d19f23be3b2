//! Evaluation subjects
//!
//! An [`Identity`] is built once per provider fixture and reused, unchanged,
//! by every evaluation call in a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Subject identifier used by every benchmark fixture
pub const DEFAULT_SUBJECT: &str = "dontcare";

/// Descriptive attributes attached to the provider B identity
pub const DEFAULT_CDN_ATTRIBUTES: [(&str, &str); 6] = [
    ("env", "prod"),
    ("cdn_group", "regular"),
    ("cdn_domain", "www.bitballoon.com"),
    ("cdn_dc", "jfk"),
    ("cdn_host", "cdn-reg-do-jfk-1"),
    ("node_name", "cdn-reg-do-jfk-1"),
];

/// The subject a flag evaluation is personalized against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes<I, K, V>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes
            .extend(attrs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// The bare `dontcare` subject
pub fn default_identity() -> Identity {
    Identity::new(DEFAULT_SUBJECT)
}

/// The `dontcare` subject with the CDN attribute bag
pub fn default_cdn_identity() -> Identity {
    default_identity().with_attributes(DEFAULT_CDN_ATTRIBUTES)
}
