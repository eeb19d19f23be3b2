//! LaunchDarkly server client
//!
//! Polls the server-side SDK endpoint (`GET /sdk/latest-all`) for the full
//! flag and segment set and evaluates from memory with the same targeting
//! semantics as the server-side SDK.

mod evaluation;

use super::traits::{ProviderError, ProviderHealth, ProviderResult};
use duration_str::deserialize_duration;
use evaluation::FlagData;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_BASE_URI: &str = "https://sdk.launchdarkly.com";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Client configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LdConfig {
    /// Never connect; every evaluation returns the caller's default
    pub offline: bool,
    pub base_uri: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
}

impl Default for LdConfig {
    fn default() -> Self {
        Self {
            offline: false,
            base_uri: DEFAULT_BASE_URI.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A LaunchDarkly user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdUser {
    pub key: String,
    pub custom: BTreeMap<String, Value>,
}

impl LdUser {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            custom: BTreeMap::new(),
        }
    }

    pub fn custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    pub fn custom_all(mut self, attrs: BTreeMap<String, String>) -> Self {
        self.custom
            .extend(attrs.into_iter().map(|(name, value)| (name, Value::String(value))));
        self
    }

    /// Attribute a clause or rollout refers to; `key` is the user key
    pub fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "key" => Some(Cow::Owned(Value::String(self.key.clone()))),
            _ => self.custom.get(name).map(Cow::Borrowed),
        }
    }
}

/// Why an evaluation produced its value
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationReason {
    Off,
    /// A prerequisite flag was off or served another variation
    PrerequisiteFailed { prerequisite_key: String },
    TargetMatch,
    RuleMatch { rule_index: usize },
    Fallthrough,
    Error(ProviderError),
}

/// Result of [`LdClient::bool_variation_detail`]
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetail {
    pub value: bool,
    pub variation_index: Option<usize>,
    pub reason: EvaluationReason,
}

impl EvaluationDetail {
    fn error(default: bool, err: ProviderError) -> Self {
        Self {
            value: default,
            variation_index: None,
            reason: EvaluationReason::Error(err),
        }
    }
}

#[derive(Debug)]
struct Inner {
    sdk_key: String,
    config: LdConfig,
    http: reqwest::Client,
    store: RwLock<Option<FlagData>>,
}

/// LaunchDarkly server-side client.
///
/// Safe for concurrent use; evaluations read an in-memory flag store.
pub struct LdClient {
    inner: Arc<Inner>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl std::fmt::Debug for LdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl LdClient {
    /// Construct a client, waiting up to `wait_for` for the first flag data.
    ///
    /// Failing to initialize within `wait_for` is an error.
    pub fn make_custom_client(
        sdk_key: impl Into<String>,
        mut config: LdConfig,
        wait_for: Duration,
    ) -> ProviderResult<Self> {
        let sdk_key = sdk_key.into();
        if sdk_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential("launchdarkly".into()));
        }
        if config.poll_interval < MIN_POLL_INTERVAL {
            config.poll_interval = MIN_POLL_INTERVAL;
        }
        if config.base_uri.is_empty() {
            config.base_uri = DEFAULT_BASE_URI.to_string();
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Construction(e.to_string()))?;

        let inner = Arc::new(Inner {
            sdk_key,
            config,
            http,
            store: RwLock::new(None),
        });

        if inner.config.offline {
            tracing::info!("LaunchDarkly client started in offline mode");
            return Ok(Self {
                inner,
                runtime: None,
            });
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("launchdarkly-bg")
            .enable_all()
            .build()
            .map_err(|e| ProviderError::Construction(e.to_string()))?;

        let first = runtime.block_on(async {
            tokio::time::timeout(wait_for, inner.fetch(wait_for)).await
        });
        match first {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                runtime.shutdown_background();
                return Err(e);
            }
            Err(_) => {
                runtime.shutdown_background();
                return Err(ProviderError::Timeout(format!(
                    "no flag data within {:?}",
                    wait_for
                )));
            }
        }

        runtime.spawn(poll_loop(Arc::clone(&inner)));
        tracing::info!(
            flags = inner.flag_count(),
            poll_interval_s = inner.config.poll_interval.as_secs(),
            "LaunchDarkly client initialized"
        );

        Ok(Self {
            inner,
            runtime: Some(runtime),
        })
    }

    pub fn is_offline(&self) -> bool {
        self.inner.config.offline
    }

    pub fn initialized(&self) -> bool {
        self.is_offline()
            || self
                .inner
                .store
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Evaluate a boolean flag, returning `default` alongside any error
    pub fn bool_variation_detail(&self, key: &str, user: &LdUser, default: bool) -> EvaluationDetail {
        if self.is_offline() {
            return EvaluationDetail {
                value: default,
                variation_index: None,
                reason: EvaluationReason::Off,
            };
        }

        let store = self.inner.store.read().unwrap_or_else(PoisonError::into_inner);
        let Some(data) = store.as_ref() else {
            return EvaluationDetail::error(default, ProviderError::NotInitialized);
        };
        let Some(flag) = data.flags.get(key) else {
            return EvaluationDetail::error(default, ProviderError::FlagNotFound(key.to_string()));
        };

        match data.evaluate(key, flag, user) {
            Ok((None, reason)) => EvaluationDetail {
                value: default,
                variation_index: None,
                reason,
            },
            Ok((Some(index), reason)) => match flag.variations.get(index) {
                Some(Value::Bool(value)) => EvaluationDetail {
                    value: *value,
                    variation_index: Some(index),
                    reason,
                },
                Some(other) => EvaluationDetail::error(
                    default,
                    ProviderError::TypeMismatch {
                        expected: "Boolean",
                        actual: json_type_name(other),
                    },
                ),
                None => EvaluationDetail::error(
                    default,
                    ProviderError::MalformedFlag {
                        key: key.to_string(),
                        reason: format!("variation index {} out of range", index),
                    },
                ),
            },
            Err(e) => EvaluationDetail::error(default, e),
        }
    }

    /// Evaluate a boolean flag
    pub fn bool_variation(&self, key: &str, user: &LdUser, default: bool) -> ProviderResult<bool> {
        let detail = self.bool_variation_detail(key, user, default);
        match detail.reason {
            EvaluationReason::Error(e) => Err(e),
            _ => Ok(detail.value),
        }
    }

    /// Version of a stored flag
    pub fn flag_version(&self, key: &str) -> Option<u64> {
        self.inner
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|data| data.flags.get(key))
            .map(|flag| flag.version)
    }

    pub fn health(&self) -> ProviderHealth {
        if self.initialized() {
            ProviderHealth::healthy("launchdarkly").with_cached_entries(self.inner.flag_count())
        } else {
            ProviderHealth::uninitialized("launchdarkly")
        }
    }
}

impl Drop for LdClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

impl Inner {
    fn flag_count(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |data| data.flags.len())
    }

    async fn fetch(&self, timeout: Duration) -> ProviderResult<()> {
        let url = format!("{}/sdk/latest-all", self.config.base_uri.trim_end_matches('/'));
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.sdk_key)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let data: FlagData = response.json().await?;
        tracing::debug!(
            flags = data.flags.len(),
            segments = data.segments.len(),
            "LaunchDarkly flag data received"
        );
        *self.store.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }
}

async fn poll_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = inner.fetch(inner.config.poll_interval).await {
            tracing::warn!(error = %e, "LaunchDarkly poll failed, keeping previous flag data");
        }
    }
}
