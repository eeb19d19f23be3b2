//! DevCycle server client
//!
//! Evaluates variables against the DevCycle bucketing API in one of two modes:
//!
//! - **Cloud bucketing**: every evaluation is a `POST /v1/variables/{key}`
//!   round-trip.
//! - **Local**: the full variable set of a user is fetched once and served
//!   from memory; a background task refreshes every cached user on the
//!   configured polling interval.
//!
//! Evaluations are aggregated into `aggVariableEvaluated` /
//! `aggVariableDefaulted` events and flushed in batches by a second
//! background task.
//!
//! The client owns a small tokio runtime for its background work and blocks
//! on it for network evaluations, so it must not be called from inside an
//! async context.

use super::traits::{ProviderError, ProviderHealth, ProviderResult};
use crate::value::{VariableType, VariableValue};
use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_BUCKETING_API_URI: &str = "https://bucketing-api.devcycle.com";
pub const DEFAULT_EVENTS_API_URI: &str = "https://events.devcycle.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_EVENT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_CONFIG_POLLING_INTERVAL: Duration = Duration::from_secs(10);
const MIN_CONFIG_POLLING_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_FLUSH_EVENT_QUEUE_SIZE: usize = 1_000;
const DEFAULT_MAX_EVENT_QUEUE_SIZE: usize = 10_000;

/// Client options. Zero sizes and durations mean "use the SDK default".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevCycleOptions {
    pub enable_edge_db: bool,
    pub enable_cloud_bucketing: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    pub disable_automatic_event_logging: bool,
    pub disable_custom_event_logging: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub event_flush_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub config_polling_interval: Duration,
    pub flush_event_queue_size: usize,
    pub max_event_queue_size: usize,
    pub bucketing_api_uri: String,
    pub events_api_uri: String,
}

impl Default for DevCycleOptions {
    fn default() -> Self {
        Self {
            enable_edge_db: false,
            enable_cloud_bucketing: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            disable_automatic_event_logging: false,
            disable_custom_event_logging: false,
            event_flush_interval: DEFAULT_EVENT_FLUSH_INTERVAL,
            config_polling_interval: DEFAULT_CONFIG_POLLING_INTERVAL,
            flush_event_queue_size: DEFAULT_FLUSH_EVENT_QUEUE_SIZE,
            max_event_queue_size: DEFAULT_MAX_EVENT_QUEUE_SIZE,
            bucketing_api_uri: DEFAULT_BUCKETING_API_URI.to_string(),
            events_api_uri: DEFAULT_EVENTS_API_URI.to_string(),
        }
    }
}

impl DevCycleOptions {
    /// Replace zero values with defaults and clamp out-of-range settings
    pub fn check_defaults(&mut self) {
        if self.request_timeout.is_zero() {
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }
        if self.event_flush_interval.is_zero() {
            self.event_flush_interval = DEFAULT_EVENT_FLUSH_INTERVAL;
        }
        if self.config_polling_interval.is_zero() {
            self.config_polling_interval = DEFAULT_CONFIG_POLLING_INTERVAL;
        } else if self.config_polling_interval < MIN_CONFIG_POLLING_INTERVAL {
            self.config_polling_interval = MIN_CONFIG_POLLING_INTERVAL;
        }
        if self.flush_event_queue_size == 0 {
            self.flush_event_queue_size = DEFAULT_FLUSH_EVENT_QUEUE_SIZE;
        }
        if self.max_event_queue_size == 0 {
            self.max_event_queue_size = DEFAULT_MAX_EVENT_QUEUE_SIZE;
        }
        if self.flush_event_queue_size > self.max_event_queue_size {
            self.flush_event_queue_size = self.max_event_queue_size;
        }
        if self.bucketing_api_uri.is_empty() {
            self.bucketing_api_uri = DEFAULT_BUCKETING_API_URI.to_string();
        }
        if self.events_api_uri.is_empty() {
            self.events_api_uri = DEFAULT_EVENTS_API_URI.to_string();
        }
    }
}

/// A DevCycle user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevCycleUser {
    pub user_id: String,
    #[serde(rename = "customData", default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_data: HashMap<String, serde_json::Value>,
}

impl DevCycleUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            custom_data: HashMap::new(),
        }
    }
}

/// An evaluated variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub key: String,
    pub value: VariableValue,
    /// True when `value` is the caller's default
    pub is_defaulted: bool,
}

/// A custom event submitted through [`DevCycleClient::track`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevCycleEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(rename = "metaData", skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<serde_json::Value>,
}

impl DevCycleEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: None,
            value: None,
            meta_data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireVariable {
    #[serde(rename = "type")]
    kind: VariableType,
    value: serde_json::Value,
}

impl WireVariable {
    fn into_value(self, key: &str) -> ProviderResult<VariableValue> {
        let kind = self.kind;
        VariableValue::from_wire(kind, self.value)
            .ok_or_else(|| ProviderError::Parse(format!("variable {} has a non-{:?} value", key, kind)))
    }
}

#[derive(Debug, Default)]
struct UserEvents {
    user: Option<DevCycleUser>,
    /// variable key -> [evaluated, defaulted]
    aggregates: HashMap<String, [u64; 2]>,
    custom: Vec<DevCycleEvent>,
}

#[derive(Debug, Default)]
struct EventQueue {
    users: HashMap<String, UserEvents>,
    len: usize,
}

#[derive(Debug, Serialize)]
struct BatchPayload {
    batch: Vec<UserBatch>,
}

#[derive(Debug, Serialize)]
struct UserBatch {
    user: DevCycleUser,
    events: Vec<serde_json::Value>,
}

#[derive(Debug)]
struct UserSnapshot {
    user: DevCycleUser,
    variables: HashMap<String, VariableValue>,
}

#[derive(Debug)]
struct Inner {
    sdk_key: String,
    options: DevCycleOptions,
    http: reqwest::Client,
    cache: RwLock<HashMap<String, UserSnapshot>>,
    /// Held while a cache miss is fetched so concurrent misses share one request
    fetch_lock: Mutex<()>,
    events: Mutex<EventQueue>,
}

/// DevCycle server-side client.
///
/// Safe for concurrent use from any number of non-async threads.
pub struct DevCycleClient {
    inner: Arc<Inner>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl std::fmt::Debug for DevCycleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevCycleClient")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl DevCycleClient {
    /// Construct a client and start its background tasks
    pub fn new(sdk_key: impl Into<String>, mut options: DevCycleOptions) -> ProviderResult<Self> {
        let sdk_key = sdk_key.into();
        if sdk_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential("devcycle".into()));
        }
        options.check_defaults();

        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| ProviderError::Construction(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("devcycle-bg")
            .enable_all()
            .build()
            .map_err(|e| ProviderError::Construction(e.to_string()))?;

        let inner = Arc::new(Inner {
            sdk_key,
            options,
            http,
            cache: RwLock::new(HashMap::new()),
            fetch_lock: Mutex::new(()),
            events: Mutex::new(EventQueue::default()),
        });

        if !inner.options.enable_cloud_bucketing {
            runtime.spawn(poll_loop(Arc::clone(&inner)));
        }
        if !inner.options.disable_automatic_event_logging
            || !inner.options.disable_custom_event_logging
        {
            runtime.spawn(flush_loop(Arc::clone(&inner)));
        }

        tracing::info!(
            cloud_bucketing = inner.options.enable_cloud_bucketing,
            polling_interval_ms = inner.options.config_polling_interval.as_millis() as u64,
            "DevCycle client started"
        );

        Ok(Self {
            inner,
            runtime: Some(runtime),
        })
    }

    pub fn options(&self) -> &DevCycleOptions {
        &self.inner.options
    }

    /// Evaluate `key` for `user`.
    ///
    /// A missing variable, or one whose type differs from `default`, yields
    /// `default` with `is_defaulted` set and no error.
    pub fn variable(
        &self,
        user: &DevCycleUser,
        key: &str,
        default: VariableValue,
    ) -> ProviderResult<Variable> {
        let fetched = if self.inner.options.enable_cloud_bucketing {
            self.block_on(self.inner.fetch_variable(user, key))?
        } else {
            self.local_variable(user, key)?
        };

        let variable = match fetched {
            Some(value) if value.variable_type() == default.variable_type() => Variable {
                key: key.to_string(),
                value,
                is_defaulted: false,
            },
            _ => Variable {
                key: key.to_string(),
                value: default,
                is_defaulted: true,
            },
        };

        if !self.inner.options.disable_automatic_event_logging
            && self.inner.record_evaluation(user, key, variable.is_defaulted)
        {
            self.spawn_flush();
        }

        Ok(variable)
    }

    /// Queue a custom event. A no-op when custom event logging is disabled.
    pub fn track(&self, user: &DevCycleUser, event: DevCycleEvent) -> ProviderResult<()> {
        if self.inner.options.disable_custom_event_logging {
            tracing::debug!(event_type = %event.event_type, "custom event logging disabled");
            return Ok(());
        }
        if event.event_type.is_empty() {
            return Err(ProviderError::InvalidEvent("event type is required".into()));
        }
        if self.inner.queue_custom(user, event) {
            self.spawn_flush();
        }
        Ok(())
    }

    /// Flush queued events immediately
    pub fn flush_events(&self) -> ProviderResult<()> {
        self.block_on(self.inner.flush())
    }

    /// Flush pending events and stop background work
    pub fn close(mut self) -> ProviderResult<()> {
        let result = self.flush_events();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        result
    }

    pub fn health(&self) -> ProviderHealth {
        let cached = self
            .inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        ProviderHealth::healthy("devcycle").with_cached_entries(cached)
    }

    /// Number of distinct entries waiting in the event queue
    pub fn queued_events(&self) -> usize {
        self.inner.events.lock().unwrap_or_else(PoisonError::into_inner).len
    }

    fn local_variable(&self, user: &DevCycleUser, key: &str) -> ProviderResult<Option<VariableValue>> {
        if let Some(value) = self.cached(user, key) {
            return Ok(value);
        }

        let _fetching = self.inner.fetch_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cached(user, key) {
            return Ok(value);
        }

        let variables = self.block_on(self.inner.fetch_all(user))?;
        let value = variables.get(key).cloned();
        self.inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user.user_id.clone(),
                UserSnapshot {
                    user: user.clone(),
                    variables,
                },
            );
        Ok(value)
    }

    /// `None` when `user` has no snapshot yet
    fn cached(&self, user: &DevCycleUser, key: &str) -> Option<Option<VariableValue>> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user.user_id)
            .map(|snapshot| snapshot.variables.get(key).cloned())
    }

    fn block_on<F, T>(&self, future: F) -> ProviderResult<T>
    where
        F: std::future::Future<Output = ProviderResult<T>>,
    {
        match self.runtime.as_ref() {
            Some(runtime) => runtime.block_on(future),
            None => Err(ProviderError::NotInitialized),
        }
    }

    fn spawn_flush(&self) {
        if let Some(runtime) = self.runtime.as_ref() {
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move {
                if let Err(e) = inner.flush().await {
                    tracing::warn!(error = %e, "DevCycle event flush failed");
                }
            });
        }
    }
}

impl Drop for DevCycleClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Inner {
    fn variables_url(&self, key: Option<&str>) -> ProviderResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.options.bucketing_api_uri)
            .map_err(|e| ProviderError::Construction(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ProviderError::Construction("bucketing URI cannot be a base".into()))?;
            segments.pop_if_empty().extend(["v1", "variables"]);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        if self.options.enable_edge_db {
            url.query_pairs_mut().append_pair("enableEdgeDB", "true");
        }
        Ok(url)
    }

    async fn post_user(&self, url: reqwest::Url, user: &DevCycleUser) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &self.sdk_key)
            .json(user)
            .send()
            .await?;
        Ok(response)
    }

    async fn fetch_variable(&self, user: &DevCycleUser, key: &str) -> ProviderResult<Option<VariableValue>> {
        let response = self.post_user(self.variables_url(Some(key))?, user).await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let wire: WireVariable = response.json().await?;
        wire.into_value(key).map(Some)
    }

    async fn fetch_all(&self, user: &DevCycleUser) -> ProviderResult<HashMap<String, VariableValue>> {
        let response = self.post_user(self.variables_url(None)?, user).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let wire: HashMap<String, WireVariable> = response.json().await?;
        let mut variables = HashMap::with_capacity(wire.len());
        for (key, variable) in wire {
            match variable.into_value(&key) {
                Ok(value) => {
                    variables.insert(key, value);
                }
                Err(e) => tracing::warn!(variable = %key, error = %e, "skipping malformed variable"),
            }
        }
        Ok(variables)
    }

    async fn refresh_cached_users(&self) {
        let users: Vec<DevCycleUser> = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|snapshot| snapshot.user.clone())
            .collect();

        for user in users {
            match self.fetch_all(&user).await {
                Ok(variables) => {
                    self.cache
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(user.user_id.clone(), UserSnapshot { user, variables });
                }
                Err(e) => tracing::warn!(user_id = %user.user_id, error = %e, "variable refresh failed"),
            }
        }
    }

    /// Returns true when the queue reached the flush threshold
    fn record_evaluation(&self, user: &DevCycleUser, key: &str, defaulted: bool) -> bool {
        let mut queue = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let max = self.options.max_event_queue_size;
        let slot = usize::from(defaulted);

        if let Some(entry) = queue
            .users
            .get_mut(&user.user_id)
            .and_then(|events| events.aggregates.get_mut(key))
        {
            entry[slot] += 1;
            return false;
        }

        if queue.len >= max {
            tracing::warn!(variable = key, "event queue full, dropping evaluation event");
            return false;
        }

        let events = queue.users.entry(user.user_id.clone()).or_default();
        if events.user.is_none() {
            events.user = Some(user.clone());
        }
        let mut counts = [0u64; 2];
        counts[slot] = 1;
        events.aggregates.insert(key.to_string(), counts);
        queue.len += 1;
        queue.len >= self.options.flush_event_queue_size
    }

    fn queue_custom(&self, user: &DevCycleUser, event: DevCycleEvent) -> bool {
        let mut queue = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len >= self.options.max_event_queue_size {
            tracing::warn!(event_type = %event.event_type, "event queue full, dropping custom event");
            return false;
        }
        let events = queue.users.entry(user.user_id.clone()).or_default();
        if events.user.is_none() {
            events.user = Some(user.clone());
        }
        events.custom.push(event);
        queue.len += 1;
        queue.len >= self.options.flush_event_queue_size
    }

    fn drain_events(&self) -> Option<BatchPayload> {
        let queue = {
            let mut queue = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *queue)
        };
        if queue.len == 0 {
            return None;
        }

        let date = chrono::Utc::now().to_rfc3339();
        let batch = queue
            .users
            .into_values()
            .filter_map(|events| {
                let user = events.user?;
                let mut payload = Vec::with_capacity(events.aggregates.len() * 2 + events.custom.len());
                for (key, [evaluated, defaulted]) in events.aggregates {
                    for (event_type, count) in [
                        ("aggVariableEvaluated", evaluated),
                        ("aggVariableDefaulted", defaulted),
                    ] {
                        if count > 0 {
                            payload.push(serde_json::json!({
                                "type": event_type,
                                "target": key,
                                "value": count,
                                "date": date,
                            }));
                        }
                    }
                }
                for event in events.custom {
                    let mut value = serde_json::to_value(&event).unwrap_or_default();
                    if let serde_json::Value::Object(ref mut map) = value {
                        map.insert("customType".into(), serde_json::json!(event.event_type));
                        map.insert("type".into(), serde_json::json!("customEvent"));
                        map.insert("date".into(), serde_json::json!(date));
                    }
                    payload.push(value);
                }
                Some(UserBatch { user, events: payload })
            })
            .collect();

        Some(BatchPayload { batch })
    }

    async fn flush(&self) -> ProviderResult<()> {
        let Some(payload) = self.drain_events() else {
            return Ok(());
        };

        let url = format!(
            "{}/v1/events/batch",
            self.options.events_api_uri.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &self.sdk_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        tracing::debug!(users = payload.batch.len(), "DevCycle events flushed");
        Ok(())
    }
}

async fn poll_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.options.config_polling_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        inner.refresh_cached_users().await;
    }
}

async fn flush_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.options.event_flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = inner.flush().await {
            tracing::warn!(error = %e, "DevCycle event flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_server() -> (tokio::runtime::Runtime, MockServer) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    fn options_for(server: &MockServer, cloud: bool) -> DevCycleOptions {
        DevCycleOptions {
            enable_cloud_bucketing: cloud,
            request_timeout: Duration::from_secs(2),
            disable_automatic_event_logging: true,
            disable_custom_event_logging: true,
            bucketing_api_uri: server.uri(),
            events_api_uri: server.uri(),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_defaults() {
        let mut options = DevCycleOptions {
            request_timeout: Duration::ZERO,
            config_polling_interval: Duration::from_millis(10),
            flush_event_queue_size: 0,
            max_event_queue_size: 0,
            bucketing_api_uri: String::new(),
            ..Default::default()
        };
        options.check_defaults();

        assert_eq!(options.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(options.config_polling_interval, MIN_CONFIG_POLLING_INTERVAL);
        assert_eq!(options.flush_event_queue_size, DEFAULT_FLUSH_EVENT_QUEUE_SIZE);
        assert_eq!(options.max_event_queue_size, DEFAULT_MAX_EVENT_QUEUE_SIZE);
        assert_eq!(options.bucketing_api_uri, DEFAULT_BUCKETING_API_URI);
    }

    #[test]
    fn test_options_from_toml() {
        let options: DevCycleOptions = toml::from_str(
            r#"
            enable_cloud_bucketing = true
            request_timeout = "2s"
            event_flush_interval = "30s"
            "#,
        )
        .unwrap();
        assert!(options.enable_cloud_bucketing);
        assert_eq!(options.request_timeout, Duration::from_secs(2));
        assert_eq!(options.config_polling_interval, DEFAULT_CONFIG_POLLING_INTERVAL);
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = DevCycleClient::new("", DevCycleOptions::default()).unwrap_err();
        assert_eq!(err, ProviderError::MissingCredential("devcycle".into()));
    }

    #[test]
    fn test_user_serialization() {
        let user = DevCycleUser::new("dontcare");
        assert_eq!(serde_json::to_value(&user).unwrap(), json!({"user_id": "dontcare"}));
    }

    #[test]
    fn test_cloud_variable() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/v1/variables/basic-boolean"))
                .and(header("Authorization", "dvc_server_test"))
                .and(body_partial_json(json!({"user_id": "dontcare"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "_id": "61",
                    "key": "basic-boolean",
                    "type": "Boolean",
                    "value": false
                })))
                .expect(2)
                .mount(&server),
        );

        let client = DevCycleClient::new("dvc_server_test", options_for(&server, true)).unwrap();
        let user = DevCycleUser::new("dontcare");
        for _ in 0..2 {
            let variable = client.variable(&user, "basic-boolean", true.into()).unwrap();
            assert_eq!(variable.value.as_bool(), Ok(false));
            assert!(!variable.is_defaulted);
        }
    }

    #[test]
    fn test_cloud_edge_db_query() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/v1/variables/basic-boolean"))
                .and(query_param("enableEdgeDB", "true"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "key": "basic-boolean",
                    "type": "Boolean",
                    "value": true
                })))
                .mount(&server),
        );

        let mut options = options_for(&server, true);
        options.enable_edge_db = true;
        let client = DevCycleClient::new("dvc_server_test", options).unwrap();
        let variable = client
            .variable(&DevCycleUser::new("dontcare"), "basic-boolean", false.into())
            .unwrap();
        assert_eq!(variable.value, VariableValue::Bool(true));
    }

    #[test]
    fn test_cloud_missing_variable_is_defaulted() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/v1/variables/nope"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server),
        );

        let client = DevCycleClient::new("dvc_server_test", options_for(&server, true)).unwrap();
        let variable = client
            .variable(&DevCycleUser::new("dontcare"), "nope", false.into())
            .unwrap();
        assert!(variable.is_defaulted);
        assert_eq!(variable.value, VariableValue::Bool(false));
    }

    #[test]
    fn test_cloud_server_error() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .mount(&server),
        );

        let client = DevCycleClient::new("dvc_server_test", options_for(&server, true)).unwrap();
        let err = client
            .variable(&DevCycleUser::new("dontcare"), "basic-boolean", false.into())
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Http {
                status: 500,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_local_mode_fetches_once() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/v1/variables"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "basic-boolean": {"key": "basic-boolean", "type": "Boolean", "value": false},
                    "greeting": {"key": "greeting", "type": "String", "value": "hi"}
                })))
                .expect(1)
                .mount(&server),
        );

        let client = DevCycleClient::new("dvc_server_test", options_for(&server, false)).unwrap();
        let user = DevCycleUser::new("dontcare");

        for _ in 0..10 {
            let variable = client.variable(&user, "basic-boolean", true.into()).unwrap();
            assert_eq!(variable.value.as_bool(), Ok(false));
        }

        // type differs from the default
        let variable = client.variable(&user, "greeting", false.into()).unwrap();
        assert!(variable.is_defaulted);

        // absent from the snapshot
        let variable = client.variable(&user, "missing", false.into()).unwrap();
        assert!(variable.is_defaulted);

        assert_eq!(client.health().cached_entries, 1);
    }

    #[test]
    fn test_concurrent_misses_share_one_fetch() {
        let (rt, server) = mock_server();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/v1/variables"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({
                            "basic-boolean": {"key": "basic-boolean", "type": "Boolean", "value": false}
                        }))
                        .set_delay(Duration::from_millis(300)),
                )
                .expect(1)
                .mount(&server),
        );

        let client = DevCycleClient::new("dvc_server_test", options_for(&server, false)).unwrap();
        let user = DevCycleUser::new("dontcare");

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..50)
                .map(|_| scope.spawn(|| client.variable(&user, "basic-boolean", true.into())))
                .collect();
            for handle in handles {
                let variable = handle.join().unwrap().unwrap();
                assert_eq!(variable.value.as_bool(), Ok(false));
            }
        });

        let requests = rt.block_on(server.received_requests()).unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_evaluation_events_are_aggregated_and_flushed() {
        let (rt, server) = mock_server();
        rt.block_on(async {
            Mock::given(method("POST"))
                .and(path("/v1/variables"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "basic-boolean": {"key": "basic-boolean", "type": "Boolean", "value": false}
                })))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/v1/events/batch"))
                .and(body_partial_json(json!({"batch": [{"user": {"user_id": "dontcare"}}]})))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;
        });

        let mut options = options_for(&server, false);
        options.disable_automatic_event_logging = false;
        let client = DevCycleClient::new("dvc_server_test", options).unwrap();
        let user = DevCycleUser::new("dontcare");

        for _ in 0..5 {
            client.variable(&user, "basic-boolean", false.into()).unwrap();
        }
        client.variable(&user, "missing", false.into()).unwrap();
        assert_eq!(client.queued_events(), 2);

        client.flush_events().unwrap();
        assert_eq!(client.queued_events(), 0);
    }

    #[test]
    fn test_track_disabled_is_noop() {
        let (_rt, server) = mock_server();
        let client = DevCycleClient::new("dvc_server_test", options_for(&server, true)).unwrap();
        client
            .track(&DevCycleUser::new("dontcare"), DevCycleEvent::new("checkout"))
            .unwrap();
        assert_eq!(client.queued_events(), 0);
    }

    #[test]
    fn test_track_requires_event_type() {
        let (_rt, server) = mock_server();
        let mut options = options_for(&server, true);
        options.disable_custom_event_logging = false;
        let client = DevCycleClient::new("dvc_server_test", options).unwrap();
        let user = DevCycleUser::new("dontcare");

        assert!(matches!(
            client.track(&user, DevCycleEvent::new("")),
            Err(ProviderError::InvalidEvent(_))
        ));
        client.track(&user, DevCycleEvent::new("checkout")).unwrap();
        assert_eq!(client.queued_events(), 1);
    }
}
