//! Setup fixtures
//!
//! Each fixture reads its provider credential, constructs the client with the
//! configured options and pairs it with the identity every case evaluates
//! against. Fixtures are built once, before any case is timed. A missing
//! credential or a client construction failure is fatal and never retried.
//!
//! The fixture identity is shared with the adapter, so case evaluations hit
//! the adapter's pre-converted provider user without comparing identities.
//!
//! Client background tasks (polling, event flushing) live until the fixture's
//! provider is dropped.

use crate::config::{BenchConfig, DevCycleFixtureConfig, LaunchDarklyFixtureConfig};
use crate::error::SetupError;
use crate::identity::{default_cdn_identity, default_identity, Identity};
use crate::providers::{
    read_credential, Credential, DevCycleAdapter, DevCycleClient, FlagProvider, LaunchDarklyAdapter,
    LdClient,
};
use std::fmt;
use std::sync::Arc;

/// A ready-to-query provider with its identity and flag
#[derive(Clone)]
pub struct Fixture {
    pub provider: Arc<dyn FlagProvider>,
    pub identity: Arc<Identity>,
    pub flag_key: String,
}

impl Fixture {
    pub fn new(
        provider: Arc<dyn FlagProvider>,
        identity: impl Into<Arc<Identity>>,
        flag_key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            identity: identity.into(),
            flag_key: flag_key.into(),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("provider", &self.provider.name())
            .field("identity", &self.identity)
            .field("flag_key", &self.flag_key)
            .finish()
    }
}

/// Both providers' fixtures, ready before any case is timed
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub devcycle: Fixture,
    pub launchdarkly: Fixture,
}

impl Fixtures {
    /// Build every fixture, failing on the first setup error.
    ///
    /// Both credentials are read before any client is constructed.
    pub fn setup(config: &BenchConfig) -> Result<Self, SetupError> {
        let dc_key = read_credential(&config.devcycle.key_var)?;
        let ld_key = read_credential(&config.launchdarkly.key_var)?;

        let devcycle = devcycle_fixture_with(&config.devcycle, &dc_key)?;
        let launchdarkly = launchdarkly_fixture_with(&config.launchdarkly, &ld_key)?;

        for fixture in [&devcycle, &launchdarkly] {
            let health = fixture.provider.health();
            tracing::info!(
                provider = %health.provider,
                initialized = health.initialized,
                cached_entries = health.cached_entries,
                "provider health"
            );
        }
        Ok(Self { devcycle, launchdarkly })
    }
}

/// Build the provider A fixture from the environment
pub fn devcycle_fixture(config: &DevCycleFixtureConfig) -> Result<Fixture, SetupError> {
    let credential = read_credential(&config.key_var)?;
    devcycle_fixture_with(config, &credential)
}

pub fn devcycle_fixture_with(
    config: &DevCycleFixtureConfig,
    credential: &Credential,
) -> Result<Fixture, SetupError> {
    let client = DevCycleClient::new(credential.expose(), config.options.clone()).map_err(|source| {
        SetupError::Client {
            provider: "devcycle",
            source,
        }
    })?;

    let adapter = DevCycleAdapter::new(client, default_identity());
    let identity = Arc::clone(adapter.identity());

    // Local mode fetches the user's variables on first use; do it here, untimed.
    adapter
        .bool_variation(&identity, &config.flag_key, false)
        .map_err(|source| SetupError::Client {
            provider: "devcycle",
            source,
        })?;

    tracing::info!(provider = "devcycle", flag_key = %config.flag_key, "fixture ready");
    Ok(Fixture::new(Arc::new(adapter), identity, config.flag_key.clone()))
}

/// Build the provider B fixture from the environment
pub fn launchdarkly_fixture(config: &LaunchDarklyFixtureConfig) -> Result<Fixture, SetupError> {
    let credential = read_credential(&config.key_var)?;
    launchdarkly_fixture_with(config, &credential)
}

pub fn launchdarkly_fixture_with(
    config: &LaunchDarklyFixtureConfig,
    credential: &Credential,
) -> Result<Fixture, SetupError> {
    let client = LdClient::make_custom_client(credential.expose(), config.config.clone(), config.start_wait)
        .map_err(|source| SetupError::Client {
            provider: "launchdarkly",
            source,
        })?;

    let adapter = LaunchDarklyAdapter::new(client, default_cdn_identity());
    let identity = Arc::clone(adapter.identity());
    tracing::info!(provider = "launchdarkly", flag_key = %config.flag_key, "fixture ready");
    Ok(Fixture::new(Arc::new(adapter), identity, config.flag_key.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{read_credential_with, ProviderError};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(value: &str) -> Credential {
        let value = value.to_string();
        read_credential_with("TEST_KEY", move |_| Some(value)).unwrap()
    }

    #[test]
    fn test_missing_credential_fails_setup() {
        let config = LaunchDarklyFixtureConfig {
            key_var: "FLAGBENCH_FIXTURE_TEST_UNSET_LD_KEY".into(),
            ..Default::default()
        };
        let err = launchdarkly_fixture(&config).unwrap_err();
        assert_eq!(
            err,
            SetupError::MissingCredential {
                var: "FLAGBENCH_FIXTURE_TEST_UNSET_LD_KEY".into()
            }
        );
    }

    #[test]
    fn test_devcycle_missing_credential() {
        let config = DevCycleFixtureConfig {
            key_var: "FLAGBENCH_FIXTURE_TEST_UNSET_DC_KEY".into(),
            ..Default::default()
        };
        assert!(matches!(
            devcycle_fixture(&config),
            Err(SetupError::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_setup_fails_fast_on_first_provider() {
        let mut config = BenchConfig::default();
        config.devcycle.key_var = "FLAGBENCH_FIXTURE_TEST_UNSET_DC_KEY".into();
        config.launchdarkly.key_var = "FLAGBENCH_FIXTURE_TEST_UNSET_LD_KEY".into();

        let err = Fixtures::setup(&config).unwrap_err();
        assert_eq!(
            err,
            SetupError::MissingCredential {
                var: "FLAGBENCH_FIXTURE_TEST_UNSET_DC_KEY".into()
            }
        );
    }

    #[test]
    fn test_offline_launchdarkly_fixture() {
        let mut config = LaunchDarklyFixtureConfig::default();
        config.config.offline = true;

        let fixture = launchdarkly_fixture_with(&config, &credential("sdk-test")).unwrap();
        assert_eq!(fixture.provider_name(), "launchdarkly");
        assert_eq!(fixture.flag_key, "cb-test-flag-2");
        assert_eq!(fixture.identity.attributes.len(), 6);
        assert_eq!(
            fixture
                .provider
                .bool_variation(&fixture.identity, &fixture.flag_key, false),
            Ok(false)
        );
    }

    #[test]
    fn test_launchdarkly_construction_failure_is_setup_error() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;
            server
        });

        let mut config = LaunchDarklyFixtureConfig::default();
        config.config.base_uri = server.uri();
        config.start_wait = Duration::from_secs(2);

        let err = launchdarkly_fixture_with(&config, &credential("sdk-bad")).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Client {
                provider: "launchdarkly",
                source: ProviderError::Http { status: 401, .. }
            }
        ));
    }

    #[test]
    fn test_devcycle_fixture() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/variables"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "basic-boolean": {"key": "basic-boolean", "type": "Boolean", "value": false}
                })))
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let mut config = DevCycleFixtureConfig::default();
        config.options.bucketing_api_uri = server.uri();
        config.options.events_api_uri = server.uri();

        let fixture = devcycle_fixture_with(&config, &credential("dvc_server_test")).unwrap();
        assert_eq!(fixture.provider_name(), "devcycle");
        assert_eq!(fixture.identity.user_id, "dontcare");
        assert!(fixture.identity.attributes.is_empty());

        let variable_fetches = || {
            rt.block_on(server.received_requests())
                .unwrap()
                .iter()
                .filter(|request| request.url.path() == "/v1/variables")
                .count()
        };
        assert_eq!(variable_fetches(), 1);

        for _ in 0..20 {
            assert_eq!(
                fixture
                    .provider
                    .bool_variation(&fixture.identity, &fixture.flag_key, false),
                Ok(false)
            );
        }
        assert_eq!(variable_fetches(), 1);
    }

    #[test]
    fn test_devcycle_warm_up_failure_is_setup_error() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(403).set_body_string("invalid sdk key"))
                .mount(&server)
                .await;
            server
        });

        let mut config = DevCycleFixtureConfig::default();
        config.options.bucketing_api_uri = server.uri();
        config.options.events_api_uri = server.uri();

        let err = devcycle_fixture_with(&config, &credential("dvc_server_bad")).unwrap_err();
        assert_eq!(
            err,
            SetupError::Client {
                provider: "devcycle",
                source: ProviderError::Http {
                    status: 403,
                    message: "invalid sdk key".into()
                }
            }
        );
    }
}
