//! Provider adapters
//!
//! Wrap each concrete client behind [`FlagProvider`]. Each adapter converts its
//! fixture identity into the client's user type once. Callers passing the
//! adapter's own [`Identity`] (see [`DevCycleAdapter::identity`]) reuse the
//! converted user after a pointer check; any other identity is converted per
//! call.

use super::devcycle::{DevCycleClient, DevCycleUser};
use super::launchdarkly::{LdClient, LdUser};
use super::traits::{FlagProvider, ProviderHealth, ProviderResult};
use crate::identity::Identity;
use crate::value::VariableValue;
use std::borrow::Cow;
use std::sync::Arc;

pub fn devcycle_user(identity: &Identity) -> DevCycleUser {
    let mut user = DevCycleUser::new(identity.user_id.clone());
    user.custom_data = identity
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    user
}

pub fn ld_user(identity: &Identity) -> LdUser {
    LdUser::new(identity.user_id.clone()).custom_all(identity.attributes.clone())
}

/// [`FlagProvider`] over a [`DevCycleClient`]
#[derive(Debug)]
pub struct DevCycleAdapter {
    client: DevCycleClient,
    identity: Arc<Identity>,
    user: DevCycleUser,
}

impl DevCycleAdapter {
    pub fn new(client: DevCycleClient, identity: impl Into<Arc<Identity>>) -> Self {
        let identity = identity.into();
        let user = devcycle_user(&identity);
        Self {
            client,
            identity,
            user,
        }
    }

    pub fn client(&self) -> &DevCycleClient {
        &self.client
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    fn user_for(&self, identity: &Identity) -> Cow<'_, DevCycleUser> {
        if std::ptr::eq(identity, &*self.identity) || *identity == *self.identity {
            Cow::Borrowed(&self.user)
        } else {
            Cow::Owned(devcycle_user(identity))
        }
    }
}

impl FlagProvider for DevCycleAdapter {
    fn name(&self) -> &'static str {
        "devcycle"
    }

    fn bool_variation(&self, identity: &Identity, flag_key: &str, default: bool) -> ProviderResult<bool> {
        let user = self.user_for(identity);
        let variable = self
            .client
            .variable(&user, flag_key, VariableValue::Bool(default))?;
        variable.value.as_bool()
    }

    fn health(&self) -> ProviderHealth {
        self.client.health()
    }
}

/// [`FlagProvider`] over an [`LdClient`]
#[derive(Debug)]
pub struct LaunchDarklyAdapter {
    client: LdClient,
    identity: Arc<Identity>,
    user: LdUser,
}

impl LaunchDarklyAdapter {
    pub fn new(client: LdClient, identity: impl Into<Arc<Identity>>) -> Self {
        let identity = identity.into();
        let user = ld_user(&identity);
        Self {
            client,
            identity,
            user,
        }
    }

    pub fn client(&self) -> &LdClient {
        &self.client
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    fn user_for(&self, identity: &Identity) -> Cow<'_, LdUser> {
        if std::ptr::eq(identity, &*self.identity) || *identity == *self.identity {
            Cow::Borrowed(&self.user)
        } else {
            Cow::Owned(ld_user(identity))
        }
    }
}

impl FlagProvider for LaunchDarklyAdapter {
    fn name(&self) -> &'static str {
        "launchdarkly"
    }

    fn bool_variation(&self, identity: &Identity, flag_key: &str, default: bool) -> ProviderResult<bool> {
        let user = self.user_for(identity);
        self.client.bool_variation(flag_key, &user, default)
    }

    fn health(&self) -> ProviderHealth {
        self.client.health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{default_cdn_identity, default_identity};
    use crate::providers::devcycle::DevCycleOptions;
    use crate::providers::launchdarkly::LdConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_identity_conversion() {
        let identity = default_cdn_identity();

        let dc = devcycle_user(&identity);
        assert_eq!(dc.user_id, "dontcare");
        assert_eq!(dc.custom_data.get("cdn_dc"), Some(&json!("jfk")));

        let ld = ld_user(&identity);
        assert_eq!(ld.key, "dontcare");
        assert_eq!(ld.custom.len(), 6);
    }

    #[test]
    fn test_own_identity_reuses_converted_user() {
        let config = LdConfig {
            offline: true,
            ..Default::default()
        };
        let client = LdClient::make_custom_client("sdk-test", config, Duration::from_secs(1)).unwrap();
        let adapter = LaunchDarklyAdapter::new(client, default_cdn_identity());
        let shared = Arc::clone(adapter.identity());

        assert!(matches!(adapter.user_for(&shared), Cow::Borrowed(_)));
        assert!(matches!(adapter.user_for(&default_cdn_identity()), Cow::Borrowed(_)));

        let other = Identity::new("other");
        match adapter.user_for(&other) {
            Cow::Owned(user) => assert_eq!(user.key, "other"),
            Cow::Borrowed(_) => panic!("foreign identity served the cached user"),
        }
    }

    #[test]
    fn test_offline_launchdarkly_adapter() {
        let config = LdConfig {
            offline: true,
            ..Default::default()
        };
        let client = LdClient::make_custom_client("sdk-test", config, Duration::from_secs(1)).unwrap();
        let identity = default_cdn_identity();
        let adapter = LaunchDarklyAdapter::new(client, identity.clone());

        assert_eq!(adapter.name(), "launchdarkly");
        assert_eq!(adapter.bool_variation(&identity, "cb-test-flag-2", false), Ok(false));
        assert_eq!(
            adapter.bool_variation(&Identity::new("other"), "cb-test-flag-2", true),
            Ok(true)
        );
    }

    #[test]
    fn test_devcycle_adapter_evaluates() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/variables/basic-boolean"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "key": "basic-boolean",
                    "type": "Boolean",
                    "value": false
                })))
                .mount(&server)
                .await;
            server
        });

        let options = DevCycleOptions {
            enable_cloud_bucketing: true,
            disable_automatic_event_logging: true,
            disable_custom_event_logging: true,
            bucketing_api_uri: server.uri(),
            ..Default::default()
        };
        let client = DevCycleClient::new("dvc_server_test", options).unwrap();
        let identity = default_identity();
        let adapter = DevCycleAdapter::new(client, identity.clone());

        assert_eq!(adapter.name(), "devcycle");
        assert_eq!(adapter.bool_variation(&identity, "basic-boolean", true), Ok(false));
        assert_eq!(
            adapter.bool_variation(&Identity::new("someone-else"), "basic-boolean", true),
            Ok(false)
        );
    }
}
