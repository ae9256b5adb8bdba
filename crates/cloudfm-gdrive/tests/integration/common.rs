//! Shared helpers for the Drive integration tests
//!
//! Each helper mounts the endpoints a scenario needs on a wiremock server
//! and returns a provider pointed at it.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudfm_core::config::GoogleDriveConfig;
use cloudfm_core::ports::ICloudProvider;
use cloudfm_gdrive::auth::{MemoryTokenCache, Tokens};
use cloudfm_gdrive::discovery::{self, DiscoveryLoader};
use cloudfm_gdrive::GoogleDriveProvider;

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Mounts the discovery document, pointing the OAuth endpoints at `server`
pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": "https://accounts.google.com",
            "authorization_endpoint": format!("{}/auth", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "revocation_endpoint": format!("{}/revoke", server.uri()),
        })))
        .mount(server)
        .await;
}

pub fn config() -> GoogleDriveConfig {
    GoogleDriveConfig {
        enabled: true,
        client_id: Some("test-client.apps.googleusercontent.com".to_string()),
        ..GoogleDriveConfig::default()
    }
}

/// A provider against `server` holding the given token cache
pub fn provider_with_cache(
    server: &MockServer,
    loader: Arc<DiscoveryLoader>,
    cache: Arc<MemoryTokenCache>,
) -> GoogleDriveProvider {
    GoogleDriveProvider::from_config(&config(), loader)
        .expect("provider config")
        .with_api_base_url(server.uri())
        .with_discovery_url(format!("{}{DISCOVERY_PATH}", server.uri()))
        .with_token_cache(cache)
}

/// Sets up a mock server and a provider already authorized with a cached
/// access token
pub async fn authorized_provider() -> (MockServer, GoogleDriveProvider) {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let cache = Arc::new(MemoryTokenCache::with_tokens(Tokens::expiring_in(
        "test-access-token",
        None,
        Duration::from_secs(3600),
    )));
    let provider = provider_with_cache(&server, discovery::new_loader(), cache);
    assert!(provider.authorize(true).await.expect("authorize"));

    (server, provider)
}
