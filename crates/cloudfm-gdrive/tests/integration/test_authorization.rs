//! Silent authorization, discovery bootstrap and token refresh

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudfm_core::domain::AuthorizationState;
use cloudfm_core::ports::ICloudProvider;
use cloudfm_gdrive::auth::{MemoryTokenCache, TokenCache, Tokens};
use cloudfm_gdrive::discovery;

use crate::common;

#[tokio::test]
async fn test_cached_token_authorizes_silently() {
    let (_server, provider) = common::authorized_provider().await;

    assert!(provider.authorized().await);
    assert_eq!(provider.authorization_state(), AuthorizationState::Authorized);
    // No refresh token, nothing to renew.
    assert!(!provider.renewal_scheduled());
}

#[tokio::test]
async fn test_immediate_without_tokens_reports_unauthorized() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;

    let provider = common::provider_with_cache(
        &server,
        discovery::new_loader(),
        Arc::new(MemoryTokenCache::new()),
    );
    let mut state = provider.subscribe();

    assert!(!provider.authorize(true).await.unwrap());
    assert!(!provider.authorized().await);
    assert_eq!(*state.borrow_and_update(), AuthorizationState::Unauthorized);
}

#[tokio::test]
async fn test_authorized_is_stable_before_sign_in() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    let provider = common::provider_with_cache(
        &server,
        discovery::new_loader(),
        Arc::new(MemoryTokenCache::new()),
    );

    for _ in 0..3 {
        assert!(!provider.authorized().await);
    }
    // Asking is not signing in.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authorized_is_stable_after_sign_in() {
    let (server, provider) = common::authorized_provider().await;
    let requests_after_sign_in = server.received_requests().await.unwrap().len();

    for _ in 0..3 {
        assert!(provider.authorized().await);
        assert_eq!(provider.authorization_state(), AuthorizationState::Authorized);
    }
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_sign_in
    );
}

#[tokio::test]
async fn test_discovery_is_fetched_once_per_loader() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": format!("{}/auth", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let loader = discovery::new_loader();
    let first =
        common::provider_with_cache(&server, loader.clone(), Arc::new(MemoryTokenCache::new()));
    let second =
        common::provider_with_cache(&server, loader.clone(), Arc::new(MemoryTokenCache::new()));

    let (a, b) = tokio::join!(first.authorize(true), second.authorize(true));
    assert!(!a.unwrap());
    assert!(!b.unwrap());
    assert!(loader.is_loaded());
}

#[tokio::test]
async fn test_discovery_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = common::provider_with_cache(
        &server,
        discovery::new_loader(),
        Arc::new(MemoryTokenCache::new()),
    );
    let err = provider.authorize(true).await.unwrap_err();
    assert!(err.to_string().contains("bootstrap failed"));
}

#[tokio::test]
async fn test_expired_cached_token_is_refreshed_and_renewal_scheduled() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryTokenCache::with_tokens(Tokens {
        access_token: "stale".to_string(),
        refresh_token: Some("stored-refresh".to_string()),
        expires_at: Utc::now() - chrono::Duration::minutes(5),
    }));
    let provider = common::provider_with_cache(&server, discovery::new_loader(), cache.clone());

    assert!(provider.authorize(true).await.unwrap());
    assert!(provider.renewal_scheduled());

    let cached = cache.load().unwrap().unwrap();
    assert_eq!(cached.access_token, "fresh-access-token");
    assert_eq!(cached.refresh_token.as_deref(), Some("stored-refresh"));
    assert!(cached.remaining() > Duration::from_secs(3500));
}

#[tokio::test]
async fn test_rejected_refresh_leaves_provider_unauthorized() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryTokenCache::with_tokens(Tokens {
        access_token: "stale".to_string(),
        refresh_token: Some("revoked".to_string()),
        expires_at: Utc::now() - chrono::Duration::minutes(5),
    }));
    let provider = common::provider_with_cache(&server, discovery::new_loader(), cache);

    assert!(!provider.authorize(true).await.unwrap());
    assert!(!provider.renewal_scheduled());
}

#[tokio::test]
async fn test_sign_out_clears_cache() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    let cache = Arc::new(MemoryTokenCache::with_tokens(Tokens::expiring_in(
        "token",
        None,
        Duration::from_secs(600),
    )));
    let provider = common::provider_with_cache(&server, discovery::new_loader(), cache.clone());
    assert!(provider.authorize(true).await.unwrap());

    provider.sign_out().unwrap();
    assert!(cache.load().unwrap().is_none());
    assert!(!provider.authorize(true).await.unwrap());
}
