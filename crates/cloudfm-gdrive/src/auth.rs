//! OAuth2 PKCE authentication for Google Drive
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for native
//! applications, against the endpoints learned from Google's discovery
//! document.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Client id, scopes and redirect URI
//! - [`Tokens`] - Access/refresh token pair with expiry
//! - [`TokenCache`] - Where tokens survive between runs ([`KeyringTokenCache`]
//!   in the OS credential store, [`MemoryTokenCache`] for one process)
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`GoogleAuthAdapter`] - Orchestrates the full interactive flow
//! - [`RenewalScheduler`] - Silent renewal at 75% of the token lifetime

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::discovery::DiscoveryDocument;

/// Default redirect URI for the local callback server
pub const REDIRECT_URI: &str = "http://127.0.0.1:8400/callback";

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "cloudfm";

/// Default OAuth2 scopes for Drive access
const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 PKCE authentication flow
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth client id from the Google Cloud console
    pub client_id: String,
    /// Redirect URI for receiving the authorization code
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Creates a config with the default Drive scopes and redirect URI
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens held for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Tokens expiring `lifetime` from now
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        lifetime: Duration,
    ) -> Self {
        let lifetime = chrono::Duration::from_std(lifetime)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_LIFETIME_SECS));
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Utc::now() + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

// ============================================================================
// TokenCache
// ============================================================================

/// Persistence for tokens between authorizations
pub trait TokenCache: Send + Sync {
    fn load(&self) -> Result<Option<Tokens>>;
    fn store(&self, tokens: &Tokens) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores tokens in the system keyring
///
/// Uses the OS credential store (GNOME Keyring, KDE Wallet, macOS Keychain)
/// with the service name "cloudfm". Tokens are serialized as JSON.
pub struct KeyringTokenCache {
    username: String,
}

impl KeyringTokenCache {
    /// A cache entry scoped to one OAuth client
    pub fn for_client(client_id: &str) -> Self {
        Self {
            username: format!("google-drive:{client_id}"),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.username)
            .context("Failed to create keyring entry")
    }
}

impl TokenCache for KeyringTokenCache {
    fn load(&self) -> Result<Option<Tokens>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(user = %self.username, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(user = %self.username, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn store(&self, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;
        debug!(user = %self.username, "Stored tokens in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(user = %self.username, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

/// Process-local token cache
#[derive(Default)]
pub struct MemoryTokenCache {
    tokens: Mutex<Option<Tokens>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Tokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Tokens>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenCache for MemoryTokenCache {
    fn load(&self) -> Result<Option<Tokens>> {
        Ok(self.slot().clone())
    }

    fn store(&self, tokens: &Tokens) -> Result<()> {
        *self.slot() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
pub struct PKCEFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
}

impl PKCEFlow {
    /// Creates a flow against the discovered endpoints
    pub fn new(config: &OAuth2Config, discovery: &DiscoveryDocument) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(discovery.authorization_endpoint.clone())
                    .context("Invalid authorization URL")?,
            )
            .set_token_uri(
                TokenUrl::new(discovery.token_endpoint.clone()).context("Invalid token URL")?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Returns `(authorization_url, csrf_token, pkce_verifier)`; the verifier
    /// must be kept until the code exchange.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline");
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();
        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    fn http_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")
    }

    /// Exchanges an authorization code for tokens
    pub async fn exchange_code(&self, code: String, pkce_verifier: PkceCodeVerifier) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&Self::http_client()?)
            .await
            .context("Failed to exchange authorization code")?;

        let tokens = Tokens::expiring_in(
            token_result.access_token().secret().to_string(),
            token_result.refresh_token().map(|t| t.secret().to_string()),
            token_result
                .expires_in()
                .unwrap_or(Duration::from_secs(DEFAULT_LIFETIME_SECS as u64)),
        );
        info!("Obtained OAuth tokens");
        Ok(tokens)
    }

    /// Obtains a fresh access token from a refresh token
    ///
    /// Google usually omits a new refresh token; the old one is kept.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        debug!("Refreshing access token");
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&Self::http_client()?)
            .await
            .context("Failed to refresh token")?;

        let tokens = Tokens::expiring_in(
            token_result.access_token().secret().to_string(),
            token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            token_result
                .expires_in()
                .unwrap_or(Duration::from_secs(DEFAULT_LIFETIME_SECS as u64)),
        );
        info!("Refreshed access token");
        Ok(tokens)
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server receiving the OAuth2 redirect on the loopback
/// interface. Answers one request, then shuts down.
pub struct LocalCallbackServer;

/// Parameters extracted from the OAuth2 callback
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl LocalCallbackServer {
    /// Listens on the redirect URI's host and port and waits for the redirect
    pub async fn start(redirect_uri: &str) -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::header::{HeaderValue, CONTENT_TYPE};
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        let redirect = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = redirect.host_str().unwrap_or("127.0.0.1").to_string();
        let port = redirect.port_or_known_default().unwrap_or(8400);
        let addr = format!("{host}:{port}");

        info!(addr = %addr, "Starting local OAuth callback server");
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind callback server to {addr}"))?;

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = std::sync::Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let (stream, _addr) = listener
            .accept()
            .await
            .context("Failed to accept connection on callback server")?;
        let io = TokioIo::new(stream);

        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let tx = tx.clone();
            async move {
                let uri = req.uri().to_string();
                debug!(uri = %uri, "Callback server received request");

                let (status, html) = match parse_callback_params(&uri) {
                    Some(params) => {
                        if let Some(sender) = tx.lock().await.take() {
                            let _ = sender.send(params);
                        }
                        (StatusCode::OK, success_html())
                    }
                    None => (
                        StatusCode::BAD_REQUEST,
                        error_html("Missing authorization code in callback"),
                    ),
                };

                let mut response = Response::new(Full::new(Bytes::from(html)));
                *response.status_mut() = status;
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                Ok::<_, hyper::Error>(response)
            }
        });

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = %e, "Callback server connection error");
            }
        });

        let params = rx
            .await
            .context("Callback server closed without receiving an authorization code")?;
        info!("Received OAuth callback with authorization code");
        Ok(params)
    }
}

/// Parses the authorization code and state from a callback URI
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Cloud File Manager - Signed in</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Signed in to Google Drive</h1>
    <p>You can close this window and return to the application.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Cloud File Manager - Sign-in Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Sign-in Error</h1>
    <p>{message}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

// ============================================================================
// GoogleAuthAdapter
// ============================================================================

/// Runs the interactive PKCE login and token refreshes
///
/// 1. Builds a PKCE authorization URL from the discovered endpoints
/// 2. Opens the user's browser on it
/// 3. Waits for the redirect on the local callback server
/// 4. Checks the CSRF state and exchanges the code for tokens
#[derive(Debug, Clone)]
pub struct GoogleAuthAdapter {
    config: OAuth2Config,
}

impl GoogleAuthAdapter {
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    /// Performs the full interactive login
    pub async fn login(&self, discovery: &DiscoveryDocument) -> Result<Tokens> {
        info!("Starting OAuth2 PKCE login flow");
        let flow = PKCEFlow::new(&self.config, discovery)?;
        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();

        info!("Opening browser for authentication");
        webbrowser::open(&auth_url).context("Failed to open browser for authentication")?;

        let callback = LocalCallbackServer::start(&self.config.redirect_uri).await?;
        if callback.state != *csrf_token.secret() {
            return Err(anyhow!("OAuth state mismatch in callback"));
        }

        let tokens = flow.exchange_code(callback.code, pkce_verifier).await?;
        info!("OAuth2 PKCE login completed");
        Ok(tokens)
    }

    /// Renews the access token without user interaction
    pub async fn refresh(&self, discovery: &DiscoveryDocument, refresh_token: &str) -> Result<Tokens> {
        PKCEFlow::new(&self.config, discovery)?
            .refresh_token(refresh_token)
            .await
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }
}

// ============================================================================
// RenewalScheduler
// ============================================================================

/// Shortest wait between two renewals
const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(10);

/// When to renew a token with the given remaining lifetime: at 75% of it
pub fn renewal_delay(lifetime: Duration) -> Duration {
    (lifetime * 3 / 4).max(MIN_RENEWAL_DELAY)
}

/// Holds the single pending renewal timer
///
/// Scheduling replaces (aborts) whatever timer was pending, so repeated
/// authorizations never stack renewals.
#[derive(Default)]
pub struct RenewalScheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RenewalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Renews at 75% of `lifetime`, then keeps renewing at 75% of each new
    /// lifetime `renew` returns, until it returns `None`
    pub fn schedule<F, Fut>(&self, lifetime: Duration, mut renew: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut lifetime = lifetime;
            loop {
                let delay = renewal_delay(lifetime);
                debug!(delay_secs = delay.as_secs(), "Token renewal scheduled");
                tokio::time::sleep(delay).await;
                match renew().await {
                    Some(next) => lifetime = next,
                    None => break,
                }
            }
        });

        if let Some(previous) = self.slot().replace(task) {
            previous.abort();
            debug!("Replaced pending token renewal");
        }
    }

    /// Clears the pending timer, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }

    /// Whether a renewal timer is still pending
    pub fn is_scheduled(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn discovery() -> DiscoveryDocument {
        DiscoveryDocument {
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_endpoint: "https://oauth2.googleapis.com/token".into(),
            revocation_endpoint: None,
        }
    }

    fn counting_renewal(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Option<Duration>> + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Some(Duration::from_secs(100)))
        }
    }

    #[test]
    fn test_oauth2_config_defaults() {
        let config = OAuth2Config::new("client.apps.googleusercontent.com");
        assert_eq!(config.redirect_uri, REDIRECT_URI);
        assert_eq!(config.scopes.len(), 2);
        assert!(config
            .scopes
            .contains(&"https://www.googleapis.com/auth/drive".to_string()));
    }

    #[test]
    fn test_pkce_flow_generates_auth_url() {
        let config = OAuth2Config::new("test-client-id");
        let flow = PKCEFlow::new(&config, &discovery()).unwrap();
        let (url, _csrf, _verifier) = flow.generate_auth_url();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(url.contains("test-client-id"));
        assert!(url.contains("code_challenge"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_parse_callback_params() {
        let params = parse_callback_params("/callback?code=4/0Adeu5B&state=xyz789").unwrap();
        assert_eq!(params.code, "4/0Adeu5B");
        assert_eq!(params.state, "xyz789");

        assert!(parse_callback_params("/callback?state=xyz789").is_none());
        let params = parse_callback_params("/callback?code=abc").unwrap();
        assert_eq!(params.state, "");
    }

    #[test]
    fn test_html_pages() {
        assert!(success_html().contains("Signed in to Google Drive"));
        let html = error_html("test error message");
        assert!(html.contains("test error message"));
    }

    #[test]
    fn test_tokens_expiry() {
        let tokens = Tokens::expiring_in("a", None, Duration::from_secs(3600));
        assert!(!tokens.is_expired());
        assert!(tokens.remaining() > Duration::from_secs(3500));

        let expired = Tokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Utc::now() - chrono::Duration::seconds(5),
        };
        assert!(expired.is_expired());
        assert_eq!(expired.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryTokenCache::new();
        assert!(cache.load().unwrap().is_none());
        let tokens = Tokens::expiring_in("a", Some("r".into()), Duration::from_secs(60));
        cache.store(&tokens).unwrap();
        assert_eq!(cache.load().unwrap(), Some(tokens));
        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_renewal_delay_is_three_quarters() {
        assert_eq!(renewal_delay(Duration::from_secs(3600)), Duration::from_secs(2700));
        assert_eq!(renewal_delay(Duration::from_secs(4)), MIN_RENEWAL_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_fires_at_75_percent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = RenewalScheduler::new();
        scheduler.schedule(Duration::from_secs(100), counting_renewal(&counter));

        tokio::time::sleep(Duration::from_secs(74)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_scheduled());

        // The next renewal follows the renewed lifetime.
        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = RenewalScheduler::new();
        scheduler.schedule(Duration::from_secs(100), counting_renewal(&counter));
        scheduler.schedule(Duration::from_secs(100), counting_renewal(&counter));

        tokio::time::sleep(Duration::from_secs(76)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_stop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = RenewalScheduler::new();
        scheduler.schedule(Duration::from_secs(100), counting_renewal(&counter));
        scheduler.cancel();
        assert!(!scheduler.is_scheduled());
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        scheduler.schedule(Duration::from_secs(100), || std::future::ready(None));
        tokio::time::sleep(Duration::from_secs(80)).await;
        assert!(!scheduler.is_scheduled());
    }
}
