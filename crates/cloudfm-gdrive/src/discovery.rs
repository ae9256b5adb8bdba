//! OpenID discovery bootstrap
//!
//! Before the first authorization, the provider learns Google's OAuth
//! endpoints from the discovery document. The fetch happens once per
//! [`DiscoveryLoader`]; every provider instance built over the same loader
//! waits on that single bootstrap.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use cloudfm_core::loader::{SdkLoadError, SdkLoader};

/// Google's OpenID discovery document
pub const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

/// The endpoints the OAuth flow needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryDocument {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
}

/// Shared one-time loader of the discovery document
pub type DiscoveryLoader = SdkLoader<Arc<DiscoveryDocument>>;

/// A fresh loader to share between provider instances
pub fn new_loader() -> Arc<DiscoveryLoader> {
    Arc::new(SdkLoader::new("google-oauth-discovery"))
}

/// Fetches and parses the discovery document
pub async fn fetch(url: &str) -> Result<Arc<DiscoveryDocument>, String> {
    debug!(url, "Fetching OAuth discovery document");
    let response = reqwest::get(url)
        .await
        .map_err(|e| format!("Failed to fetch {url}: {e}"))?
        .error_for_status()
        .map_err(|e| format!("Discovery request failed: {e}"))?;
    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| format!("Invalid discovery document: {e}"))?;
    info!(
        authorization = %document.authorization_endpoint,
        token = %document.token_endpoint,
        "Loaded OAuth discovery document"
    );
    Ok(Arc::new(document))
}

/// Loads the document through `loader`, fetching only on first use
pub async fn ensure_loaded(
    loader: &DiscoveryLoader,
    url: &str,
) -> Result<Arc<DiscoveryDocument>, SdkLoadError> {
    let url = url.to_string();
    loader.load(move || async move { fetch(&url).await }).await
}
