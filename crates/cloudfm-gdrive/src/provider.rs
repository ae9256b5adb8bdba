//! GoogleDriveProvider - ICloudProvider implementation for Drive v3
//!
//! Wraps the [`DriveClient`] for file operations and drives the OAuth
//! lifecycle itself: discovery bootstrap, cached tokens, interactive login
//! and silent renewal.
//!
//! ## Design Notes
//!
//! - The discovery loader is injected so every instance sharing it triggers
//!   at most one bootstrap per process.
//! - Drive ids live in the metadata's provider data as `{"id": ..}`; the
//!   root folder is addressed as `root`.
//! - Renewal tasks hold only a weak reference to the session, so dropping
//!   the provider stops them.

use std::sync::{Arc, Mutex, Weak};

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use cloudfm_core::config::GoogleDriveConfig;
use cloudfm_core::domain::metadata::sort_by_name;
use cloudfm_core::domain::{
    AuthGate, AuthorizationState, Capabilities, Capability, CloudContent, CloudMetadata,
    CloudMetadataKind, ProviderName,
};
use cloudfm_core::ports::{
    AuthorizationPrompt, ICloudProvider, ListOptions, ProviderError, ProviderResult,
};
use cloudfm_core::usecases::well_known;

use crate::auth::{
    GoogleAuthAdapter, KeyringTokenCache, OAuth2Config, RenewalScheduler, TokenCache, Tokens,
};
use crate::client::{DriveClient, DriveFile, GOOGLE_API_BASE_URL};
use crate::discovery::{self, DiscoveryDocument, DiscoveryLoader, GOOGLE_DISCOVERY_URL};

const ROOT_FOLDER_ID: &str = "root";

/// Token state shared with the renewal task
#[derive(Default)]
struct Session {
    tokens: Mutex<Option<Tokens>>,
    gate: AuthGate,
    renewal: RenewalScheduler,
}

impl Session {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Tokens>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The access token, if held and unexpired
    fn valid_access_token(&self) -> Option<String> {
        self.slot()
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.slot().as_ref().and_then(|t| t.refresh_token.clone())
    }

    fn set_tokens(&self, tokens: Option<Tokens>) {
        *self.slot() = tokens;
    }
}

/// Provider backed by Google Drive
pub struct GoogleDriveProvider {
    name: ProviderName,
    display_name: String,
    url_display_name: Option<String>,
    capabilities: Capabilities,
    mime_type: String,
    oauth: OAuth2Config,
    loader: Arc<DiscoveryLoader>,
    discovery_url: String,
    api_base_url: String,
    token_cache: Arc<dyn TokenCache>,
    session: Arc<Session>,
}

impl GoogleDriveProvider {
    /// Every capability except `setFolder`
    pub fn default_capabilities() -> Capabilities {
        Capabilities::all().without(Capability::SetFolder)
    }

    /// Builds the provider from its configuration section
    ///
    /// # Errors
    /// Returns [`ProviderError::Configuration`] when no client id is set.
    pub fn from_config(
        config: &GoogleDriveConfig,
        loader: Arc<DiscoveryLoader>,
    ) -> ProviderResult<Self> {
        let client_id = config
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(
                    "Google Drive requires an OAuth client_id".to_string(),
                )
            })?;

        let oauth = OAuth2Config::new(client_id).with_scopes(config.scopes.clone());
        Ok(Self {
            name: ProviderName::from_static(well_known::GOOGLE_DRIVE),
            display_name: config.display_name.clone(),
            url_display_name: config.url_display_name.clone(),
            capabilities: Self::default_capabilities().apply(&config.capabilities),
            mime_type: config.mime_type.clone(),
            token_cache: Arc::new(KeyringTokenCache::for_client(client_id)),
            oauth,
            loader,
            discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
            api_base_url: GOOGLE_API_BASE_URL.to_string(),
            session: Arc::new(Session::default()),
        })
    }

    /// Overrides the Drive API host (useful for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Overrides where the OAuth discovery document is fetched from
    pub fn with_discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = url.into();
        self
    }

    /// Replaces the keyring-backed token cache
    pub fn with_token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_cache = cache;
        self
    }

    /// Overrides the OAuth redirect URI
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.oauth = self.oauth.with_redirect_uri(uri);
        self
    }

    /// Observes the authorization state
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationState> {
        self.session.gate.subscribe()
    }

    pub fn authorization_state(&self) -> AuthorizationState {
        self.session.gate.state()
    }

    /// Whether a silent renewal is pending
    pub fn renewal_scheduled(&self) -> bool {
        self.session.renewal.is_scheduled()
    }

    /// Forgets all tokens, in memory and in the cache
    pub fn sign_out(&self) -> ProviderResult<()> {
        self.session.renewal.cancel();
        self.session.set_tokens(None);
        self.session.gate.reset();
        self.token_cache
            .clear()
            .map_err(|e| ProviderError::Io(format!("{e:#}")))?;
        info!("Signed out of Google Drive");
        Ok(())
    }

    async fn discovery(&self) -> ProviderResult<Arc<DiscoveryDocument>> {
        discovery::ensure_loaded(&self.loader, &self.discovery_url)
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))
    }

    fn client(&self) -> ProviderResult<DriveClient> {
        let token = self.session.valid_access_token().ok_or_else(|| {
            ProviderError::NotAuthorized(format!("Please sign in to {}", self.display_name))
        })?;
        Ok(DriveClient::with_base_url(token, &self.api_base_url))
    }

    fn adapter(&self) -> GoogleAuthAdapter {
        GoogleAuthAdapter::new(self.oauth.clone())
    }

    /// Cached tokens, refreshed first when they have expired
    async fn cached_tokens(&self, discovery: &DiscoveryDocument) -> Option<Tokens> {
        let cached = match self.token_cache.load() {
            Ok(cached) => cached?,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not read cached tokens");
                return None;
            }
        };
        if !cached.is_expired() {
            debug!("Using cached Google Drive tokens");
            return Some(cached);
        }

        let refresh_token = cached.refresh_token?;
        match self.adapter().refresh(discovery, &refresh_token).await {
            Ok(tokens) => {
                self.store_tokens(&tokens);
                Some(tokens)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Refreshing cached tokens failed");
                None
            }
        }
    }

    fn store_tokens(&self, tokens: &Tokens) {
        if let Err(e) = self.token_cache.store(tokens) {
            warn!(error = %format!("{e:#}"), "Could not cache tokens");
        }
    }

    /// Installs tokens and schedules their silent renewal
    fn install(&self, tokens: Tokens, discovery: Arc<DiscoveryDocument>) {
        let lifetime = tokens.remaining();
        let renewable = tokens.refresh_token.is_some();
        self.session.set_tokens(Some(tokens));
        if !renewable {
            self.session.renewal.cancel();
            return;
        }

        let session: Weak<Session> = Arc::downgrade(&self.session);
        let adapter = self.adapter();
        let cache = self.token_cache.clone();
        self.session.renewal.schedule(lifetime, move || {
            let session = session.clone();
            let adapter = adapter.clone();
            let cache = cache.clone();
            let discovery = discovery.clone();
            async move {
                let session = session.upgrade()?;
                let refresh_token = session.refresh_token()?;
                let _ = session.gate.begin();
                match adapter.refresh(&discovery, &refresh_token).await {
                    Ok(tokens) => {
                        if let Err(e) = cache.store(&tokens) {
                            warn!(error = %format!("{e:#}"), "Could not cache renewed tokens");
                        }
                        let next = tokens.remaining();
                        session.set_tokens(Some(tokens));
                        let _ = session.gate.succeed();
                        info!("Renewed Google Drive access token");
                        Some(next)
                    }
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "Silent token renewal failed");
                        session.set_tokens(None);
                        let _ = session.gate.fail();
                        None
                    }
                }
            }
        });
    }

    fn metadata_for(&self, file: &DriveFile, parent: Option<Arc<CloudMetadata>>) -> ProviderResult<CloudMetadata> {
        let kind = if file.is_folder() {
            CloudMetadataKind::Folder
        } else {
            CloudMetadataKind::File
        };
        let mut metadata = CloudMetadata::new(&file.name, kind)?
            .with_provider(self.name.clone())
            .with_parent(parent)
            .with_provider_data(json!({ "id": file.id }));
        if let Some(mime_type) = &file.mime_type {
            metadata = metadata.with_mime_type(mime_type);
        }
        Ok(metadata)
    }

    fn id_of(metadata: &CloudMetadata) -> ProviderResult<&str> {
        metadata
            .provider_data_str("id")
            .ok_or_else(|| ProviderError::NotFound(metadata.name().to_string()))
    }
}

#[async_trait::async_trait]
impl ICloudProvider for GoogleDriveProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn url_display_name(&self) -> Option<&str> {
        self.url_display_name.as_deref()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn can_open_saved(&self) -> bool {
        true
    }

    fn requires_authorization(&self) -> bool {
        true
    }

    fn authorization_prompt(&self) -> AuthorizationPrompt {
        AuthorizationPrompt {
            message: format!(
                "Sign in to {} to browse, open and save your documents.",
                self.display_name
            ),
            button_label: "Sign in with Google".to_string(),
        }
    }

    async fn authorized(&self) -> bool {
        self.session.valid_access_token().is_some()
    }

    async fn authorize(&self, immediate: bool) -> ProviderResult<bool> {
        let discovery = self.discovery().await?;
        if self.session.valid_access_token().is_some() {
            return Ok(true);
        }

        if self.session.gate.begin().is_err() {
            debug!("Authorization already in progress");
        }

        if let Some(tokens) = self.cached_tokens(&discovery).await {
            self.install(tokens, discovery);
            let _ = self.session.gate.succeed();
            return Ok(true);
        }

        if immediate {
            debug!("No usable cached tokens for silent authorization");
            let _ = self.session.gate.fail();
            return Ok(false);
        }

        match self.adapter().login(&discovery).await {
            Ok(tokens) => {
                self.store_tokens(&tokens);
                self.install(tokens, discovery);
                let _ = self.session.gate.succeed();
                info!("Authorized Google Drive");
                Ok(true)
            }
            Err(e) => {
                let _ = self.session.gate.fail();
                Err(ProviderError::NotAuthorized(format!("{e:#}")))
            }
        }
    }

    async fn save(&self, content: &CloudContent, metadata: &mut CloudMetadata) -> ProviderResult<()> {
        if !self.can(Capability::Save) {
            return Err(ProviderError::unsupported(&self.name, Capability::Save));
        }
        let client = self.client()?;
        let mime_type = metadata
            .mime_type()
            .unwrap_or(self.mime_type.as_str())
            .to_string();
        let body = content.to_json_string();

        let existing = metadata
            .belongs_to(&self.name)
            .then(|| metadata.provider_data_str("id"))
            .flatten()
            .map(str::to_string);
        let file = match existing {
            Some(id) => {
                client
                    .update(&id, &json!({ "name": metadata.name() }), &mime_type, body.as_bytes())
                    .await?
            }
            None => {
                let parent_id = metadata
                    .parent()
                    .and_then(|p| p.provider_data_str("id"))
                    .unwrap_or(ROOT_FOLDER_ID);
                let file_metadata = json!({
                    "name": metadata.name(),
                    "mimeType": mime_type,
                    "parents": [parent_id],
                });
                client.create(&file_metadata, &mime_type, body.as_bytes()).await?
            }
        };

        metadata.bind_provider(self.name.clone());
        metadata.set_provider_data(json!({ "id": file.id }));
        metadata.set_mime_type(Some(mime_type));
        info!(id = %file.id, name = %file.name, bytes = body.len(), "Saved to Google Drive");
        Ok(())
    }

    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent> {
        let id = Self::id_of(metadata)?;
        let text = self.client()?.download(id).await?;
        Ok(CloudContent::parse(&text))
    }

    async fn list(
        &self,
        folder: Option<&CloudMetadata>,
        options: &ListOptions,
    ) -> ProviderResult<Vec<CloudMetadata>> {
        let client = self.client()?;
        let folder_id = folder
            .and_then(|f| f.provider_data_str("id"))
            .unwrap_or(ROOT_FOLDER_ID);
        let parent = folder.map(|f| Arc::new(f.clone()));

        let mut entries = Vec::new();
        for file in client.list_folder(folder_id).await? {
            match self.metadata_for(&file, parent.clone()) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!(id = %file.id, error = %e, "Skipping unnamed Drive entry"),
            }
        }
        entries.retain(|e| options.accepts(e));
        sort_by_name(&mut entries);
        debug!(folder_id, count = entries.len(), "Listed Google Drive");
        Ok(entries)
    }

    async fn remove(&self, metadata: &CloudMetadata) -> ProviderResult<()> {
        let id = Self::id_of(metadata)?;
        self.client()?.delete(id).await?;
        info!(id, "Removed from Google Drive");
        Ok(())
    }

    async fn rename(&self, metadata: &mut CloudMetadata, new_name: &str) -> ProviderResult<()> {
        let id = Self::id_of(metadata)?.to_string();
        let mut renamed = metadata.clone();
        renamed.rename(new_name)?;
        self.client()?.rename(&id, renamed.name()).await?;
        info!(id = %id, to = %renamed.name(), "Renamed in Google Drive");
        *metadata = renamed;
        Ok(())
    }

    async fn close(&self, _metadata: &CloudMetadata) -> ProviderResult<()> {
        Ok(())
    }

    fn open_saved_id(&self, metadata: &CloudMetadata) -> Option<String> {
        metadata.provider_data_str("id").map(str::to_string)
    }

    async fn open_saved(&self, id: &str) -> ProviderResult<CloudMetadata> {
        let file = self.client()?.get_file(id).await?;
        self.metadata_for(&file, None)
    }
}
