//! Cloud provider port (driven/secondary port)
//!
//! This module defines the uniform contract every storage backend exposes:
//! capability negotiation, authorization, and the save / load / list /
//! remove / rename / close operations the dialogs drive.
//!
//! ## Design Notes
//!
//! - Uses a typed [`ProviderError`] instead of `anyhow` so dialogs can show a
//!   single human-readable message without inspecting backend error shapes.
//! - Optional operations have default bodies returning
//!   [`ProviderError::Unsupported`]; a provider only overrides what its
//!   [`Capabilities`] declare.
//! - Uses `#[async_trait]` for async trait methods.

use thiserror::Error;

use crate::domain::{
    Capabilities, Capability, CloudContent, CloudMetadata, DomainError, ProviderName,
};

// ============================================================================
// ProviderError
// ============================================================================

/// Errors reported by provider operations
///
/// Each variant displays as one string suitable for inline dialog status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider does not declare the capability
    #[error("{provider} does not support {capability}")]
    Unsupported {
        provider: String,
        capability: Capability,
    },

    /// Credentials are missing or were rejected
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// The referenced file or folder does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The backend refused the write for lack of space
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The backend API rejected the request (decoded message)
    #[error("{0}")]
    Api(String),

    /// Local I/O or transport failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The metadata or content is not usable by this provider
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// Required provider configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Shorthand for an [`ProviderError::Unsupported`] error
    pub fn unsupported(provider: &ProviderName, capability: Capability) -> Self {
        ProviderError::Unsupported {
            provider: provider.to_string(),
            capability,
        }
    }
}

impl From<DomainError> for ProviderError {
    fn from(e: DomainError) -> Self {
        ProviderError::InvalidContent(e.to_string())
    }
}

/// Result alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// ListOptions
// ============================================================================

/// Filters applied by [`ICloudProvider::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only files with one of these extensions (folders always pass)
    pub extensions: Vec<String>,
    /// Only files with this MIME type (folders always pass)
    pub mime_type: Option<String>,
}

impl ListOptions {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            mime_type: None,
        }
    }

    /// Whether a listed entry passes the filters
    pub fn accepts(&self, entry: &CloudMetadata) -> bool {
        if !entry.is_file() {
            return true;
        }
        let ext_ok = crate::domain::metadata::matches_extension(entry.name(), &self.extensions);
        let mime_ok = match (&self.mime_type, entry.mime_type()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        };
        ext_ok && mime_ok
    }
}

// ============================================================================
// AuthorizationPrompt
// ============================================================================

/// What a dialog tab shows in place of the file browser while the provider
/// is not authorized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPrompt {
    /// Explanatory text
    pub message: String,
    /// Label of the button that calls `authorize(false)`
    pub button_label: String,
}

impl AuthorizationPrompt {
    /// The generic prompt used unless a provider supplies its own
    pub fn generic(display_name: &str) -> Self {
        Self {
            message: format!("Please authorize {display_name} to continue."),
            button_label: "Authorize".to_string(),
        }
    }
}

// ============================================================================
// ICloudProvider
// ============================================================================

/// Port trait implemented by every storage backend
///
/// ## Implementation Notes
///
/// - `list` must return entries sorted case-insensitively by name.
/// - `save` must not leave a partial write visible on failure, and updates
///   the metadata's provider data with the id the backend assigned.
/// - Providers that need no authorization keep the default `authorized`
///   and `authorize` bodies, which report `true` immediately.
#[async_trait::async_trait]
pub trait ICloudProvider: Send + Sync {
    /// Machine name used in fragments and metadata binding
    fn name(&self) -> &ProviderName;

    /// Human-readable name shown on tabs and in status text
    fn display_name(&self) -> &str;

    /// Name shown in URLs or sharing UI, if different from `display_name`
    fn url_display_name(&self) -> Option<&str> {
        None
    }

    /// The capabilities this provider declares
    fn capabilities(&self) -> Capabilities;

    /// Whether `capability` is declared
    fn can(&self, capability: Capability) -> bool {
        self.capabilities().has(capability)
    }

    /// Whether a saved document can be reopened from an addressable fragment
    fn can_open_saved(&self) -> bool {
        false
    }

    /// Whether operations need a prior `authorize` round-trip
    fn requires_authorization(&self) -> bool {
        false
    }

    /// Whether `capability` may be used inside `folder` (`None` = root)
    fn can_use_in(&self, capability: Capability, _folder: Option<&CloudMetadata>) -> bool {
        self.can(capability)
    }

    /// Whether a new file may be saved inside `folder` (`None` = root)
    fn can_save_in(&self, folder: Option<&CloudMetadata>) -> bool {
        self.can_use_in(Capability::Save, folder)
    }

    /// Prompt shown while unauthorized
    fn authorization_prompt(&self) -> AuthorizationPrompt {
        AuthorizationPrompt::generic(self.display_name())
    }

    /// Reports whether valid credentials are currently held
    async fn authorized(&self) -> bool {
        true
    }

    /// (Re-)authenticates; `immediate` restricts to silent/cached credentials
    async fn authorize(&self, _immediate: bool) -> ProviderResult<bool> {
        Ok(true)
    }

    /// Persists `content` at the location `metadata` describes
    async fn save(&self, content: &CloudContent, metadata: &mut CloudMetadata)
        -> ProviderResult<()>;

    /// Retrieves the content `metadata` refers to
    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent>;

    /// Enumerates the entries of `folder` (`None` = root)
    async fn list(
        &self,
        _folder: Option<&CloudMetadata>,
        _options: &ListOptions,
    ) -> ProviderResult<Vec<CloudMetadata>> {
        Err(ProviderError::unsupported(self.name(), Capability::List))
    }

    /// Deletes the entry
    async fn remove(&self, _metadata: &CloudMetadata) -> ProviderResult<()> {
        Err(ProviderError::unsupported(self.name(), Capability::Remove))
    }

    /// Renames the entry in the backend and then in `metadata`
    async fn rename(&self, _metadata: &mut CloudMetadata, _new_name: &str) -> ProviderResult<()> {
        Err(ProviderError::unsupported(self.name(), Capability::Rename))
    }

    /// Releases whatever the provider holds for an open document
    async fn close(&self, _metadata: &CloudMetadata) -> ProviderResult<()> {
        Err(ProviderError::unsupported(self.name(), Capability::Close))
    }

    /// Identifier to put in the `#file=` fragment after a save
    fn open_saved_id(&self, _metadata: &CloudMetadata) -> Option<String> {
        None
    }

    /// Rebuilds metadata from a fragment identifier
    async fn open_saved(&self, id: &str) -> ProviderResult<CloudMetadata> {
        Err(ProviderError::NotFound(id.to_string()))
    }
}
