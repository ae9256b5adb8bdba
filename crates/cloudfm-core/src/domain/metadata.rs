//! CloudMetadata domain entity
//!
//! `CloudMetadata` describes one file, folder or label independently of the
//! backend that stores it. Providers create instances while listing, dialogs
//! create them when the user names a new file, and both mutate them in place
//! on rename and on a successful save.
//!
//! ## Hierarchy
//!
//! ```text
//!   (root)                      parent: None
//!     └── Documents   Folder    parent: None
//!           └── notes  File     parent: Some(Documents)
//! ```
//!
//! A child holds a shared snapshot of its parent folder; parents never hold
//! their children, so the hierarchy cannot form cycles.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ProviderName;

/// Path separator used by [`CloudMetadata::path`] and stripped from names
pub const PATH_SEPARATOR: char = '/';

// ============================================================================
// CloudMetadataKind
// ============================================================================

/// Kind of entry a [`CloudMetadata`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudMetadataKind {
    /// A document that can be loaded and saved
    File,
    /// A container that can be listed
    Folder,
    /// A non-selectable display entry
    Label,
}

impl fmt::Display for CloudMetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudMetadataKind::File => write!(f, "file"),
            CloudMetadataKind::Folder => write!(f, "folder"),
            CloudMetadataKind::Label => write!(f, "label"),
        }
    }
}

// ============================================================================
// CloudMetadata
// ============================================================================

/// Backend-independent descriptor of a file, folder or label
///
/// `kind` is fixed at construction; there is no setter for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudMetadata {
    /// Display name without extension or surrounding separators
    name: String,
    /// File, folder or label; immutable
    kind: CloudMetadataKind,
    /// Owning provider, `None` until bound
    provider: Option<ProviderName>,
    /// Containing folder, `None` for entries in the root
    parent: Option<Arc<CloudMetadata>>,
    /// Opaque backend payload (object id, storage key, file path)
    #[serde(default)]
    provider_data: serde_json::Value,
    /// Whether saving over this entry is allowed without a new name
    overwritable: bool,
    /// Optional display string
    description: Option<String>,
    /// MIME type reported by the backend
    mime_type: Option<String>,
    /// Origin URL for documents imported from the web
    url: Option<String>,
}

impl CloudMetadata {
    /// Creates a new entry of the given kind
    ///
    /// Leading and trailing path separators are stripped from `name`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidName` if the name is empty after
    /// trimming whitespace and separators
    pub fn new(name: impl AsRef<str>, kind: CloudMetadataKind) -> Result<Self, DomainError> {
        Ok(Self {
            name: normalize_name(name.as_ref())?,
            kind,
            provider: None,
            parent: None,
            provider_data: serde_json::Value::Null,
            overwritable: true,
            description: None,
            mime_type: None,
            url: None,
        })
    }

    /// Creates a new file entry
    pub fn new_file(name: impl AsRef<str>) -> Result<Self, DomainError> {
        Self::new(name, CloudMetadataKind::File)
    }

    /// Creates a new folder entry
    pub fn new_folder(name: impl AsRef<str>) -> Result<Self, DomainError> {
        Self::new(name, CloudMetadataKind::Folder)
    }

    /// Creates a new label entry
    pub fn new_label(name: impl AsRef<str>) -> Result<Self, DomainError> {
        Self::new(name, CloudMetadataKind::Label)
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Binds the entry to its owning provider
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderName) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Places the entry inside `parent`
    #[must_use]
    pub fn with_parent(mut self, parent: Option<Arc<CloudMetadata>>) -> Self {
        self.parent = parent;
        self
    }

    /// Attaches the backend payload
    #[must_use]
    pub fn with_provider_data(mut self, data: serde_json::Value) -> Self {
        self.provider_data = data;
        self
    }

    /// Sets the MIME type
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Sets the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the origin URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets whether the entry may be overwritten
    #[must_use]
    pub fn with_overwritable(mut self, overwritable: bool) -> Self {
        self.overwritable = overwritable;
        self
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CloudMetadataKind {
        self.kind
    }

    pub fn provider(&self) -> Option<&ProviderName> {
        self.provider.as_ref()
    }

    pub fn parent(&self) -> Option<&Arc<CloudMetadata>> {
        self.parent.as_ref()
    }

    pub fn provider_data(&self) -> &serde_json::Value {
        &self.provider_data
    }

    pub fn overwritable(&self) -> bool {
        self.overwritable
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_file(&self) -> bool {
        self.kind == CloudMetadataKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == CloudMetadataKind::Folder
    }

    /// Returns true if this entry is bound to the named provider
    pub fn belongs_to(&self, provider: &ProviderName) -> bool {
        self.provider.as_ref() == Some(provider)
    }

    /// Looks up a string field of the provider payload
    pub fn provider_data_str(&self, key: &str) -> Option<&str> {
        self.provider_data.get(key).and_then(|v| v.as_str())
    }

    /// The name followed by `extension`, unless it already ends with it
    ///
    /// With `None` the bare name is returned.
    pub fn filename(&self, extension: Option<&str>) -> String {
        match extension {
            Some(ext) => with_extension(&self.name, ext),
            None => self.name.clone(),
        }
    }

    /// Separator-joined names from the root down to this entry
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}{}{}", parent.path(), PATH_SEPARATOR, self.name),
            None => self.name.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Renames the entry in place
    ///
    /// # Errors
    /// Returns `DomainError::InvalidName` if the new name is empty after
    /// normalization or holds a separator; the entry is left unchanged
    pub fn rename(&mut self, new_name: impl AsRef<str>) -> Result<(), DomainError> {
        self.name = validate_entry_name(new_name.as_ref())?;
        Ok(())
    }

    /// Binds the entry to its owning provider
    pub fn bind_provider(&mut self, provider: ProviderName) {
        self.provider = Some(provider);
    }

    /// Replaces the backend payload (e.g. with a newly assigned object id)
    pub fn set_provider_data(&mut self, data: serde_json::Value) {
        self.provider_data = data;
    }

    /// Updates the MIME type
    pub fn set_mime_type(&mut self, mime_type: Option<String>) {
        self.mime_type = mime_type;
    }
}

// ============================================================================
// Name and extension helpers
// ============================================================================

/// Trims whitespace and leading/trailing separators from a name
fn normalize_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim().trim_matches(PATH_SEPARATOR).trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Normalizes an extension to its bare form (`".txt"` → `"txt"`)
fn bare_extension(extension: &str) -> &str {
    extension.trim().trim_start_matches('.')
}

/// Appends `.extension` to `name` unless it already ends with it
/// (case-insensitive)
pub fn with_extension(name: &str, extension: &str) -> String {
    let ext = bare_extension(extension);
    if ext.is_empty() || extension_of(name).is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
        name.to_string()
    } else {
        format!("{name}.{ext}")
    }
}

/// The extension of `name` (without the dot), if any
///
/// Dotfiles such as `.profile` have no extension.
pub fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) if pos + 1 == name.len() => None,
        Some(pos) => Some(&name[pos + 1..]),
    }
}

/// Removes the extension from `name`, if any
pub fn strip_extension(name: &str) -> &str {
    match extension_of(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// Returns true if `name` carries one of the `readable` extensions
///
/// An empty `readable` list accepts every name. Names without an extension
/// are always accepted: Local Storage and Drive save documents under the
/// name the user typed.
pub fn matches_extension(name: &str, readable: &[String]) -> bool {
    if readable.is_empty() {
        return true;
    }
    match extension_of(name) {
        Some(ext) => readable
            .iter()
            .any(|r| bare_extension(r).eq_ignore_ascii_case(ext)),
        None => true,
    }
}

/// Checks a name typed for a single entry
///
/// Separators are only allowed at the ends (they are trimmed); an interior
/// `/` would address a nested folder.
///
/// # Errors
/// Returns `DomainError::InvalidName` if the name is empty after trimming or
/// holds a separator
pub fn validate_entry_name(name: &str) -> Result<String, DomainError> {
    let normalized = normalize_name(name)?;
    if normalized.contains(PATH_SEPARATOR) {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(normalized)
}

/// Sorts entries case-insensitively ascending by name
pub fn sort_by_name(entries: &mut [CloudMetadata]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}
