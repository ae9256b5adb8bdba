//! File dialog tab
//!
//! Headless state machine behind one provider tab of the open / save /
//! export dialog. It reconciles the filename the user types against the live
//! listing of the current folder, gates the browser behind the provider's
//! authorization, and turns a confirmation into the [`CloudMetadata`] the
//! host should save to or load from.
//!
//! ## Late results
//!
//! Listing runs in two steps so a UI can release its lock while the provider
//! works: [`FileDialogTab::begin_listing`] hands out a [`ListingRequest`]
//! stamped with the tab's current generation, and
//! [`FileDialogTab::apply_listing`] drops the result if the tab was
//! unmounted or a newer request was issued in the meantime.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::metadata::{validate_entry_name, with_extension};
use crate::domain::{
    AuthGate, AuthorizationState, Capability, CloudMetadata, CloudMetadataKind, DomainError,
};
use crate::ports::{AuthorizationPrompt, ICloudProvider, IHostClient, ListOptions, ProviderError};

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by dialog operations
///
/// These are user-input and workflow errors; provider failures are wrapped
/// so the dialog can show their message without inspecting them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The trimmed filename is empty
    #[error("Please enter a filename")]
    EmptyFilename,

    /// Opening a name that is not in the listing
    #[error("{0} not found")]
    NotFound(String),

    /// The provider does not allow the action here
    #[error("This action is not available here")]
    Disabled,

    /// The user declined a confirmation prompt
    #[error("Cancelled")]
    Cancelled,

    /// The existing entry may not be replaced
    #[error("{0} cannot be overwritten")]
    NotOverwritable(String),

    /// The metadata names a provider that is not registered
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// No document is open
    #[error("No document is open")]
    NoDocument,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

// ============================================================================
// DialogAction / TabView
// ============================================================================

/// What a dialog was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    Open,
    Save,
    /// Save a copy; the filename is forced to carry `extension`
    Export { extension: String },
}

impl DialogAction {
    /// The capability a provider needs to appear in this dialog
    pub fn capability(&self) -> Capability {
        match self {
            DialogAction::Open => Capability::Load,
            DialogAction::Save => Capability::Save,
            DialogAction::Export { .. } => Capability::Export,
        }
    }

    pub fn forced_extension(&self) -> Option<&str> {
        match self {
            DialogAction::Export { extension } => Some(extension),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DialogAction::Open)
    }

    /// Label of the confirm button
    pub fn label(&self) -> &'static str {
        match self {
            DialogAction::Open => "Open",
            DialogAction::Save => "Save",
            DialogAction::Export { .. } => "Export",
        }
    }
}

/// What the tab body renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabView {
    /// The provider's own authorization prompt
    AuthorizationPrompt(AuthorizationPrompt),
    /// The folder listing with filename box and buttons
    FileBrowser,
}

// ============================================================================
// Listing requests
// ============================================================================

/// A listing in flight, detached from the tab
pub struct ListingRequest {
    generation: u64,
    provider: Arc<dyn ICloudProvider>,
    folder: Option<Arc<CloudMetadata>>,
    options: ListOptions,
}

/// The outcome of a [`ListingRequest`], to hand back to the tab
pub struct ListingResult {
    generation: u64,
    result: Result<Vec<CloudMetadata>, ProviderError>,
}

impl ListingRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Calls the provider; never touches the tab
    pub async fn run(self) -> ListingResult {
        let result = self
            .provider
            .list(self.folder.as_deref(), &self.options)
            .await;
        ListingResult {
            generation: self.generation,
            result,
        }
    }
}

// ============================================================================
// FileDialogTab
// ============================================================================

/// One provider tab of a file dialog
pub struct FileDialogTab {
    provider: Arc<dyn ICloudProvider>,
    host: Arc<dyn IHostClient>,
    action: DialogAction,
    readable_extensions: Vec<String>,
    /// The document the dialog was opened for
    document: Option<CloudMetadata>,
    auth: AuthGate,
    folder: Option<Arc<CloudMetadata>>,
    listing: Vec<CloudMetadata>,
    selected: Option<usize>,
    filename: String,
    search: String,
    loading: bool,
    status: Option<String>,
    mounted: bool,
    generation: u64,
}

impl FileDialogTab {
    pub fn new(
        provider: Arc<dyn ICloudProvider>,
        host: Arc<dyn IHostClient>,
        action: DialogAction,
        readable_extensions: Vec<String>,
        document: Option<CloudMetadata>,
    ) -> Self {
        Self {
            provider,
            host,
            action,
            readable_extensions,
            document,
            auth: AuthGate::new(),
            folder: None,
            listing: Vec::new(),
            selected: None,
            filename: String::new(),
            search: String::new(),
            loading: false,
            status: None,
            mounted: false,
            generation: 0,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn provider(&self) -> &Arc<dyn ICloudProvider> {
        &self.provider
    }

    pub fn action(&self) -> &DialogAction {
        &self.action
    }

    pub fn folder(&self) -> Option<&Arc<CloudMetadata>> {
        self.folder.as_ref()
    }

    pub fn listing(&self) -> &[CloudMetadata] {
        &self.listing
    }

    /// Entries whose name contains the search text (case-insensitive)
    pub fn visible_entries(&self) -> Vec<&CloudMetadata> {
        let needle = self.search.trim().to_lowercase();
        self.listing
            .iter()
            .filter(|e| needle.is_empty() || e.name().to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected(&self) -> Option<&CloudMetadata> {
        self.selected.and_then(|i| self.listing.get(i))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.auth.state()
    }

    pub fn auth_gate(&self) -> &AuthGate {
        &self.auth
    }

    /// What the tab body shows right now
    pub fn view(&self) -> TabView {
        if self.provider.requires_authorization() && !self.auth.is_authorized() {
            TabView::AuthorizationPrompt(self.provider.authorization_prompt())
        } else {
            TabView::FileBrowser
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Shows the tab: picks the starting folder, re-derives authorization
    /// and lists the folder when authorized
    pub async fn mount(&mut self) {
        self.mounted = true;
        self.selected = None;
        self.status = None;

        let own_document = self
            .document
            .as_ref()
            .filter(|d| d.belongs_to(self.provider.name()));
        self.folder = own_document.and_then(|d| d.parent().cloned());
        if !self.action.is_open() {
            if let Some(document) = &self.document {
                self.filename = document.name().to_string();
            }
        }

        if self.check_authorization().await {
            self.refresh().await;
        }
    }

    /// Hides the tab; results still in flight are dropped when they land
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.loading = false;
    }

    /// Syncs the gate with the provider's current credentials
    pub async fn check_authorization(&mut self) -> bool {
        let authorized = !self.provider.requires_authorization() || self.provider.authorized().await;
        self.sync_gate(authorized);
        authorized
    }

    fn sync_gate(&self, authorized: bool) {
        match (authorized, self.auth.state()) {
            (true, AuthorizationState::Authorized) => {}
            (true, state) => {
                if state != AuthorizationState::Authorizing {
                    self.auth.reset();
                    let _ = self.auth.begin();
                }
                let _ = self.auth.succeed();
            }
            (false, _) => self.auth.reset(),
        }
    }

    /// Runs the provider's interactive authorization (the prompt's button)
    pub async fn authorize(&mut self) -> Result<bool, DialogError> {
        self.auth.begin()?;
        match self.provider.authorize(false).await {
            Ok(true) => {
                self.auth.succeed()?;
                info!(provider = %self.provider.name(), "Provider authorized");
                if self.mounted {
                    self.refresh().await;
                }
                Ok(true)
            }
            Ok(false) => {
                self.auth.fail()?;
                Ok(false)
            }
            Err(e) => {
                self.auth.fail()?;
                warn!(provider = %self.provider.name(), error = %e, "Authorization failed");
                self.status = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Starts a listing of the current folder
    ///
    /// Bumps the generation so any earlier request becomes stale.
    pub fn begin_listing(&mut self) -> ListingRequest {
        self.generation += 1;
        self.loading = true;
        let extensions = if self.action.is_open() {
            self.readable_extensions.clone()
        } else {
            Vec::new()
        };
        ListingRequest {
            generation: self.generation,
            provider: self.provider.clone(),
            folder: self.folder.clone(),
            options: ListOptions::with_extensions(extensions),
        }
    }

    /// Applies a finished listing; returns `false` when it was dropped
    pub fn apply_listing(&mut self, result: ListingResult) -> bool {
        if !self.mounted || result.generation != self.generation {
            debug!(
                provider = %self.provider.name(),
                generation = result.generation,
                current = self.generation,
                mounted = self.mounted,
                "Dropping late listing"
            );
            return false;
        }

        self.loading = false;
        match result.result {
            Ok(entries) => {
                self.listing = entries;
                self.selected = self.find_match_index();
                self.status = None;
            }
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Listing failed");
                self.listing.clear();
                self.selected = None;
                self.status = Some(format!("Unable to list files: {e}"));
            }
        }
        true
    }

    /// Lists the current folder and applies the result
    ///
    /// Providers without `list` (Local File) keep an empty browser and only
    /// take a typed filename.
    pub async fn refresh(&mut self) -> bool {
        if !self.provider.can(Capability::List) {
            self.listing.clear();
            self.selected = None;
            return false;
        }
        let request = self.begin_listing();
        let result = request.run().await;
        self.apply_listing(result)
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Clicks an entry: folders navigate, files fill the filename
    pub async fn select(&mut self, index: usize) {
        let Some(entry) = self.listing.get(index).cloned() else {
            return;
        };
        match entry.kind() {
            CloudMetadataKind::Folder => {
                self.folder = Some(Arc::new(entry));
                self.selected = None;
                self.listing.clear();
                self.refresh().await;
            }
            CloudMetadataKind::File => {
                self.selected = Some(index);
                self.filename = entry.name().to_string();
                if !self.action.is_open() {
                    self.search = entry.name().to_string();
                }
            }
            CloudMetadataKind::Label => {}
        }
    }

    /// Navigates to the parent of the current folder
    pub async fn navigate_up(&mut self) {
        let Some(folder) = self.folder.take() else {
            return;
        };
        self.folder = folder.parent().cloned();
        self.selected = None;
        self.listing.clear();
        self.refresh().await;
    }

    /// Updates the typed filename and reselects a matching file
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
        self.selected = self.find_match_index();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    // ------------------------------------------------------------------
    // Confirmation
    // ------------------------------------------------------------------

    fn trimmed_filename(&self) -> &str {
        self.filename.trim()
    }

    /// The filename after the forced export extension is applied
    fn target_filename(&self) -> String {
        let name = self.trimmed_filename();
        match self.action.forced_extension() {
            Some(ext) => with_extension(name, ext),
            None => name.to_string(),
        }
    }

    fn find_match_index(&self) -> Option<usize> {
        let name = self.trimmed_filename();
        if name.is_empty() {
            return None;
        }
        let target = self.target_filename();
        self.listing
            .iter()
            .position(|e| e.is_file() && (e.name() == name || e.name() == target))
    }

    fn action_allowed(&self) -> bool {
        let folder = self.folder.as_deref();
        match self.action {
            DialogAction::Save => self.provider.can_save_in(folder),
            _ => self.provider.can_use_in(self.action.capability(), folder),
        }
    }

    /// Whether the confirm button is disabled
    pub fn confirm_disabled(&self) -> bool {
        if self.trimmed_filename().is_empty() {
            return true;
        }
        if !self.action_allowed() {
            return true;
        }
        self.action.is_open() && self.selected.is_none() && self.find_match_index().is_none()
    }

    /// Resolves the confirmed filename into the metadata to act on
    ///
    /// Save and export ask the host before returning an existing entry.
    pub async fn confirm(&mut self) -> Result<CloudMetadata, DialogError> {
        let name = self.trimmed_filename().to_string();
        if name.is_empty() {
            return Err(DialogError::EmptyFilename);
        }
        if !self.action_allowed() {
            return Err(DialogError::Disabled);
        }

        let existing = self.find_match_index().map(|i| self.listing[i].clone());

        if self.action.is_open() {
            let entry = existing.ok_or_else(|| DialogError::NotFound(name.clone()))?;
            self.status = None;
            return Ok(entry);
        }

        match existing {
            Some(entry) => {
                if !entry.overwritable() {
                    self.host
                        .alert(&format!("{} cannot be overwritten", entry.name()), None);
                    return Err(DialogError::NotOverwritable(entry.name().to_string()));
                }
                let question = format!("Are you sure you want to overwrite {}?", entry.name());
                if !self.host.confirm(&question).await {
                    return Err(DialogError::Cancelled);
                }
                Ok(entry)
            }
            None => {
                let name = validate_entry_name(&self.target_filename())?;
                let metadata = CloudMetadata::new_file(name)?
                    .with_provider(self.provider.name().clone())
                    .with_parent(self.folder.clone());
                Ok(metadata)
            }
        }
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Deletes the selected entry after host confirmation
    ///
    /// Returns `Ok(false)` when the user declined. On success the entry is
    /// spliced out of the listing without a reload.
    pub async fn remove_selected(&mut self) -> Result<bool, DialogError> {
        let Some(entry) = self.selected().cloned() else {
            return Err(DialogError::Disabled);
        };
        if !self.provider.can_use_in(Capability::Remove, self.folder.as_deref()) {
            return Err(ProviderError::unsupported(self.provider.name(), Capability::Remove).into());
        }

        let question = format!("Are you sure you want to delete {}?", entry.name());
        if !self.host.confirm(&question).await {
            return Ok(false);
        }

        let ticket = self.generation;
        let result = self.provider.remove(&entry).await;
        if !self.mounted || ticket != self.generation {
            debug!(provider = %self.provider.name(), "Dropping late removal result");
            return result.map(|_| true).map_err(Into::into);
        }

        match result {
            Ok(()) => {
                info!(provider = %self.provider.name(), name = entry.name(), "Removed entry");
                self.listing.retain(|e| e != &entry);
                self.selected = None;
                self.filename.clear();
                Ok(true)
            }
            Err(e) => {
                self.status = Some(format!("Unable to delete {}: {e}", entry.name()));
                Err(e.into())
            }
        }
    }
}
