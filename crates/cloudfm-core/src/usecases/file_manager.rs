//! Cloud file manager workflow
//!
//! Host-facing coordinator for the current document: it remembers which
//! metadata the document was last saved to or opened from, routes save /
//! open / rename / remove / close to the owning provider, keeps the host's
//! addressable URL fragment in sync, and builds the tabbed dialogs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::file_dialog::{DialogAction, DialogError, FileDialogTab};
use super::provider_registry::{well_known, ProviderRegistry};
use super::tabbed_dialog::TabbedDialog;
use crate::config::AppConfig;
use crate::domain::metadata::{extension_of, matches_extension, strip_extension};
use crate::domain::{
    Capability, CloudContent, CloudContentFactory, CloudMetadata, EnvelopeMetadata,
    OpenSavedFragment, RawContent,
};
use crate::ports::{ICloudProvider, IHostClient, ProviderError};

/// Result of [`CloudFileManager::save`]
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Saved in place to the current location
    Saved(CloudMetadata),
    /// No resavable location; the host should show the save dialog
    NeedsDialog,
}

/// Options the manager needs from the host application
#[derive(Debug, Clone)]
pub struct FileManagerOptions {
    pub envelope: EnvelopeMetadata,
    pub wrap_file_content: bool,
    pub default_extension: Option<String>,
    pub readable_extensions: Vec<String>,
}

impl FileManagerOptions {
    pub fn from_app_config(app: &AppConfig, envelope: EnvelopeMetadata) -> Self {
        Self {
            envelope,
            wrap_file_content: app.wrap_file_content,
            default_extension: Some(app.default_extension.clone()).filter(|e| !e.is_empty()),
            readable_extensions: app.readable_extensions.clone(),
        }
    }
}

/// Coordinates the current document across providers
pub struct CloudFileManager {
    registry: Arc<ProviderRegistry>,
    host: Arc<dyn IHostClient>,
    factory: CloudContentFactory,
    options: FileManagerOptions,
    metadata: Option<CloudMetadata>,
    dirty: bool,
    status: Option<String>,
    last_saved: Option<DateTime<Utc>>,
}

impl CloudFileManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        host: Arc<dyn IHostClient>,
        options: FileManagerOptions,
    ) -> Self {
        let factory = CloudContentFactory::new(options.envelope.clone(), options.wrap_file_content);
        Self {
            registry,
            host,
            factory,
            options,
            metadata: None,
            dirty: false,
            status: None,
            last_saved: None,
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn factory(&self) -> &CloudContentFactory {
        &self.factory
    }

    /// Where the current document lives, if anywhere
    pub fn metadata(&self) -> Option<&CloudMetadata> {
        self.metadata.as_ref()
    }

    /// Document title: the name without a readable extension
    pub fn title(&self) -> Option<String> {
        let name = self.metadata.as_ref()?.name();
        let known = extension_of(name).is_some_and(|ext| {
            self.options
                .default_extension
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(ext))
                || (!self.options.readable_extensions.is_empty()
                    && matches_extension(name, &self.options.readable_extensions))
        });
        let title = if known { strip_extension(name) } else { name };
        Some(title.to_string())
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    fn provider_for(&self, metadata: &CloudMetadata) -> Result<Arc<dyn ICloudProvider>, DialogError> {
        let name = metadata
            .provider()
            .ok_or_else(|| DialogError::UnknownProvider(metadata.name().to_string()))?;
        self.registry
            .get(name)
            .ok_or_else(|| DialogError::UnknownProvider(name.to_string()))
    }

    fn require(provider: &dyn ICloudProvider, capability: Capability) -> Result<(), DialogError> {
        if provider.can(capability) {
            Ok(())
        } else {
            Err(ProviderError::unsupported(provider.name(), capability).into())
        }
    }

    /// Points the host URL at the current document, or clears it
    fn update_fragment(&self, provider: &dyn ICloudProvider, metadata: &CloudMetadata) {
        let fragment = provider
            .can_open_saved()
            .then(|| provider.open_saved_id(metadata))
            .flatten()
            .map(|id| OpenSavedFragment::new(provider.name().clone(), id).to_string());
        self.host.set_url_fragment(fragment.as_deref());
    }

    fn fail<T>(&mut self, prefix: &str, err: DialogError) -> Result<T, DialogError> {
        warn!(error = %err, "{prefix}");
        self.status = Some(format!("{prefix}: {err}"));
        Err(err)
    }

    // ------------------------------------------------------------------
    // Workflow
    // ------------------------------------------------------------------

    /// Starts an unsaved document
    pub fn new_file(&mut self) {
        self.metadata = None;
        self.dirty = false;
        self.status = None;
        self.last_saved = None;
        self.host.set_url_fragment(None);
    }

    /// Saves to the current location when its provider can resave
    pub async fn save(&mut self, content: impl Into<RawContent>) -> Result<SaveOutcome, DialogError> {
        let Some(metadata) = self.metadata.clone() else {
            return Ok(SaveOutcome::NeedsDialog);
        };
        match self.provider_for(&metadata) {
            Ok(provider) if provider.can(Capability::Resave) => {
                let saved = self.save_as(metadata, content).await?;
                Ok(SaveOutcome::Saved(saved))
            }
            _ => Ok(SaveOutcome::NeedsDialog),
        }
    }

    /// Saves to `metadata` and makes it the current location
    pub async fn save_as(
        &mut self,
        metadata: CloudMetadata,
        content: impl Into<RawContent>,
    ) -> Result<CloudMetadata, DialogError> {
        let provider = match self.provider_for(&metadata) {
            Ok(p) => p,
            Err(e) => return self.fail("Unable to save", e),
        };
        if let Err(e) = Self::require(provider.as_ref(), Capability::Save) {
            return self.fail("Unable to save", e);
        }

        let content = self.factory.create_enveloped(content);
        let mut metadata = metadata;
        if let Err(e) = provider.save(&content, &mut metadata).await {
            return self.fail("Unable to save", e.into());
        }

        info!(
            provider = %provider.name(),
            name = metadata.name(),
            "Saved document"
        );
        self.update_fragment(provider.as_ref(), &metadata);
        self.status = Some(format!("All changes saved to {}", provider.display_name()));
        self.dirty = false;
        self.last_saved = Some(Utc::now());
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Writes a copy without changing the current location
    pub async fn export(
        &mut self,
        metadata: CloudMetadata,
        content: impl Into<RawContent>,
    ) -> Result<CloudMetadata, DialogError> {
        let provider = self.provider_for(&metadata)?;
        Self::require(provider.as_ref(), Capability::Export)?;

        let content = self.factory.create_enveloped(content);
        let mut metadata = metadata;
        if let Err(e) = provider.save(&content, &mut metadata).await {
            return self.fail("Unable to export", e.into());
        }
        info!(provider = %provider.name(), name = metadata.name(), "Exported document");
        self.status = Some(format!("Exported to {}", provider.display_name()));
        Ok(metadata)
    }

    /// Loads `metadata` and makes it the current document
    pub async fn open(&mut self, metadata: CloudMetadata) -> Result<CloudContent, DialogError> {
        let provider = match self.provider_for(&metadata) {
            Ok(p) => p,
            Err(e) => return self.fail("Unable to open", e),
        };
        if let Err(e) = Self::require(provider.as_ref(), Capability::Load) {
            return self.fail("Unable to open", e);
        }

        let content = match provider.load(&metadata).await {
            Ok(content) => content,
            Err(e) => return self.fail("Unable to open", e.into()),
        };

        info!(provider = %provider.name(), name = metadata.name(), "Opened document");
        self.update_fragment(provider.as_ref(), &metadata);
        self.metadata = Some(metadata);
        self.dirty = false;
        self.status = None;
        Ok(content)
    }

    /// Reopens the document a `#file=<provider>:<id>` fragment points at
    pub async fn open_saved(&mut self, fragment: &str) -> Result<CloudContent, DialogError> {
        let fragment = OpenSavedFragment::parse(fragment)?;
        let provider = self
            .registry
            .get(fragment.provider())
            .ok_or_else(|| DialogError::UnknownProvider(fragment.provider().to_string()))?;
        if !provider.can_open_saved() {
            return Err(ProviderError::unsupported(provider.name(), Capability::Load).into());
        }
        let metadata = provider.open_saved(fragment.id()).await?;
        self.open(metadata).await
    }

    /// Imports a document from a URL through the URL provider
    pub async fn import_url(&mut self, url: &str) -> Result<CloudContent, DialogError> {
        let provider = self
            .registry
            .by_str(well_known::URL)
            .ok_or_else(|| DialogError::UnknownProvider(well_known::URL.to_string()))?;
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(url);
        let name = urlencoding::decode(name)
            .map(|n| n.into_owned())
            .unwrap_or_else(|_| name.to_string());
        let metadata = CloudMetadata::new_file(name)?
            .with_provider(provider.name().clone())
            .with_url(url)
            .with_provider_data(json!({ "url": url }));
        self.open(metadata).await
    }

    /// Renames the current document
    ///
    /// Providers that can rename do so in the backend; otherwise only the
    /// local name changes and the document becomes dirty.
    pub async fn rename(&mut self, new_name: &str) -> Result<(), DialogError> {
        let mut metadata = self.metadata.clone().ok_or(DialogError::NoDocument)?;
        let provider = self.provider_for(&metadata).ok();

        match provider {
            Some(provider) if provider.can(Capability::Rename) => {
                if let Err(e) = provider.rename(&mut metadata, new_name).await {
                    return self.fail("Unable to rename", e.into());
                }
                self.update_fragment(provider.as_ref(), &metadata);
                info!(provider = %provider.name(), name = metadata.name(), "Renamed document");
            }
            _ => {
                metadata.rename(new_name)?;
                self.dirty = true;
            }
        }
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Deletes the current document after confirmation
    pub async fn remove(&mut self) -> Result<bool, DialogError> {
        let metadata = self.metadata.clone().ok_or(DialogError::NoDocument)?;
        let provider = self.provider_for(&metadata)?;
        Self::require(provider.as_ref(), Capability::Remove)?;

        let question = format!("Are you sure you want to delete {}?", metadata.name());
        if !self.host.confirm(&question).await {
            return Ok(false);
        }
        if let Err(e) = provider.remove(&metadata).await {
            return self.fail("Unable to delete", e.into());
        }
        info!(provider = %provider.name(), name = metadata.name(), "Removed document");
        self.new_file();
        Ok(true)
    }

    /// Closes the current document, releasing it in the provider if needed
    pub async fn close(&mut self) -> Result<(), DialogError> {
        if let Some(metadata) = self.metadata.clone() {
            if let Ok(provider) = self.provider_for(&metadata) {
                if provider.can(Capability::Close) {
                    provider.close(&metadata).await?;
                }
            }
        }
        self.new_file();
        Ok(())
    }

    /// Builds the tabbed dialog for `action`, scoped to the current document
    pub fn dialog(&self, action: DialogAction) -> TabbedDialog<FileDialogTab> {
        TabbedDialog::for_action(
            &self.registry,
            self.host.clone(),
            action,
            &self.options.readable_extensions,
            self.metadata.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Capabilities, ProviderName};
    use crate::usecases::test_support::{MockHost, MockProvider};

    fn options() -> FileManagerOptions {
        FileManagerOptions {
            envelope: EnvelopeMetadata {
                cfm_version: "test".into(),
                app_name: Some("Demo".into()),
                app_version: None,
                app_build_num: None,
            },
            wrap_file_content: true,
            default_extension: Some("txt".into()),
            readable_extensions: vec!["txt".into()],
        }
    }

    struct Fixture {
        manager: CloudFileManager,
        storage: Arc<MockProvider>,
        file: Arc<MockProvider>,
        host: Arc<MockHost>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MockProvider::new("localStorage", "Local Storage"));
        let file = Arc::new(
            MockProvider::new("localFile", "Local File")
                .with_capabilities(
                    Capabilities::none()
                        .with(Capability::Save)
                        .with(Capability::Export)
                        .with(Capability::Load),
                )
                .without_open_saved(),
        );
        let url = Arc::new(
            MockProvider::new("url", "URL")
                .with_capabilities(Capabilities::none().with(Capability::Load)),
        );
        let mut registry = ProviderRegistry::new();
        registry.register(storage.clone()).unwrap();
        registry.register(file.clone()).unwrap();
        registry.register(url).unwrap();

        let host = Arc::new(MockHost::new());
        let manager = CloudFileManager::new(Arc::new(registry), host.clone(), options());
        Fixture {
            manager,
            storage,
            file,
            host,
        }
    }

    async fn save_through_dialog(
        manager: &mut CloudFileManager,
        tab_index: usize,
        title: &str,
        text: &str,
    ) -> Result<CloudMetadata, DialogError> {
        let mut dialog = manager.dialog(DialogAction::Save);
        dialog.select_tab(tab_index).await;
        let tab = dialog.selected_tab_mut().unwrap();
        tab.set_filename(title);
        let metadata = tab.confirm().await?;
        dialog.close();
        manager.save_as(metadata, text).await
    }

    #[tokio::test]
    async fn test_local_storage_save_and_restore() {
        let Fixture {
            mut manager, host, ..
        } = fixture();

        save_through_dialog(&mut manager, 0, "saved document", "Save and restore me")
            .await
            .unwrap();

        let fragment = host.fragment().unwrap();
        assert!(fragment.contains("#file=localStorage:saved%20document"));
        assert!(manager
            .status()
            .unwrap()
            .contains("All changes saved to Local Storage"));
        assert!(!manager.is_dirty());
        assert!(manager.last_saved().is_some());

        // Reload: a fresh manager reopens from the fragment.
        manager.new_file();
        assert!(host.fragment().is_none());
        let content = manager.open_saved(&fragment).await.unwrap();
        assert_eq!(content.text(), "Save and restore me");
        assert_eq!(manager.title().as_deref(), Some("saved document"));
    }

    #[tokio::test]
    async fn test_local_file_save_has_no_fragment() {
        let Fixture {
            mut manager,
            host,
            file,
            ..
        } = fixture();
        host.set_url_fragment(Some("#file=localStorage:old"));

        save_through_dialog(&mut manager, 1, "Local_File_Save.txt", "saving to Local File")
            .await
            .unwrap();
        assert!(host.fragment().is_none());
        assert!(manager
            .status()
            .unwrap()
            .contains("All changes saved to Local File"));

        let stored = file.stored("Local_File_Save.txt").unwrap();
        let reopened = CloudMetadata::new_file("Local_File_Save.txt")
            .unwrap()
            .with_provider(ProviderName::new("localFile").unwrap());
        manager.new_file();
        let content = manager.open(reopened).await.unwrap();
        assert_eq!(content.text(), "saving to Local File");
        assert!(stored.contains("saving to Local File"));
        assert_eq!(manager.title().as_deref(), Some("Local_File_Save"));
        assert!(host.fragment().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_prompt_precedes_provider_save() {
        let Fixture {
            mut manager,
            host,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "notes", "first").await.unwrap();
        let saves_before = storage
            .calls()
            .iter()
            .filter(|c| c.starts_with("save"))
            .count();

        host.answer_confirms(false);
        let err = save_through_dialog(&mut manager, 0, "notes", "second")
            .await
            .unwrap_err();
        assert_eq!(err, DialogError::Cancelled);
        assert_eq!(
            host.confirms(),
            vec!["Are you sure you want to overwrite notes?".to_string()]
        );
        let saves_after = storage
            .calls()
            .iter()
            .filter(|c| c.starts_with("save"))
            .count();
        assert_eq!(saves_before, saves_after);
        assert!(storage.stored("notes").unwrap().contains("first"));
    }

    #[tokio::test]
    async fn test_save_resaves_in_place_or_asks_for_dialog() {
        let Fixture { mut manager, .. } = fixture();
        assert_eq!(manager.save("x").await.unwrap(), SaveOutcome::NeedsDialog);

        save_through_dialog(&mut manager, 0, "draft", "v1").await.unwrap();
        manager.mark_dirty();
        match manager.save("v2").await.unwrap() {
            SaveOutcome::Saved(meta) => assert_eq!(meta.name(), "draft"),
            other => panic!("expected in-place save, got {other:?}"),
        }
        assert!(!manager.is_dirty());

        // Local File cannot resave.
        save_through_dialog(&mut manager, 1, "copy", "v3").await.unwrap();
        assert_eq!(manager.save("v4").await.unwrap(), SaveOutcome::NeedsDialog);
    }

    #[tokio::test]
    async fn test_saved_content_is_enveloped() {
        let Fixture {
            mut manager,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "doc", "body").await.unwrap();
        let stored: serde_json::Value =
            serde_json::from_str(&storage.stored("doc").unwrap()).unwrap();
        assert_eq!(stored["content"], "body");
        assert_eq!(stored["appName"], "Demo");
    }

    #[tokio::test]
    async fn test_failed_save_reports_status_and_keeps_document() {
        let Fixture {
            mut manager,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "doc", "v1").await.unwrap();
        manager.mark_dirty();

        storage.fail_next(ProviderError::QuotaExceeded("5 MiB".into()));
        let err = manager.save("v2").await.unwrap_err();
        assert!(matches!(
            err,
            DialogError::Provider(ProviderError::QuotaExceeded(_))
        ));
        assert_eq!(
            manager.status(),
            Some("Unable to save: Storage quota exceeded: 5 MiB")
        );
        assert!(manager.is_dirty());
        assert_eq!(manager.metadata().unwrap().name(), "doc");
    }

    #[tokio::test]
    async fn test_rename_through_provider_updates_fragment() {
        let Fixture {
            mut manager,
            host,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "old name", "x").await.unwrap();

        manager.rename("new name").await.unwrap();
        assert_eq!(manager.metadata().unwrap().name(), "new name");
        assert!(storage.stored("new name").is_some());
        assert!(storage.stored("old name").is_none());
        assert_eq!(
            host.fragment().as_deref(),
            Some("#file=localStorage:new%20name")
        );
    }

    #[tokio::test]
    async fn test_rename_without_capability_is_local() {
        let Fixture {
            mut manager, file, ..
        } = fixture();
        save_through_dialog(&mut manager, 1, "a.txt", "x").await.unwrap();

        manager.rename("b.txt").await.unwrap();
        assert_eq!(manager.metadata().unwrap().name(), "b.txt");
        assert!(manager.is_dirty());
        assert!(!file.calls().iter().any(|c| c.starts_with("rename")));
    }

    #[tokio::test]
    async fn test_remove_confirms_then_resets() {
        let Fixture {
            mut manager,
            host,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "trash", "x").await.unwrap();

        assert!(manager.remove().await.unwrap());
        assert!(host
            .confirms()
            .contains(&"Are you sure you want to delete trash?".to_string()));
        assert!(storage.stored("trash").is_none());
        assert!(manager.metadata().is_none());
        assert!(host.fragment().is_none());
    }

    #[tokio::test]
    async fn test_remove_without_document() {
        let Fixture { mut manager, .. } = fixture();
        assert_eq!(manager.remove().await.unwrap_err(), DialogError::NoDocument);
    }

    #[tokio::test]
    async fn test_close_releases_document() {
        let Fixture {
            mut manager,
            storage,
            ..
        } = fixture();
        save_through_dialog(&mut manager, 0, "doc", "x").await.unwrap();
        manager.close().await.unwrap();
        assert!(storage.calls().contains(&"close:doc".to_string()));
        assert!(manager.metadata().is_none());
    }

    #[tokio::test]
    async fn test_import_url_opens_through_url_provider() {
        let url = "https://example.com/docs/shared%20plan.txt";
        let url_provider = Arc::new(
            MockProvider::new("url", "URL")
                .with_capabilities(Capabilities::none().with(Capability::Load))
                .without_open_saved()
                .with_file("shared plan.txt", "imported text"),
        );
        let mut registry = ProviderRegistry::new();
        registry.register(url_provider.clone()).unwrap();
        let host = Arc::new(MockHost::new());
        let mut manager = CloudFileManager::new(Arc::new(registry), host.clone(), options());

        let content = manager.import_url(url).await.unwrap();
        assert_eq!(content.text(), "imported text");
        assert_eq!(manager.title().as_deref(), Some("shared plan"));
        assert_eq!(manager.metadata().unwrap().url(), Some(url));
        assert!(host.fragment().is_none());

        // Imported documents cannot be resaved where they came from.
        assert_eq!(manager.save("edit").await.unwrap(), SaveOutcome::NeedsDialog);
    }

    #[tokio::test]
    async fn test_import_url_failure_sets_status() {
        let Fixture { mut manager, .. } = fixture();
        let err = manager
            .import_url("https://example.com/missing.txt")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing.txt not found");
        assert_eq!(
            manager.status(),
            Some("Unable to open: missing.txt not found")
        );
    }

    #[tokio::test]
    async fn test_open_saved_rejects_bad_fragment_and_unknown_provider() {
        let Fixture { mut manager, .. } = fixture();
        assert!(matches!(
            manager.open_saved("#nothing").await.unwrap_err(),
            DialogError::Domain(_)
        ));
        assert_eq!(
            manager.open_saved("#file=dropbox:x").await.unwrap_err(),
            DialogError::UnknownProvider("dropbox".into())
        );
        assert!(matches!(
            manager.open_saved("#file=localFile:x").await.unwrap_err(),
            DialogError::Provider(ProviderError::Unsupported { .. })
        ));
    }
}
