//! Local Storage provider
//!
//! Keeps every document under the key `cfm::<path>` in an [`IKeyValueStore`].
//! A `/` inside the path denotes folders; folders have no entry of their own
//! and exist as long as some key lies beneath them.
//!
//! ```text
//!   cfm::notes                 file "notes" in the root
//!   cfm::Projects/plan         file "plan" in folder "Projects"
//!   cfm::Projects/2026/budget  folder "2026" inside "Projects"
//! ```
//!
//! The only expected write failure is an exhausted quota, reported as
//! [`ProviderError::QuotaExceeded`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use cloudfm_core::config::LocalStorageConfig;
use cloudfm_core::domain::metadata::{sort_by_name, PATH_SEPARATOR};
use cloudfm_core::domain::{
    Capabilities, Capability, CloudContent, CloudMetadata, CloudMetadataKind, ProviderName,
};
use cloudfm_core::ports::{
    ICloudProvider, IKeyValueStore, ListOptions, ProviderError, ProviderResult, StoreError,
};
use cloudfm_core::usecases::well_known;

/// Prefix of every key this provider owns
pub const KEY_PREFIX: &str = "cfm::";

fn storage_key(path: &str) -> String {
    format!("{KEY_PREFIX}{path}")
}

fn store_error(e: StoreError) -> ProviderError {
    match e {
        StoreError::QuotaExceeded { .. } => ProviderError::QuotaExceeded(e.to_string()),
        StoreError::Backend(msg) => ProviderError::Io(msg),
    }
}

/// Provider over a string key/value store
pub struct LocalStorageProvider {
    name: ProviderName,
    display_name: String,
    url_display_name: Option<String>,
    capabilities: Capabilities,
    store: Arc<dyn IKeyValueStore>,
}

impl LocalStorageProvider {
    /// Every capability except `setFolder`
    pub fn default_capabilities() -> Capabilities {
        Capabilities::all().without(Capability::SetFolder)
    }

    pub fn new(store: Arc<dyn IKeyValueStore>) -> Self {
        Self {
            name: ProviderName::from_static(well_known::LOCAL_STORAGE),
            display_name: "Local Storage".to_string(),
            url_display_name: None,
            capabilities: Self::default_capabilities(),
            store,
        }
    }

    pub fn from_config(config: &LocalStorageConfig, store: Arc<dyn IKeyValueStore>) -> Self {
        Self {
            display_name: config.display_name.clone(),
            url_display_name: config.url_display_name.clone(),
            capabilities: Self::default_capabilities().apply(&config.capabilities),
            ..Self::new(store)
        }
    }

    /// Store path of an entry this provider listed, or of a new entry
    fn path_of(metadata: &CloudMetadata) -> String {
        metadata
            .provider_data_str("path")
            .map(str::to_string)
            .unwrap_or_else(|| metadata.path())
    }

    /// Builds metadata for `path`, including its chain of parent folders
    fn metadata_for_path(&self, path: &str, kind: CloudMetadataKind) -> ProviderResult<CloudMetadata> {
        let mut parent: Option<Arc<CloudMetadata>> = None;
        let mut prefix = String::new();
        let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let leaf = segments.pop().unwrap_or_default();
        for segment in segments {
            if !prefix.is_empty() {
                prefix.push(PATH_SEPARATOR);
            }
            prefix.push_str(segment);
            let folder = CloudMetadata::new_folder(segment)?
                .with_provider(self.name.clone())
                .with_parent(parent)
                .with_provider_data(json!({ "path": prefix }));
            parent = Some(Arc::new(folder));
        }
        Ok(CloudMetadata::new(leaf, kind)?
            .with_provider(self.name.clone())
            .with_parent(parent)
            .with_provider_data(json!({ "key": storage_key(path), "path": path })))
    }

    /// Keys at or beneath a folder path
    async fn keys_under(&self, folder_path: &str) -> ProviderResult<Vec<String>> {
        self.store
            .keys_with_prefix(&storage_key(&format!("{folder_path}{PATH_SEPARATOR}")))
            .await
            .map_err(store_error)
    }

    async fn move_key(&self, from: &str, to: &str) -> ProviderResult<()> {
        let value = self
            .store
            .get(from)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ProviderError::NotFound(from.trim_start_matches(KEY_PREFIX).to_string()))?;
        self.store.set(to, &value).await.map_err(store_error)?;
        self.store.remove(from).await.map_err(store_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ICloudProvider for LocalStorageProvider {
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

    async fn save(&self, content: &CloudContent, metadata: &mut CloudMetadata) -> ProviderResult<()> {
        if !self.can(Capability::Save) {
            return Err(ProviderError::unsupported(&self.name, Capability::Save));
        }
        let path = metadata.path();
        let key = storage_key(&path);
        let value = content.to_json_string();

        if let Err(e) = self.store.set(&key, &value).await {
            warn!(key = %key, error = %e, "Local Storage write failed");
            return Err(store_error(e));
        }

        metadata.bind_provider(self.name.clone());
        metadata.set_provider_data(json!({ "key": key, "path": path }));
        info!(key = %key, bytes = value.len(), "Saved to Local Storage");
        Ok(())
    }

    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent> {
        let key = storage_key(&Self::path_of(metadata));
        let text = self
            .store
            .get(&key)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ProviderError::NotFound(metadata.name().to_string()))?;
        debug!(key = %key, bytes = text.len(), "Loaded from Local Storage");
        Ok(CloudContent::parse(&text))
    }

    async fn list(
        &self,
        folder: Option<&CloudMetadata>,
        options: &ListOptions,
    ) -> ProviderResult<Vec<CloudMetadata>> {
        let folder_path = folder.map(Self::path_of);
        let prefix = match &folder_path {
            Some(path) => storage_key(&format!("{path}{PATH_SEPARATOR}")),
            None => KEY_PREFIX.to_string(),
        };
        let keys = self.store.keys_with_prefix(&prefix).await.map_err(store_error)?;
        let parent = folder.map(|f| Arc::new(f.clone()));

        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();
        for key in &keys {
            let rest = &key[prefix.len()..];
            let (name, kind) = match rest.split_once(PATH_SEPARATOR) {
                Some((child, _)) => {
                    if !folders.insert(child.to_string()) {
                        continue;
                    }
                    (child, CloudMetadataKind::Folder)
                }
                None => (rest, CloudMetadataKind::File),
            };
            let path = match &folder_path {
                Some(base) => format!("{base}{PATH_SEPARATOR}{name}"),
                None => name.to_string(),
            };
            let Ok(entry) = CloudMetadata::new(name, kind) else {
                debug!(key = %key, "Skipping key with empty segment");
                continue;
            };
            let data = match kind {
                CloudMetadataKind::Folder => json!({ "path": path }),
                _ => json!({ "key": storage_key(&path), "path": path }),
            };
            entries.push(
                entry
                    .with_provider(self.name.clone())
                    .with_parent(parent.clone())
                    .with_provider_data(data),
            );
        }

        entries.retain(|e| options.accepts(e));
        sort_by_name(&mut entries);
        debug!(
            folder = folder_path.as_deref().unwrap_or(""),
            count = entries.len(),
            "Listed Local Storage"
        );
        Ok(entries)
    }

    async fn remove(&self, metadata: &CloudMetadata) -> ProviderResult<()> {
        let path = Self::path_of(metadata);
        if metadata.is_folder() {
            for key in self.keys_under(&path).await? {
                self.store.remove(&key).await.map_err(store_error)?;
            }
        } else if !self
            .store
            .remove(&storage_key(&path))
            .await
            .map_err(store_error)?
        {
            return Err(ProviderError::NotFound(metadata.name().to_string()));
        }
        info!(path = %path, "Removed from Local Storage");
        Ok(())
    }

    async fn rename(&self, metadata: &mut CloudMetadata, new_name: &str) -> ProviderResult<()> {
        let old_path = Self::path_of(metadata);
        let mut renamed = metadata.clone();
        renamed.rename(new_name)?;
        let new_path = renamed.path();
        if new_path == old_path {
            return Ok(());
        }

        if metadata.is_folder() {
            let occupied = !self.keys_under(&new_path).await?.is_empty()
                || self
                    .store
                    .get(&storage_key(&new_path))
                    .await
                    .map_err(store_error)?
                    .is_some();
            if occupied {
                return Err(ProviderError::Api(format!("{new_name} already exists")));
            }
            for key in self.keys_under(&old_path).await? {
                let suffix = &key[storage_key(&old_path).len()..];
                self.move_key(&key, &format!("{}{suffix}", storage_key(&new_path)))
                    .await?;
            }
            renamed.set_provider_data(json!({ "path": new_path }));
        } else {
            if self
                .store
                .get(&storage_key(&new_path))
                .await
                .map_err(store_error)?
                .is_some()
            {
                return Err(ProviderError::Api(format!("{new_name} already exists")));
            }
            self.move_key(&storage_key(&old_path), &storage_key(&new_path))
                .await?;
            renamed.set_provider_data(json!({ "key": storage_key(&new_path), "path": new_path }));
        }

        info!(from = %old_path, to = %new_path, "Renamed in Local Storage");
        *metadata = renamed;
        Ok(())
    }

    async fn close(&self, _metadata: &CloudMetadata) -> ProviderResult<()> {
        Ok(())
    }

    fn open_saved_id(&self, metadata: &CloudMetadata) -> Option<String> {
        Some(Self::path_of(metadata))
    }

    async fn open_saved(&self, id: &str) -> ProviderResult<CloudMetadata> {
        let exists = self
            .store
            .get(&storage_key(id))
            .await
            .map_err(store_error)?
            .is_some();
        if !exists {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        self.metadata_for_path(id, CloudMetadataKind::File)
    }
}
