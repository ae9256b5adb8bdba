//! In-memory provider and host doubles shared by the use case tests

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::domain::metadata::sort_by_name;
use crate::domain::{Capabilities, CloudContent, CloudMetadata, ProviderName};
use crate::ports::{ICloudProvider, IHostClient, ListOptions, ProviderError, ProviderResult};

/// Provider storing documents in a map keyed by `/`-joined path
pub struct MockProvider {
    name: ProviderName,
    display_name: String,
    capabilities: Capabilities,
    requires_authorization: bool,
    grant_on_authorize: bool,
    can_open_saved: bool,
    authorized: AtomicBool,
    files: Mutex<BTreeMap<String, String>>,
    folders: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
    fail_with: Mutex<Option<ProviderError>>,
}

impl MockProvider {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: ProviderName::new(name).unwrap(),
            display_name: display_name.to_string(),
            capabilities: Capabilities::all(),
            requires_authorization: false,
            grant_on_authorize: true,
            can_open_saved: true,
            authorized: AtomicBool::new(true),
            files: Mutex::new(BTreeMap::new()),
            folders: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Starts unauthorized; `authorize` succeeds only when `grant` is true
    pub fn requiring_authorization(mut self, grant: bool) -> Self {
        self.requires_authorization = true;
        self.grant_on_authorize = grant;
        self.authorized = AtomicBool::new(false);
        self
    }

    pub fn without_open_saved(mut self) -> Self {
        self.can_open_saved = false;
        self
    }

    pub fn with_file(self, path: &str, text: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), text.to_string());
        self
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.folders.lock().unwrap().insert(path.to_string());
        self
    }

    /// The next provider operation fails with `error`
    pub fn fail_next(&self, error: ProviderError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    pub fn stored(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn path_of(metadata: &CloudMetadata) -> String {
        metadata
            .provider_data_str("path")
            .map(str::to_string)
            .unwrap_or_else(|| metadata.path())
    }

    fn entry(&self, path: &str, folder: bool) -> CloudMetadata {
        let mut parent: Option<Arc<CloudMetadata>> = None;
        let mut segments: Vec<&str> = path.split('/').collect();
        let leaf = segments.pop().unwrap_or_default();
        let mut prefix = String::new();
        for segment in segments {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            parent = Some(Arc::new(
                CloudMetadata::new_folder(segment)
                    .unwrap()
                    .with_provider(self.name.clone())
                    .with_parent(parent)
                    .with_provider_data(json!({ "path": prefix })),
            ));
        }
        let meta = if folder {
            CloudMetadata::new_folder(leaf)
        } else {
            CloudMetadata::new_file(leaf)
        };
        meta.unwrap()
            .with_provider(self.name.clone())
            .with_parent(parent)
            .with_provider_data(json!({ "path": path }))
    }
}

fn parent_path(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[async_trait::async_trait]
impl ICloudProvider for MockProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn can_open_saved(&self) -> bool {
        self.can_open_saved
    }

    fn requires_authorization(&self) -> bool {
        self.requires_authorization
    }

    async fn authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    async fn authorize(&self, immediate: bool) -> ProviderResult<bool> {
        self.record(format!("authorize:{immediate}"))?;
        let granted = self.grant_on_authorize && !immediate;
        if granted {
            self.authorized.store(true, Ordering::SeqCst);
        }
        Ok(granted)
    }

    async fn save(&self, content: &CloudContent, metadata: &mut CloudMetadata) -> ProviderResult<()> {
        let path = metadata.path();
        self.record(format!("save:{path}"))?;
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), content.to_json_string());
        metadata.bind_provider(self.name.clone());
        metadata.set_provider_data(json!({ "path": path }));
        Ok(())
    }

    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent> {
        let path = Self::path_of(metadata);
        self.record(format!("load:{path}"))?;
        let text = self
            .stored(&path)
            .ok_or_else(|| ProviderError::NotFound(metadata.name().to_string()))?;
        Ok(CloudContent::parse(&text))
    }

    async fn list(
        &self,
        folder: Option<&CloudMetadata>,
        options: &ListOptions,
    ) -> ProviderResult<Vec<CloudMetadata>> {
        let folder_path = folder.map(Self::path_of).unwrap_or_default();
        self.record(format!("list:{folder_path}"))?;

        let mut entries: Vec<CloudMetadata> = Vec::new();
        for path in self.folders.lock().unwrap().iter() {
            if parent_path(path) == folder_path && path != &folder_path {
                entries.push(self.entry(path, true));
            }
        }
        for path in self.files.lock().unwrap().keys() {
            if parent_path(path) == folder_path {
                entries.push(self.entry(path, false));
            }
        }
        entries.retain(|e| options.accepts(e));
        sort_by_name(&mut entries);
        Ok(entries)
    }

    async fn remove(&self, metadata: &CloudMetadata) -> ProviderResult<()> {
        let path = Self::path_of(metadata);
        self.record(format!("remove:{path}"))?;
        self.files
            .lock()
            .unwrap()
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(metadata.name().to_string()))
    }

    async fn rename(&self, metadata: &mut CloudMetadata, new_name: &str) -> ProviderResult<()> {
        let old_path = Self::path_of(metadata);
        self.record(format!("rename:{old_path}->{new_name}"))?;
        metadata.rename(new_name)?;
        let new_path = metadata.path();
        let mut files = self.files.lock().unwrap();
        if let Some(text) = files.remove(&old_path) {
            files.insert(new_path.clone(), text);
        }
        metadata.set_provider_data(json!({ "path": new_path }));
        Ok(())
    }

    async fn close(&self, metadata: &CloudMetadata) -> ProviderResult<()> {
        self.record(format!("close:{}", metadata.name()))
    }

    fn open_saved_id(&self, metadata: &CloudMetadata) -> Option<String> {
        Some(Self::path_of(metadata))
    }

    async fn open_saved(&self, id: &str) -> ProviderResult<CloudMetadata> {
        if self.stored(id).is_none() {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        Ok(self.entry(id, false))
    }
}

/// Host double recording every prompt and URL change
pub struct MockHost {
    confirm_answer: AtomicBool,
    pub alerts: Mutex<Vec<String>>,
    pub confirms: Mutex<Vec<String>>,
    pub fragment: Mutex<Option<String>>,
    pub downloads: Mutex<Vec<(String, String, Vec<u8>)>>,
    pub pages: Mutex<BTreeMap<String, String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            confirm_answer: AtomicBool::new(true),
            alerts: Mutex::new(Vec::new()),
            confirms: Mutex::new(Vec::new()),
            fragment: Mutex::new(None),
            downloads: Mutex::new(Vec::new()),
            pages: Mutex::new(BTreeMap::new()),
        }
    }

    /// Answer given to every later `confirm`
    pub fn answer_confirms(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn fragment(&self) -> Option<String> {
        self.fragment.lock().unwrap().clone()
    }

    pub fn confirms(&self) -> Vec<String> {
        self.confirms.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IHostClient for MockHost {
    fn alert(&self, message: &str, _title: Option<&str>) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    async fn confirm(&self, message: &str) -> bool {
        self.confirms.lock().unwrap().push(message.to_string());
        self.confirm_answer.load(Ordering::SeqCst)
    }

    fn set_url_fragment(&self, fragment: Option<&str>) {
        *self.fragment.lock().unwrap() = fragment.map(str::to_string);
    }

    async fn download(&self, filename: &str, mime_type: &str, data: &[u8]) -> Result<()> {
        self.downloads.lock().unwrap().push((
            filename.to_string(),
            mime_type.to_string(),
            data.to_vec(),
        ));
        Ok(())
    }

    async fn fetch_url(&self, url: &str) -> Result<String> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 fetching {url}"))
    }
}
