//! Local File provider
//!
//! Saving hands the serialized document to the host as a download; whether
//! the user kept it cannot be observed beyond the host's own result. Loading
//! reads a file the user picked, whose path travels in the metadata's
//! provider data. There is no stable handle to reopen, so no `#file=`
//! fragment is ever produced.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use cloudfm_core::config::LocalFileConfig;
use cloudfm_core::domain::{Capabilities, Capability, CloudContent, CloudMetadata, ProviderName};
use cloudfm_core::ports::{ICloudProvider, IHostClient, ProviderError, ProviderResult};
use cloudfm_core::usecases::well_known;

/// Provider over host downloads and user-picked files
pub struct LocalFileProvider {
    name: ProviderName,
    display_name: String,
    capabilities: Capabilities,
    default_extension: Option<String>,
    host: Arc<dyn IHostClient>,
}

impl LocalFileProvider {
    /// Save, export and load
    pub fn default_capabilities() -> Capabilities {
        Capabilities::from_iter([Capability::Save, Capability::Export, Capability::Load])
    }

    pub fn new(host: Arc<dyn IHostClient>) -> Self {
        Self {
            name: ProviderName::from_static(well_known::LOCAL_FILE),
            display_name: "Local File".to_string(),
            capabilities: Self::default_capabilities(),
            default_extension: None,
            host,
        }
    }

    pub fn from_config(config: &LocalFileConfig, host: Arc<dyn IHostClient>) -> Self {
        Self {
            display_name: config.display_name.clone(),
            capabilities: Self::default_capabilities().apply(&config.capabilities),
            ..Self::new(host)
        }
    }

    /// Extension appended to saved filenames that lack one
    #[must_use]
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = Some(extension.into()).filter(|e: &String| !e.is_empty());
        self
    }

    /// Metadata for a file the user picked from disk
    pub fn metadata_for_path(&self, path: &Path) -> ProviderResult<CloudMetadata> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProviderError::InvalidContent(format!("{} has no file name", path.display())))?;
        let mime = mime_guess::from_path(path).first_or_text_plain();
        Ok(CloudMetadata::new_file(name)?
            .with_provider(self.name.clone())
            .with_mime_type(mime.essence_str())
            .with_provider_data(json!({ "path": path.to_string_lossy() })))
    }
}

#[async_trait::async_trait]
impl ICloudProvider for LocalFileProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn save(&self, content: &CloudContent, metadata: &mut CloudMetadata) -> ProviderResult<()> {
        let filename = metadata.filename(self.default_extension.as_deref());
        let mime = mime_guess::from_path(&filename).first_or_text_plain();
        let data = content.to_json_string();

        self.host
            .download(&filename, mime.essence_str(), data.as_bytes())
            .await
            .map_err(|e| ProviderError::Io(format!("{e:#}")))?;

        metadata.bind_provider(self.name.clone());
        metadata.set_mime_type(Some(mime.essence_str().to_string()));
        metadata.set_provider_data(json!({ "filename": filename }));
        info!(filename = %filename, bytes = data.len(), "Handed file to host");
        Ok(())
    }

    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent> {
        let path = metadata
            .provider_data_str("path")
            .ok_or_else(|| ProviderError::NotFound(metadata.name().to_string()))?;
        let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(metadata.name().to_string()),
            _ => ProviderError::Io(format!("{path}: {e}")),
        })?;
        debug!(path, bytes = text.len(), "Read local file");
        Ok(CloudContent::parse(&text))
    }
}
