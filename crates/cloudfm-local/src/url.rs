//! URL import provider
//!
//! Read-only. The host fetches the document; the provider only knows where
//! the URL lives in the metadata.

use std::sync::Arc;

use tracing::debug;

use cloudfm_core::config::UrlConfig;
use cloudfm_core::domain::{Capabilities, Capability, CloudContent, CloudMetadata, ProviderName};
use cloudfm_core::ports::{ICloudProvider, IHostClient, ProviderError, ProviderResult};
use cloudfm_core::usecases::well_known;

pub struct UrlProvider {
    name: ProviderName,
    display_name: String,
    host: Arc<dyn IHostClient>,
}

impl UrlProvider {
    pub fn new(host: Arc<dyn IHostClient>) -> Self {
        Self {
            name: ProviderName::from_static(well_known::URL),
            display_name: "URL".to_string(),
            host,
        }
    }

    pub fn from_config(config: &UrlConfig, host: Arc<dyn IHostClient>) -> Self {
        Self {
            display_name: config.display_name.clone(),
            ..Self::new(host)
        }
    }
}

#[async_trait::async_trait]
impl ICloudProvider for UrlProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().with(Capability::Load)
    }

    async fn save(&self, _content: &CloudContent, _metadata: &mut CloudMetadata) -> ProviderResult<()> {
        Err(ProviderError::unsupported(&self.name, Capability::Save))
    }

    async fn load(&self, metadata: &CloudMetadata) -> ProviderResult<CloudContent> {
        let url = metadata
            .url()
            .or_else(|| metadata.provider_data_str("url"))
            .ok_or_else(|| ProviderError::InvalidContent(format!("{} has no URL", metadata.name())))?;
        let text = self
            .host
            .fetch_url(url)
            .await
            .map_err(|e| ProviderError::Io(format!("{e:#}")))?;
        debug!(url, bytes = text.len(), "Fetched URL");
        Ok(CloudContent::parse(&text))
    }
}
