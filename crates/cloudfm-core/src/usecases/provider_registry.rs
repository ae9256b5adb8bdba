//! Provider registry
//!
//! Holds the configured providers in display order. Metadata refers to its
//! owning provider by [`ProviderName`]; the registry resolves that name back
//! to the provider instance.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Capability, CloudMetadata, DomainError, ProviderName};
use crate::ports::ICloudProvider;

/// Machine names of the bundled providers
pub mod well_known {
    pub const LOCAL_STORAGE: &str = "localStorage";
    pub const LOCAL_FILE: &str = "localFile";
    pub const GOOGLE_DRIVE: &str = "googleDrive";
    pub const URL: &str = "url";
}

/// Ordered set of named providers
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ICloudProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if a provider with the same
    /// name is already registered
    pub fn register(&mut self, provider: Arc<dyn ICloudProvider>) -> Result<(), DomainError> {
        if self.get(provider.name()).is_some() {
            return Err(DomainError::ValidationFailed(format!(
                "provider {} is already registered",
                provider.name()
            )));
        }
        debug!(
            provider = %provider.name(),
            capabilities = %provider.capabilities(),
            "Registered provider"
        );
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, name: &ProviderName) -> Option<Arc<dyn ICloudProvider>> {
        self.by_str(name.as_str())
    }

    /// Lookup by raw name
    pub fn by_str(&self, name: &str) -> Option<Arc<dyn ICloudProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().as_str() == name)
            .cloned()
    }

    /// The provider a metadata entry is bound to
    pub fn resolve(&self, metadata: &CloudMetadata) -> Option<Arc<dyn ICloudProvider>> {
        metadata.provider().and_then(|name| self.get(name))
    }

    /// Providers declaring `capability`, in registration order
    pub fn supporting(&self, capability: Capability) -> Vec<Arc<dyn ICloudProvider>> {
        self.providers
            .iter()
            .filter(|p| p.can(capability))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[Arc<dyn ICloudProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&ProviderName> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Capabilities;
    use crate::usecases::test_support::MockProvider;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("localStorage", "Local Storage")))
            .unwrap();
        registry
            .register(Arc::new(
                MockProvider::new("url", "URL")
                    .with_capabilities(Capabilities::none().with(Capability::Load)),
            ))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.by_str("url").is_some());
        assert!(registry.by_str("googleDrive").is_none());

        let names: Vec<_> = registry.names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["localStorage", "url"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("localStorage", "Local Storage")))
            .unwrap();
        let err = registry
            .register(Arc::new(MockProvider::new("localStorage", "Other")))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_supporting_filters_by_capability() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("localStorage", "Local Storage")))
            .unwrap();
        registry
            .register(Arc::new(
                MockProvider::new("url", "URL")
                    .with_capabilities(Capabilities::none().with(Capability::Load)),
            ))
            .unwrap();

        assert_eq!(registry.supporting(Capability::Load).len(), 2);
        let savers = registry.supporting(Capability::Save);
        assert_eq!(savers.len(), 1);
        assert_eq!(savers[0].name().as_str(), "localStorage");
    }

    #[test]
    fn test_resolve_uses_bound_provider() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("localStorage", "Local Storage")))
            .unwrap();

        let unbound = CloudMetadata::new_file("notes").unwrap();
        assert!(registry.resolve(&unbound).is_none());

        let bound = unbound.with_provider(ProviderName::new("localStorage").unwrap());
        let provider = registry.resolve(&bound).unwrap();
        assert_eq!(provider.display_name(), "Local Storage");
    }
}
