//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the use cases depend
//! on, but whose implementations live in adapter crates or in the host.
//!
//! ## Ports Overview
//!
//! - [`ICloudProvider`] - Uniform storage backend contract
//! - [`IHostClient`] - Prompts, URL fragment, downloads and fetches in the host
//! - [`IKeyValueStore`] - String key/value persistence behind Local Storage

pub mod cloud_provider;
pub mod host;
pub mod key_value_store;

pub use cloud_provider::{
    AuthorizationPrompt, ICloudProvider, ListOptions, ProviderError, ProviderResult,
};
pub use host::IHostClient;
pub use key_value_store::{IKeyValueStore, StoreError};
