//! Domain entities and business logic
//!
//! This module contains the core domain types for the cloud file manager:
//! - `CloudMetadata`, the backend-independent file/folder descriptor
//! - `CloudContent` and its envelope factory
//! - Provider capabilities
//! - The authorization state machine
//! - Validated newtypes and domain errors

pub mod authorization;
pub mod capabilities;
pub mod content;
pub mod errors;
pub mod metadata;
pub mod newtypes;

// Re-export commonly used types
pub use authorization::{AuthGate, AuthorizationState};
pub use capabilities::{Capabilities, Capability, CapabilityOverrides};
pub use content::{CloudContent, CloudContentFactory, EnvelopeMetadata, RawContent, SharingInfo};
pub use errors::DomainError;
pub use metadata::{CloudMetadata, CloudMetadataKind};
pub use newtypes::{OpenSavedFragment, ProviderName};
