//! Use cases (interactors) for the cloud file manager
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`ProviderRegistry`] - Named providers in display order
//! - [`FileDialogTab`] - One provider tab of the open/save/export dialog
//! - [`TabbedDialog`] - Multi-tab dialog shell
//! - [`CloudFileManager`] - Current-document workflow for the host

pub mod file_dialog;
pub mod file_manager;
pub mod provider_registry;
pub mod tabbed_dialog;

#[cfg(test)]
pub(crate) mod test_support;

pub use file_dialog::{
    DialogAction, DialogError, FileDialogTab, ListingRequest, ListingResult, TabView,
};
pub use file_manager::{CloudFileManager, FileManagerOptions, SaveOutcome};
pub use provider_registry::{well_known, ProviderRegistry};
pub use tabbed_dialog::{DialogTab, TabbedDialog};
