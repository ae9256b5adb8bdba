//! Tabbed dialog shell
//!
//! Generic container selecting among tabs. Switching tabs calls the new
//! tab's [`DialogTab::on_selected`] hook so it can re-check authorization
//! and refresh its listing.

use std::sync::Arc;

use tracing::debug;

use super::file_dialog::{DialogAction, FileDialogTab};
use super::provider_registry::ProviderRegistry;
use crate::domain::CloudMetadata;
use crate::ports::IHostClient;

/// A tab the shell can host
#[async_trait::async_trait]
pub trait DialogTab: Send {
    /// Text on the tab header
    fn label(&self) -> &str;

    /// Called every time the tab becomes the selected one
    async fn on_selected(&mut self);

    /// Called when the tab stops being visible
    fn on_deselected(&mut self) {}
}

#[async_trait::async_trait]
impl DialogTab for FileDialogTab {
    fn label(&self) -> &str {
        self.provider().display_name()
    }

    async fn on_selected(&mut self) {
        self.mount().await;
    }

    fn on_deselected(&mut self) {
        self.unmount();
    }
}

/// Ordered tabs with one selected
pub struct TabbedDialog<T> {
    tabs: Vec<T>,
    selected: usize,
    open: bool,
}

impl<T: DialogTab> TabbedDialog<T> {
    pub fn new(tabs: Vec<T>) -> Self {
        Self {
            tabs,
            selected: 0,
            open: false,
        }
    }

    /// Shows the dialog and selects the first tab
    pub async fn open(&mut self) {
        self.open = true;
        self.selected = 0;
        if let Some(tab) = self.tabs.first_mut() {
            tab.on_selected().await;
        }
    }

    /// Switches tabs; returns `false` for an out-of-range index
    pub async fn select_tab(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() {
            return false;
        }
        if index != self.selected {
            if let Some(previous) = self.tabs.get_mut(self.selected) {
                previous.on_deselected();
            }
        }
        self.selected = index;
        self.open = true;
        debug!(tab = index, label = self.tabs[index].label(), "Selected dialog tab");
        self.tabs[index].on_selected().await;
        true
    }

    /// Closes the dialog; every tab is deselected
    pub fn close(&mut self) {
        self.open = false;
        for tab in &mut self.tabs {
            tab.on_deselected();
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_tab(&self) -> Option<&T> {
        self.tabs.get(self.selected)
    }

    pub fn selected_tab_mut(&mut self) -> Option<&mut T> {
        self.tabs.get_mut(self.selected)
    }

    pub fn tabs(&self) -> &[T] {
        &self.tabs
    }

    pub fn labels(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl TabbedDialog<FileDialogTab> {
    /// One tab per registered provider that supports `action`
    pub fn for_action(
        registry: &ProviderRegistry,
        host: Arc<dyn IHostClient>,
        action: DialogAction,
        readable_extensions: &[String],
        document: Option<&CloudMetadata>,
    ) -> Self {
        let tabs = registry
            .supporting(action.capability())
            .into_iter()
            .map(|provider| {
                FileDialogTab::new(
                    provider,
                    host.clone(),
                    action.clone(),
                    readable_extensions.to_vec(),
                    document.cloned(),
                )
            })
            .collect();
        Self::new(tabs)
    }
}
