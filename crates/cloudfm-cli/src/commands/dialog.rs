//! Drives the file dialogs from the command line
//!
//! A command names a provider and a `Folder/sub/name` path. The path is
//! walked the way a user would click through the dialog: open it, pick the
//! provider's tab, sign in if the tab shows its prompt, select each folder,
//! then type the filename and confirm.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tracing::debug;

use cloudfm_core::domain::CloudMetadata;
use cloudfm_core::ports::ICloudProvider;
use cloudfm_core::usecases::{
    CloudFileManager, DialogAction, DialogError, FileDialogTab, TabView, TabbedDialog,
};

use crate::context::AppContext;
use crate::output::OutputFormatter;

/// Splits `a/b/name` into its folder segments and the leaf
pub fn split_path(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.trim().is_empty()).collect();
    let leaf = segments.pop().ok_or_else(|| anyhow!("Please enter a filename"))?;
    Ok((segments, leaf))
}

/// Opens the dialog for `action` on the named provider's tab
///
/// Tries silent authorization first; when the tab still shows the
/// provider's prompt, runs the interactive flow as its button would.
pub async fn open_dialog(
    ctx: &AppContext,
    manager: &CloudFileManager,
    action: DialogAction,
    provider_name: &str,
    fmt: &dyn OutputFormatter,
) -> Result<TabbedDialog<FileDialogTab>> {
    let provider = ctx.provider(provider_name)?;
    if provider.requires_authorization() {
        let silent = provider
            .authorize(true)
            .await
            .with_context(|| format!("Unable to reach {}", provider.display_name()))?;
        debug!(provider = provider_name, silent, "Silent authorization");
    }

    let mut dialog = manager.dialog(action.clone());
    let index = dialog
        .tabs()
        .iter()
        .position(|tab| tab.provider().name() == provider.name())
        .ok_or_else(|| {
            anyhow!(
                "{} does not support {}",
                provider.display_name(),
                action.label().to_lowercase()
            )
        })?;
    dialog.select_tab(index).await;

    let tab = selected_tab(&mut dialog)?;
    if let TabView::AuthorizationPrompt(prompt) = tab.view() {
        fmt.info(&prompt.message);
        fmt.info(&format!("{}...", prompt.button_label));
        if !tab.authorize().await? {
            bail!("{} is not authorized", provider.display_name());
        }
    }
    Ok(dialog)
}

pub fn selected_tab(dialog: &mut TabbedDialog<FileDialogTab>) -> Result<&mut FileDialogTab> {
    dialog
        .selected_tab_mut()
        .ok_or_else(|| anyhow!("The dialog has no provider tab"))
}

/// Selects each folder in turn, failing on the tab's listing error
pub async fn enter_folders(tab: &mut FileDialogTab, folders: &[&str]) -> Result<()> {
    for segment in folders {
        if let Some(status) = tab.status() {
            bail!("{status}");
        }
        let index = tab
            .listing()
            .iter()
            .position(|e| e.is_folder() && e.name() == *segment)
            .ok_or_else(|| anyhow!("Folder '{segment}' not found"))?;
        tab.select(index).await;
    }
    if let Some(status) = tab.status() {
        bail!("{status}");
    }
    Ok(())
}

/// Walks to `path` and confirms it in a dialog for `action`
///
/// `Ok(None)` means the user declined a confirmation prompt.
pub async fn pick(
    ctx: &AppContext,
    manager: &CloudFileManager,
    action: DialogAction,
    provider_name: &str,
    path: &str,
    fmt: &dyn OutputFormatter,
) -> Result<Option<CloudMetadata>> {
    let (folders, leaf) = split_path(path)?;
    let mut dialog = open_dialog(ctx, manager, action, provider_name, fmt).await?;
    let tab = selected_tab(&mut dialog)?;
    enter_folders(tab, &folders).await?;
    tab.set_filename(leaf);

    let picked = match tab.confirm().await {
        Ok(metadata) => Some(metadata),
        Err(DialogError::Cancelled) => None,
        Err(e) => return Err(e.into()),
    };
    dialog.close();
    Ok(picked)
}

pub fn entry_json(entry: &CloudMetadata) -> serde_json::Value {
    json!({
        "name": entry.name(),
        "kind": entry.kind().to_string(),
        "path": entry.path(),
        "provider": entry.provider().map(|p| p.to_string()),
        "mime_type": entry.mime_type(),
    })
}
