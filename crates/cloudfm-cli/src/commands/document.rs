//! Document commands - save, export, open, restore, import, rename, remove
//!
//! Each command runs one step of the file manager workflow against a fresh
//! manager, the same way the host application would after the user picks a
//! location in the dialog.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::info;

use cloudfm_core::domain::{Capability, CloudContent, CloudMetadata, OpenSavedFragment};
use cloudfm_core::ports::ICloudProvider;
use cloudfm_core::usecases::{well_known, CloudFileManager, DialogAction, DialogError};

use super::dialog::{self, entry_json};
use crate::context::AppContext;
use crate::output::{OutputFormat, OutputFormatter};

/// Prefers the manager's status line, which carries the failing step
fn workflow_error(manager: &CloudFileManager, err: DialogError) -> anyhow::Error {
    match manager.status() {
        Some(status) => anyhow!("{status}"),
        None => err.into(),
    }
}

/// Content source shared by save and export
#[derive(Debug, Args)]
pub struct ContentArgs {
    /// Read the document from this file
    #[arg(long, short, conflicts_with = "text")]
    input: Option<PathBuf>,
    /// Use this text as the document
    #[arg(long)]
    text: Option<String>,
}

impl ContentArgs {
    /// The document text; stdin when neither flag is given
    async fn read(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.input {
            return tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()));
        }
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read document from stdin")?;
        Ok(text)
    }
}

/// Where opened content goes
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Write the document to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl OutputArgs {
    async fn emit(
        &self,
        ctx: &AppContext,
        manager: &CloudFileManager,
        content: &CloudContent,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let text = content.text();
        if let Some(path) = &self.output {
            tokio::fs::write(path, &text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        if format == OutputFormat::Json {
            fmt.print_json(&json!({
                "success": true,
                "title": manager.title(),
                "metadata": manager.metadata().map(entry_json),
                "fragment": ctx.host.fragment(),
                "content": text,
                "shared": content.is_shared(),
            }));
            return Ok(());
        }

        if let Some(title) = manager.title() {
            fmt.success(&format!("Opened {title}"));
        }
        match &self.output {
            Some(path) => fmt.info(&format!("Written to {}", path.display())),
            None => fmt.content(&text),
        }
        Ok(())
    }
}

fn report_saved(
    ctx: &AppContext,
    manager: &CloudFileManager,
    metadata: &CloudMetadata,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) {
    let status = manager.status().unwrap_or("Saved").to_string();
    if format == OutputFormat::Json {
        fmt.print_json(&json!({
            "success": true,
            "status": status,
            "title": manager.title(),
            "metadata": entry_json(metadata),
            "fragment": ctx.host.fragment(),
        }));
        return;
    }
    fmt.success(&status);
    fmt.info(&format!("Path: {}", metadata.path()));
    if let Some(fragment) = ctx.host.fragment() {
        fmt.info(&format!("Reopen with: cloudfm restore '{fragment}'"));
    }
}

/// Finds `path` on the provider the way an open dialog would
///
/// Providers that cannot list (Local File) take a path on disk instead.
async fn locate(
    ctx: &AppContext,
    manager: &CloudFileManager,
    provider_name: &str,
    path: &str,
    fmt: &dyn OutputFormatter,
) -> Result<Option<CloudMetadata>> {
    let provider = ctx.provider(provider_name)?;
    if !provider.can(Capability::List) {
        let is_local_file = provider.name().as_str() == well_known::LOCAL_FILE;
        if let Some(local_file) = ctx.local_file.as_ref().filter(|_| is_local_file) {
            return Ok(Some(local_file.metadata_for_path(Path::new(path))?));
        }
        bail!("{} cannot browse files", provider.display_name());
    }
    dialog::pick(ctx, manager, DialogAction::Open, provider_name, path, fmt).await
}

// ============================================================================
// save / export
// ============================================================================

#[derive(Debug, Args)]
pub struct SaveCommand {
    /// Provider machine name (see `cloudfm providers`)
    provider: String,
    /// Location, e.g. `Projects/plan`
    path: String,
    #[command(flatten)]
    content: ContentArgs,
}

impl SaveCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let text = self.content.read().await?;
        let mut manager = ctx.manager();

        let Some(metadata) =
            dialog::pick(ctx, &manager, DialogAction::Save, &self.provider, &self.path, fmt).await?
        else {
            fmt.warn("Save cancelled");
            return Ok(());
        };

        info!(provider = %self.provider, path = %self.path, "Saving document");
        let saved = manager
            .save_as(metadata, text)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        report_saved(ctx, &manager, &saved, format, fmt);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ExportCommand {
    provider: String,
    path: String,
    /// Extension the exported filename must carry
    #[arg(long, short, default_value = "txt")]
    extension: String,
    #[command(flatten)]
    content: ContentArgs,
}

impl ExportCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let text = self.content.read().await?;
        let mut manager = ctx.manager();
        let action = DialogAction::Export {
            extension: self.extension.clone(),
        };

        let Some(metadata) =
            dialog::pick(ctx, &manager, action, &self.provider, &self.path, fmt).await?
        else {
            fmt.warn("Export cancelled");
            return Ok(());
        };

        let exported = manager
            .export(metadata, text)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        report_saved(ctx, &manager, &exported, format, fmt);
        Ok(())
    }
}

// ============================================================================
// open / restore / import
// ============================================================================

#[derive(Debug, Args)]
pub struct OpenCommand {
    provider: String,
    /// Location, e.g. `Projects/plan.txt` (a file path for localFile)
    path: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl OpenCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut manager = ctx.manager();
        let Some(metadata) = locate(ctx, &manager, &self.provider, &self.path, fmt).await? else {
            return Ok(());
        };
        let content = manager
            .open(metadata)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        self.output.emit(ctx, &manager, &content, format, fmt).await
    }
}

#[derive(Debug, Args)]
pub struct RestoreCommand {
    /// Fragment published by a save, e.g. `#file=localStorage:notes`
    fragment: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl RestoreCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut manager = ctx.manager();
        if let Ok(fragment) = OpenSavedFragment::parse(&self.fragment) {
            let provider = ctx.provider(fragment.provider().as_str())?;
            if provider.requires_authorization() && !provider.authorize(true).await? {
                fmt.info(&provider.authorization_prompt().message);
                provider.authorize(false).await?;
            }
        }
        let content = manager
            .open_saved(&self.fragment)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        self.output.emit(ctx, &manager, &content, format, fmt).await
    }
}

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Address of the document
    url: String,
    #[command(flatten)]
    output: OutputArgs,
}

impl ImportCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut manager = ctx.manager();
        let content = manager
            .import_url(&self.url)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        self.output.emit(ctx, &manager, &content, format, fmt).await
    }
}

// ============================================================================
// rename / remove
// ============================================================================

#[derive(Debug, Args)]
pub struct RenameCommand {
    provider: String,
    path: String,
    /// New name for the document
    new_name: String,
}

impl RenameCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut manager = ctx.manager();
        let Some(metadata) = locate(ctx, &manager, &self.provider, &self.path, fmt).await? else {
            return Ok(());
        };
        manager
            .open(metadata)
            .await
            .map_err(|e| workflow_error(&manager, e))?;
        manager
            .rename(&self.new_name)
            .await
            .map_err(|e| workflow_error(&manager, e))?;

        let renamed = manager.metadata().cloned().ok_or(DialogError::NoDocument)?;
        if manager.is_dirty() {
            fmt.warn(&format!(
                "{} cannot rename stored files; only the document name changed",
                self.provider
            ));
        }
        if format == OutputFormat::Json {
            fmt.print_json(&json!({
                "success": true,
                "metadata": entry_json(&renamed),
                "fragment": ctx.host.fragment(),
            }));
        } else {
            fmt.success(&format!("Renamed to {}", renamed.name()));
            if let Some(fragment) = ctx.host.fragment() {
                fmt.info(&format!("Reopen with: cloudfm restore '{fragment}'"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct RemoveCommand {
    provider: String,
    path: String,
}

impl RemoveCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let manager = ctx.manager();
        let (folders, leaf) = dialog::split_path(&self.path)?;
        let mut dialog =
            dialog::open_dialog(ctx, &manager, DialogAction::Open, &self.provider, fmt).await?;
        let tab = dialog::selected_tab(&mut dialog)?;
        dialog::enter_folders(tab, &folders).await?;
        tab.set_filename(leaf);
        if tab.selected().is_none() {
            bail!("{leaf} not found");
        }

        let removed = match tab.remove_selected().await {
            Ok(removed) => removed,
            Err(e) => bail!(tab.status().map(str::to_string).unwrap_or_else(|| e.to_string())),
        };
        dialog.close();

        if format == OutputFormat::Json {
            fmt.print_json(&json!({ "success": removed, "path": self.path }));
        } else if removed {
            fmt.success(&format!("Deleted {}", self.path));
        } else {
            fmt.warn("Delete cancelled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::temp_context;
    use crate::output::get_formatter;

    fn content(text: &str) -> ContentArgs {
        ContentArgs {
            input: None,
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_then_restore_through_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = temp_context(dir.path()).await;
        let fmt = get_formatter(OutputFormat::Human, true);

        SaveCommand {
            provider: well_known::LOCAL_STORAGE.to_string(),
            path: "saved document".to_string(),
            content: content("Save and restore me"),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();
        assert_eq!(
            ctx.host.fragment().as_deref(),
            Some("#file=localStorage:saved%20document")
        );

        let output = dir.path().join("restored.txt");
        RestoreCommand {
            fragment: "#file=localStorage:saved%20document".to_string(),
            output: OutputArgs {
                output: Some(output.clone()),
            },
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "Save and restore me");
    }

    #[tokio::test]
    async fn test_save_into_folder_open_rename_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = temp_context(dir.path()).await;
        let fmt = get_formatter(OutputFormat::Human, true);
        let provider = well_known::LOCAL_STORAGE.to_string();

        // The first save creates the folder by path; later saves browse into it.
        let mut manager = ctx.manager();
        let folder_doc = CloudMetadata::new_file("seed.txt")
            .unwrap()
            .with_provider(ctx.provider(&provider).unwrap().name().clone())
            .with_parent(Some(std::sync::Arc::new(CloudMetadata::new_folder("Projects").unwrap())));
        manager.save_as(folder_doc, "seed").await.unwrap();

        SaveCommand {
            provider: provider.clone(),
            path: "Projects/plan.txt".to_string(),
            content: content("step one"),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();

        let output = dir.path().join("plan.out");
        OpenCommand {
            provider: provider.clone(),
            path: "Projects/plan.txt".to_string(),
            output: OutputArgs {
                output: Some(output.clone()),
            },
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "step one");

        RenameCommand {
            provider: provider.clone(),
            path: "Projects/plan.txt".to_string(),
            new_name: "final.txt".to_string(),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();

        RemoveCommand {
            provider: provider.clone(),
            path: "Projects/final.txt".to_string(),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();

        let err = OpenCommand {
            provider,
            path: "Projects/final.txt".to_string(),
            output: OutputArgs { output: None },
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_local_file_save_and_open_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = temp_context(dir.path()).await;
        let fmt = get_formatter(OutputFormat::Human, true);

        SaveCommand {
            provider: well_known::LOCAL_FILE.to_string(),
            path: "Local_File_Save".to_string(),
            content: content("saving to Local File"),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();
        assert!(ctx.host.fragment().is_none());

        let saved = dir.path().join("downloads").join("Local_File_Save.txt");
        let output = dir.path().join("reopened.txt");
        OpenCommand {
            provider: well_known::LOCAL_FILE.to_string(),
            path: saved.to_string_lossy().into_owned(),
            output: OutputArgs {
                output: Some(output.clone()),
            },
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "saving to Local File");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = temp_context(dir.path()).await;
        let fmt = get_formatter(OutputFormat::Human, true);
        let err = SaveCommand {
            provider: "dropbox".to_string(),
            path: "notes".to_string(),
            content: content("x"),
        }
        .execute(&ctx, OutputFormat::Human, fmt.as_ref())
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
