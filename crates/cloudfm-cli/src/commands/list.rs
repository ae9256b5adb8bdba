//! List command - browses a provider folder as the open dialog shows it

use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;

use cloudfm_core::domain::Capability;
use cloudfm_core::ports::ICloudProvider;
use cloudfm_core::usecases::DialogAction;

use super::dialog::{self, entry_json};
use crate::context::AppContext;
use crate::output::{OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Provider machine name (see `cloudfm providers`)
    provider: String,
    /// Folder to list, e.g. `Projects/2026`
    folder: Option<String>,
    /// Only show entries whose name contains this text
    #[arg(long, short)]
    search: Option<String>,
    /// Include files with unreadable extensions
    #[arg(long, short)]
    all: bool,
}

impl ListCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let provider = ctx.provider(&self.provider)?;
        if !provider.can(Capability::List) {
            bail!("{} cannot browse files", provider.display_name());
        }

        // Save dialogs list every file; open dialogs only readable ones.
        let action = if self.all {
            DialogAction::Save
        } else {
            DialogAction::Open
        };
        let folders: Vec<&str> = self
            .folder
            .as_deref()
            .unwrap_or("")
            .split('/')
            .filter(|s| !s.trim().is_empty())
            .collect();

        let mut dialog = dialog::open_dialog(ctx, &ctx.manager(), action, &self.provider, fmt).await?;
        let tab = dialog::selected_tab(&mut dialog)?;
        dialog::enter_folders(tab, &folders).await?;
        if let Some(search) = &self.search {
            tab.set_search(search.clone());
        }
        let entries: Vec<_> = tab.visible_entries().into_iter().cloned().collect();
        dialog.close();

        if format == OutputFormat::Json {
            let items: Vec<_> = entries.iter().map(entry_json).collect();
            fmt.print_json(&json!({
                "provider": self.provider,
                "folder": folders.join("/"),
                "entries": items,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            fmt.info("(empty)");
            return Ok(());
        }
        for entry in &entries {
            if entry.is_folder() {
                fmt.info(&format!("{}/", entry.name()));
            } else {
                fmt.info(entry.name());
            }
        }
        Ok(())
    }
}
