//! Auth commands - Login, Logout, and Status for Google Drive
//!
//! Provides the `cloudfm auth` CLI subcommands which:
//! 1. `login`  - Reuses cached tokens when possible, otherwise runs the
//!    OAuth2 PKCE flow in the browser and caches the tokens in the keyring.
//! 2. `logout` - Clears the cached tokens and stops token renewal.
//! 3. `status` - Shows whether a usable token is held.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use cloudfm_core::ports::ICloudProvider;

use crate::context::AppContext;
use crate::output::{OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in to Google Drive
    Login,
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        match self {
            AuthCommand::Login => execute_login(ctx, format, fmt).await,
            AuthCommand::Logout => execute_logout(ctx, format, fmt),
            AuthCommand::Status => execute_status(ctx, format, fmt).await,
        }
    }
}

async fn execute_login(
    ctx: &AppContext,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let drive = ctx.google_drive()?;

    let silent = drive
        .authorize(true)
        .await
        .context("Unable to reach Google")?;
    let interactive = if silent {
        false
    } else {
        let prompt = drive.authorization_prompt();
        fmt.info(&prompt.message);
        fmt.info("Opening browser for Google sign-in...");
        info!("Starting interactive Google sign-in");
        if !drive.authorize(false).await.context("Google sign-in failed")? {
            bail!("Google sign-in did not complete");
        }
        true
    };

    if format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "provider": drive.name().as_str(),
            "interactive": interactive,
            "renewal_scheduled": drive.renewal_scheduled(),
        }));
    } else if interactive {
        fmt.success("Signed in to Google Drive");
    } else {
        fmt.success("Already signed in to Google Drive");
    }
    Ok(())
}

fn execute_logout(ctx: &AppContext, format: OutputFormat, fmt: &dyn OutputFormatter) -> Result<()> {
    let drive = ctx.google_drive()?;
    drive.sign_out().context("Failed to clear stored tokens")?;

    if format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({ "success": true }));
    } else {
        fmt.success("Signed out of Google Drive");
    }
    Ok(())
}

async fn execute_status(
    ctx: &AppContext,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let drive = ctx.google_drive()?;
    // Silent authorization picks up cached tokens without opening a browser.
    let authorized = drive.authorize(true).await.unwrap_or(false);

    if format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "provider": drive.name().as_str(),
            "authorized": authorized,
            "state": drive.authorization_state().name(),
            "renewal_scheduled": drive.renewal_scheduled(),
        }));
    } else if authorized {
        fmt.success("Signed in to Google Drive");
        if drive.renewal_scheduled() {
            fmt.info("Token renewal is scheduled");
        }
    } else {
        fmt.warn("Not signed in. Run 'cloudfm auth login'.");
    }
    Ok(())
}
