//! Providers command - lists the registered providers in tab order

use anyhow::Result;
use clap::Args;
use serde_json::json;

use cloudfm_core::ports::ICloudProvider;

use crate::context::AppContext;
use crate::output::{OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct ProvidersCommand {
    /// Also check whether each provider holds valid credentials
    #[arg(long)]
    check_auth: bool,
}

impl ProvidersCommand {
    pub async fn execute(
        &self,
        ctx: &AppContext,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut rows = Vec::new();
        for provider in ctx.registry.all() {
            let capabilities: Vec<&str> = provider.capabilities().iter().map(|c| c.name()).collect();
            let authorized = if self.check_auth && provider.requires_authorization() {
                Some(provider.authorize(true).await.unwrap_or(false))
            } else {
                None
            };
            rows.push((provider.clone(), capabilities, authorized));
        }

        if format == OutputFormat::Json {
            let providers: Vec<_> = rows
                .iter()
                .map(|(p, caps, authorized)| {
                    json!({
                        "name": p.name().as_str(),
                        "display_name": p.display_name(),
                        "url_display_name": p.url_display_name(),
                        "capabilities": caps,
                        "requires_authorization": p.requires_authorization(),
                        "authorized": authorized,
                    })
                })
                .collect();
            fmt.print_json(&json!({ "providers": providers }));
            return Ok(());
        }

        if rows.is_empty() {
            fmt.warn("No providers are enabled");
            return Ok(());
        }
        fmt.success(&format!("{} provider(s)", rows.len()));
        for (provider, caps, authorized) in &rows {
            let auth = match authorized {
                Some(true) => " [signed in]",
                Some(false) => " [not signed in]",
                None if provider.requires_authorization() => " [requires sign-in]",
                None => "",
            };
            fmt.info(&format!(
                "{:<14} {}{auth}",
                provider.name().as_str(),
                provider.display_name()
            ));
            fmt.info(&format!("{:<14} {}", "", caps.join(", ")));
        }
        Ok(())
    }
}
