//! Terminal host client
//!
//! The CLI stands in for the embedding application: alerts go to stderr,
//! confirmations are read from stdin (or auto-accepted with `--yes`),
//! downloads land in the configured download directory and URL imports are
//! fetched with `reqwest`.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, info};

use cloudfm_core::ports::IHostClient;

pub struct TerminalHost {
    download_dir: PathBuf,
    assume_yes: bool,
    http: reqwest::Client,
    fragment: Mutex<Option<String>>,
}

impl TerminalHost {
    pub fn new(download_dir: impl Into<PathBuf>, assume_yes: bool) -> Self {
        Self {
            download_dir: download_dir.into(),
            assume_yes,
            http: reqwest::Client::new(),
            fragment: Mutex::new(None),
        }
    }

    /// The last fragment a workflow published (`#file=...`)
    pub fn fragment(&self) -> Option<String> {
        self.fragment
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

/// Whether a typed answer counts as agreement
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait::async_trait]
impl IHostClient for TerminalHost {
    fn alert(&self, message: &str, title: Option<&str>) {
        match title {
            Some(title) => eprintln!("{title}: {message}"),
            None => eprintln!("{message}"),
        }
    }

    async fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            debug!(question = message, "Auto-confirmed");
            return true;
        }
        let prompt = format!("{message} [y/N] ");
        tokio::task::spawn_blocking(move || {
            eprint!("{prompt}");
            let _ = io::stderr().flush();
            let mut answer = String::new();
            match io::stdin().lock().read_line(&mut answer) {
                Ok(_) => is_yes(&answer),
                Err(_) => false,
            }
        })
        .await
        .unwrap_or(false)
    }

    fn set_url_fragment(&self, fragment: Option<&str>) {
        debug!(fragment = fragment.unwrap_or(""), "URL fragment updated");
        *self.fragment.lock().unwrap_or_else(|e| e.into_inner()) = fragment.map(str::to_string);
    }

    async fn download(&self, filename: &str, mime_type: &str, data: &[u8]) -> Result<()> {
        let name = Path::new(filename)
            .file_name()
            .with_context(|| format!("Invalid download name '{filename}'"))?;
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.download_dir.display()))?;
        let path = self.download_dir.join(name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), mime_type, bytes = data.len(), "Downloaded file");
        Ok(())
    }

    async fn fetch_url(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {url}"))?;
        let text = response.text().await.context("Failed to read response body")?;
        debug!(url, bytes = text.len(), "Fetched URL");
        Ok(text)
    }
}
