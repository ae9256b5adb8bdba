//! Host application port (driven/secondary port)
//!
//! The dialogs and some providers call back into the host application for
//! prompts, URL updates, downloads and URL fetching. The host is treated as
//! an already-correct collaborator; implementations live in the embedding
//! application (the bundled CLI provides a terminal implementation).

use anyhow::Result;

/// Port trait for the embedding application
#[async_trait::async_trait]
pub trait IHostClient: Send + Sync {
    /// Shows a blocking message to the user
    fn alert(&self, message: &str, title: Option<&str>);

    /// Asks a yes/no question; `true` means the user agreed
    async fn confirm(&self, message: &str) -> bool;

    /// Replaces the addressable URL fragment (`None` clears it)
    fn set_url_fragment(&self, fragment: Option<&str>);

    /// Hands a file to the user (browser download, file written to disk)
    ///
    /// Delivery cannot be confirmed beyond the returned result.
    async fn download(&self, filename: &str, mime_type: &str, data: &[u8]) -> Result<()>;

    /// Fetches the document at `url` on behalf of the URL provider
    async fn fetch_url(&self, url: &str) -> Result<String>;

    /// Whether the current document is shared
    fn is_shared(&self) -> bool {
        false
    }
}
