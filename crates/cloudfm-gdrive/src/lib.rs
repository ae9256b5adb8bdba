//! Cloud File Manager Google Drive - Drive v3 provider
//!
//! Provides:
//! - OAuth2 authentication (Authorization Code with PKCE) with tokens cached
//!   in the OS keyring and silent renewal at 75% of the token lifetime
//! - A lazily bootstrapped, process-wide discovery of Google's OAuth
//!   endpoints, shared through the core `SdkLoader`
//! - Drive v3 file operations, with multipart uploads
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow, token cache, renewal scheduling
//! - [`client`] - Drive v3 HTTP client and error decoding
//! - [`discovery`] - OpenID discovery bootstrap
//! - [`multipart`] - `multipart/related` upload body
//! - [`provider`] - `ICloudProvider` implementation

pub mod auth;
pub mod client;
pub mod discovery;
pub mod multipart;
pub mod provider;

pub use provider::GoogleDriveProvider;

use cloudfm_core::ports::ProviderError;
use thiserror::Error;

/// Errors that can occur when talking to Google Drive
#[derive(Debug, Error)]
pub enum DriveError {
    /// The access token is missing, expired or was rejected
    #[error("{0}")]
    Unauthorized(String),

    /// The requested file does not exist
    #[error("{0}")]
    NotFound(String),

    /// The API rejected the request; `message` is decoded from the
    /// `{"error": {"message": ..}}` body when present
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Human-readable message
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<DriveError> for ProviderError {
    fn from(e: DriveError) -> Self {
        match e {
            DriveError::Unauthorized(msg) => ProviderError::NotAuthorized(msg),
            DriveError::NotFound(msg) => ProviderError::NotFound(msg),
            DriveError::Api { message, .. } => ProviderError::Api(message),
            DriveError::Network(e) => ProviderError::Io(e.to_string()),
            DriveError::InvalidResponse(msg) => ProviderError::Api(msg),
        }
    }
}
