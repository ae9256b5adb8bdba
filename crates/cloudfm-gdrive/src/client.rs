//! Google Drive v3 API client
//!
//! Typed HTTP client for the handful of Drive endpoints the provider needs.
//! Adds the bearer token, builds URLs from a configurable base, and decodes
//! Drive's `{"error": {"message": ..}}` error shape into [`DriveError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloudfm_gdrive::client::DriveClient;
//!
//! # async fn example() -> Result<(), cloudfm_gdrive::DriveError> {
//! let client = DriveClient::new("access-token-here");
//! for file in client.list_folder("root").await? {
//!     println!("{} ({})", file.name, file.id);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::multipart;
use crate::DriveError;

/// Base URL of the Google APIs host
pub const GOOGLE_API_BASE_URL: &str = "https://www.googleapis.com";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str = "id,name,mimeType,parents";

// ============================================================================
// Drive API response types
// ============================================================================

/// A Drive file or folder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Decodes a failed response body into a display message
///
/// Falls back to the HTTP status text when the body is not Drive's error
/// shape.
pub fn decode_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    }
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive v3
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Creates a client against the public Google APIs host
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GOOGLE_API_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a renewal)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for a path below the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Turns a non-success response into a decoded [`DriveError`]
    async fn check(response: Response) -> Result<Response, DriveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = decode_error_message(status, &body);
        warn!(status = status.as_u16(), message = %message, "Drive request failed");
        Err(match status {
            StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
            StatusCode::NOT_FOUND => DriveError::NotFound(message),
            _ => DriveError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, DriveError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| DriveError::InvalidResponse(e.to_string()))
    }

    /// Lists the non-trashed children of a folder, following pagination
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let query = format!("'{}' in parents and trashed = false", folder_id.replace('\'', "\\'"));
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, "/drive/v3/files")
                .query(&[("q", query.as_str()), ("fields", fields.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = Self::check(request.send().await?).await?;
            let page: FileList = Self::parse(response).await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(folder_id, count = files.len(), "Listed Drive folder");
        Ok(files)
    }

    /// Fetches one file's metadata
    pub async fn get_file(&self, id: &str) -> Result<DriveFile, DriveError> {
        let response = self
            .request(Method::GET, &format!("/drive/v3/files/{id}"))
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;
        Self::parse(Self::check(response).await?).await
    }

    /// Downloads a file's content as text
    pub async fn download(&self, id: &str) -> Result<String, DriveError> {
        let response = self
            .request(Method::GET, &format!("/drive/v3/files/{id}"))
            .query(&[("alt", "media")])
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        debug!(id, bytes = text.len(), "Downloaded Drive file");
        Ok(text)
    }

    /// Creates a file with a multipart upload
    pub async fn create(
        &self,
        metadata: &serde_json::Value,
        mime_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DriveError> {
        self.upload(Method::POST, "/upload/drive/v3/files", metadata, mime_type, content)
            .await
    }

    /// Replaces an existing file's content (and metadata) by id
    pub async fn update(
        &self,
        id: &str,
        metadata: &serde_json::Value,
        mime_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DriveError> {
        self.upload(
            Method::PATCH,
            &format!("/upload/drive/v3/files/{id}"),
            metadata,
            mime_type,
            content,
        )
        .await
    }

    async fn upload(
        &self,
        method: Method,
        path: &str,
        metadata: &serde_json::Value,
        mime_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DriveError> {
        let body = multipart::build_body(metadata, mime_type, content);
        let response = self
            .request(method, path)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, multipart::content_type())
            .body(body)
            .send()
            .await?;
        let file: DriveFile = Self::parse(Self::check(response).await?).await?;
        debug!(id = %file.id, name = %file.name, "Uploaded Drive file");
        Ok(file)
    }

    /// Renames a file without touching its content
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<DriveFile, DriveError> {
        let response = self
            .request(Method::PATCH, &format!("/drive/v3/files/{id}"))
            .query(&[("fields", FILE_FIELDS)])
            .json(&serde_json::json!({ "name": new_name }))
            .send()
            .await?;
        Self::parse(Self::check(response).await?).await
    }

    /// Deletes a file permanently
    pub async fn delete(&self, id: &str) -> Result<(), DriveError> {
        let response = self
            .request(Method::DELETE, &format!("/drive/v3/files/{id}"))
            .send()
            .await?;
        Self::check(response).await?;
        debug!(id, "Deleted Drive file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let client = DriveClient::new("test-token");
        let request = client
            .request(Method::GET, "/drive/v3/files")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://www.googleapis.com/drive/v3/files"
        );
        let auth_header = request
            .headers()
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(auth_header, "Bearer test-token");
    }

    #[test]
    fn test_custom_base_url_drops_trailing_slash() {
        let client = DriveClient::with_base_url("token", "http://localhost:8080/");
        let request = client.request(Method::GET, "/drive/v3/files").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/drive/v3/files");
    }

    #[test]
    fn test_set_access_token() {
        let mut client = DriveClient::new("old");
        client.set_access_token("new");
        assert_eq!(client.access_token(), "new");
    }

    #[test]
    fn test_decode_error_message() {
        let body = r#"{"error": {"code": 403, "message": "The user does not have sufficient permissions for this file."}}"#;
        assert_eq!(
            decode_error_message(StatusCode::FORBIDDEN, body),
            "The user does not have sufficient permissions for this file."
        );
        assert_eq!(
            decode_error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_drive_file_deserialization() {
        let json = r#"{"id": "abc", "name": "Docs", "mimeType": "application/vnd.google-apps.folder"}"#;
        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(file.is_folder());
        assert!(file.parents.is_empty());

        let json = r#"{"id": "def", "name": "notes.txt", "mimeType": "text/plain", "parents": ["abc"]}"#;
        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(!file.is_folder());
        assert_eq!(file.parents, vec!["abc"]);
    }
}
