//! `multipart/related` upload body
//!
//! Drive's multipart upload takes the file's JSON metadata and its content
//! in one request:
//!
//! ```text
//! \r\n---------314159265358979323846\r\n
//! Content-Type: application/json\r\n\r\n
//! {"name":"notes","mimeType":"text/plain"}
//! \r\n---------314159265358979323846\r\n
//! Content-Type: text/plain\r\n\r\n
//! <content>
//! \r\n---------314159265358979323846--
//! ```
//!
//! Image content is sent base64-encoded and declares
//! `Content-Transfer-Encoding: base64`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Fixed boundary separating the parts
pub const BOUNDARY: &str = "-------314159265358979323846";

/// Value of the request's `Content-Type` header
pub fn content_type() -> String {
    format!("multipart/related; boundary=\"{BOUNDARY}\"")
}

fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Builds the two-part body
pub fn build_body(metadata: &serde_json::Value, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let delimiter = format!("\r\n--{BOUNDARY}\r\n");
    let close = format!("\r\n--{BOUNDARY}--");

    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n").as_bytes());
    if is_image(mime_type) {
        body.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n\r\n");
        body.extend_from_slice(STANDARD.encode(content).as_bytes());
    } else {
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(content);
    }
    body.extend_from_slice(close.as_bytes());
    body
}
