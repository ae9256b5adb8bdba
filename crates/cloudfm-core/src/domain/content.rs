//! CloudContent envelope
//!
//! Every provider exchanges documents as a [`CloudContent`]: the raw payload
//! produced by the host application, optionally wrapped in an envelope that
//! records which application wrote it, plus sharing information. Providers
//! persist `to_json_string()` and rebuild content through
//! [`CloudContentFactory::parse`], so none of them depends on the raw
//! representation of a document written by another provider.
//!
//! Enveloped form on the wire:
//!
//! ```json
//! {
//!   "content": "Save and restore me",
//!   "cfmVersion": "0.1.0",
//!   "appName": "Demo",
//!   "appVersion": "1.0",
//!   "appBuildNum": "42"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that mark a JSON object as an envelope (besides `content`)
const ENVELOPE_KEYS: &[&str] = &[
    "cfmVersion",
    "appName",
    "appVersion",
    "appBuildNum",
    "sharedDocumentId",
    "sharedDocumentUrl",
];

// ============================================================================
// RawContent
// ============================================================================

/// The document payload as the host application produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    /// Plain text document
    Text(String),
    /// Structured document
    Json(Value),
}

impl RawContent {
    /// The payload as text; structured payloads are serialized compactly
    pub fn to_text(&self) -> String {
        match self {
            RawContent::Text(text) => text.clone(),
            RawContent::Json(value) => value.to_string(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            RawContent::Text(text) => Value::String(text.clone()),
            RawContent::Json(value) => value.clone(),
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => RawContent::Text(text),
            other => RawContent::Json(other),
        }
    }
}

impl From<&str> for RawContent {
    fn from(text: &str) -> Self {
        RawContent::Text(text.to_string())
    }
}

impl From<String> for RawContent {
    fn from(text: String) -> Self {
        RawContent::Text(text)
    }
}

// ============================================================================
// EnvelopeMetadata / SharingInfo
// ============================================================================

/// Identifies the application that wrote an enveloped document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    #[serde(default)]
    pub cfm_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_build_num: Option<String>,
}

/// Sharing state carried along with a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_document_url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_unshared: bool,
}

impl SharingInfo {
    /// True when the document has a live shared copy
    pub fn is_shared(&self) -> bool {
        self.shared_document_id.is_some() && !self.is_unshared
    }
}

// ============================================================================
// CloudContent
// ============================================================================

/// A document plus its envelope and sharing metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CloudContent {
    content: RawContent,
    envelope: Option<EnvelopeMetadata>,
    sharing: SharingInfo,
}

impl CloudContent {
    /// Wraps a payload without an envelope
    pub fn raw(content: impl Into<RawContent>) -> Self {
        Self {
            content: content.into(),
            envelope: None,
            sharing: SharingInfo::default(),
        }
    }

    /// The host's payload, without envelope fields
    pub fn client_content(&self) -> &RawContent {
        &self.content
    }

    /// The host's payload as text
    pub fn text(&self) -> String {
        self.content.to_text()
    }

    pub fn envelope(&self) -> Option<&EnvelopeMetadata> {
        self.envelope.as_ref()
    }

    pub fn sharing(&self) -> &SharingInfo {
        &self.sharing
    }

    pub fn is_shared(&self) -> bool {
        self.sharing.is_shared()
    }

    /// Replaces the sharing information
    pub fn set_sharing(&mut self, sharing: SharingInfo) {
        self.sharing = sharing;
    }

    pub fn is_enveloped(&self) -> bool {
        self.envelope.is_some()
    }

    /// Serialized form written by every provider
    ///
    /// Enveloped documents become a JSON object; a bare text payload is
    /// returned verbatim so plain-text files stay plain text.
    pub fn to_json_string(&self) -> String {
        match &self.envelope {
            Some(envelope) => {
                let mut object = Map::new();
                object.insert("content".to_string(), self.content.to_value());
                merge_object(&mut object, envelope);
                merge_object(&mut object, &self.sharing);
                Value::Object(object).to_string()
            }
            None => {
                let text = self.content.to_text();
                if !is_envelope_text(&text) {
                    return text;
                }
                // Envelope-shaped payloads get a bare envelope so reading
                // them back does not strip the host's own fields.
                let mut object = Map::new();
                object.insert("content".to_string(), self.content.to_value());
                merge_object(&mut object, &EnvelopeMetadata::default());
                Value::Object(object).to_string()
            }
        }
    }
}

fn is_envelope(object: &Map<String, Value>) -> bool {
    object.contains_key("content") && ENVELOPE_KEYS.iter().any(|k| object.contains_key(*k))
}

fn is_envelope_text(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::Object(object)) if is_envelope(&object))
}

fn merge_object<T: Serialize>(target: &mut Map<String, Value>, fields: &T) {
    if let Ok(Value::Object(map)) = serde_json::to_value(fields) {
        target.extend(map);
    }
}

// ============================================================================
// CloudContentFactory
// ============================================================================

/// Builds and parses [`CloudContent`] for one host application
#[derive(Debug, Clone)]
pub struct CloudContentFactory {
    envelope: EnvelopeMetadata,
    wrap: bool,
}

impl CloudContentFactory {
    /// Creates a factory; `wrap` decides whether new content gets an envelope
    pub fn new(envelope: EnvelopeMetadata, wrap: bool) -> Self {
        Self { envelope, wrap }
    }

    /// Wraps host content in this application's envelope (when wrapping is on)
    pub fn create_enveloped(&self, content: impl Into<RawContent>) -> CloudContent {
        CloudContent {
            content: content.into(),
            envelope: self.wrap.then(|| self.envelope.clone()),
            sharing: SharingInfo::default(),
        }
    }

    /// Rebuilds content from what a provider read back
    ///
    /// See [`CloudContent::parse`].
    pub fn parse(&self, text: &str) -> CloudContent {
        CloudContent::parse(text)
    }
}

impl CloudContent {
    /// Rebuilds content from stored text
    ///
    /// A JSON object holding `content` and at least one envelope key is
    /// unwrapped; anything else is kept byte for byte as the text it was.
    /// Parsing does not depend on which application wrote the document.
    pub fn parse(text: &str) -> CloudContent {
        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(text) else {
            return CloudContent::raw(text);
        };
        if !is_envelope(&object) {
            return CloudContent::raw(text);
        }

        let content = object
            .remove("content")
            .map(RawContent::from_value)
            .unwrap_or_else(|| RawContent::Text(String::new()));
        let rest = Value::Object(object);
        let envelope: EnvelopeMetadata = serde_json::from_value(rest.clone()).unwrap_or_default();
        let sharing: SharingInfo = serde_json::from_value(rest).unwrap_or_default();

        CloudContent {
            content,
            envelope: Some(envelope),
            sharing,
        }
    }
}
