//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for provider names and the `#file=` reopen
//! fragment. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// ProviderName
// ============================================================================

/// Machine name of a storage provider (e.g. `localStorage`, `googleDrive`)
///
/// Used in URL fragments and to bind `CloudMetadata` to its provider, so it
/// may not be empty and may not contain a `:` (the fragment separator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderName(String);

impl ProviderName {
    /// Create a new ProviderName after validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidProviderName` if the name is empty,
    /// contains whitespace or contains a `:`
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() || name.contains(':') || name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidProviderName(name));
        }
        Ok(Self(name))
    }

    /// Wraps a compile-time provider name such as the bundled ones
    ///
    /// Validity is only checked in debug builds.
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "invalid provider name {name:?}");
        Self(name.to_string())
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProviderName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderName> for String {
    fn from(name: ProviderName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProviderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// OpenSavedFragment
// ============================================================================

/// The addressable `#file=<providerName>:<urlEncodedIdentifier>` fragment
///
/// Written to the host URL after a save to a provider that can reopen saved
/// documents, and parsed back on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSavedFragment {
    provider: ProviderName,
    id: String,
}

impl OpenSavedFragment {
    /// Create a fragment from a provider name and its raw (unencoded) identifier
    pub fn new(provider: ProviderName, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }

    /// The provider that can reopen the document
    pub fn provider(&self) -> &ProviderName {
        &self.provider
    }

    /// The decoded provider-specific identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parse a fragment, with or without the leading `#`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFragment` when the `file=` key, the
    /// separator or the identifier is missing, or when percent-decoding fails
    pub fn parse(fragment: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidFragment(fragment.to_string());

        let body = fragment.strip_prefix('#').unwrap_or(fragment);
        let value = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("file="))
            .ok_or_else(invalid)?;
        let (provider, encoded_id) = value.split_once(':').ok_or_else(invalid)?;
        if encoded_id.is_empty() {
            return Err(invalid());
        }

        let provider = ProviderName::new(provider).map_err(|_| invalid())?;
        let id = urlencoding::decode(encoded_id).map_err(|_| invalid())?;

        Ok(Self::new(provider, id.into_owned()))
    }
}

impl Display for OpenSavedFragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#file={}:{}",
            self.provider,
            urlencoding::encode(&self.id)
        )
    }
}
