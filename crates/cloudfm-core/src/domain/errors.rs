//! Domain error types
//!
//! Errors raised while constructing or mutating domain values: invalid
//! names, invalid authorization state transitions and malformed
//! reopen fragments.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid file or folder name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Invalid provider name (empty or containing a `:`)
    #[error("Invalid provider name: {0}")]
    InvalidProviderName(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// A `#file=<provider>:<id>` fragment could not be parsed
    #[error("Invalid reopen fragment: {0}")]
    InvalidFragment(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
