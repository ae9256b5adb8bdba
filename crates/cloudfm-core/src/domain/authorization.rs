//! Authorization state machine
//!
//! ```text
//!                 begin                 succeed
//!  Unauthorized ────────► Authorizing ────────► Authorized
//!        ▲                    │                     │
//!        └────── fail ────────┘                     │ begin (renewal)
//!                             ▲                     │
//!                             └─────────────────────┘
//! ```
//!
//! [`AuthGate`] publishes the state over a `tokio::sync::watch` channel so
//! that any view gating its rendering on authorization can subscribe to it.
//! The state is never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::errors::DomainError;

/// Authorization state of one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    #[default]
    Unauthorized,
    Authorizing,
    Authorized,
}

impl AuthorizationState {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationState::Authorized)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthorizationState::Unauthorized => "Unauthorized",
            AuthorizationState::Authorizing => "Authorizing",
            AuthorizationState::Authorized => "Authorized",
        }
    }

    /// Unauthorized|Authorized → Authorizing
    pub fn begin(self) -> Result<Self, DomainError> {
        match self {
            AuthorizationState::Unauthorized | AuthorizationState::Authorized => {
                Ok(AuthorizationState::Authorizing)
            }
            AuthorizationState::Authorizing => Err(self.invalid(AuthorizationState::Authorizing)),
        }
    }

    /// Authorizing → Authorized
    pub fn succeed(self) -> Result<Self, DomainError> {
        match self {
            AuthorizationState::Authorizing => Ok(AuthorizationState::Authorized),
            other => Err(other.invalid(AuthorizationState::Authorized)),
        }
    }

    /// Authorizing → Unauthorized
    pub fn fail(self) -> Result<Self, DomainError> {
        match self {
            AuthorizationState::Authorizing => Ok(AuthorizationState::Unauthorized),
            other => Err(other.invalid(AuthorizationState::Unauthorized)),
        }
    }

    fn invalid(self, to: AuthorizationState) -> DomainError {
        DomainError::InvalidState {
            from: self.name().to_string(),
            to: to.name().to_string(),
        }
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// AuthGate
// ============================================================================

/// Shared, observable authorization state
///
/// Providers own one gate and drive it through `begin`/`succeed`/`fail`;
/// views call `subscribe` and re-render on change.
#[derive(Debug)]
pub struct AuthGate {
    tx: watch::Sender<AuthorizationState>,
}

impl AuthGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthorizationState::Unauthorized);
        Self { tx }
    }

    /// A gate that starts (and, unless driven, stays) authorized
    pub fn authorized() -> Self {
        let (tx, _rx) = watch::channel(AuthorizationState::Authorized);
        Self { tx }
    }

    pub fn state(&self) -> AuthorizationState {
        *self.tx.borrow()
    }

    pub fn is_authorized(&self) -> bool {
        self.state().is_authorized()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthorizationState> {
        self.tx.subscribe()
    }

    pub fn begin(&self) -> Result<AuthorizationState, DomainError> {
        self.transition(AuthorizationState::begin)
    }

    pub fn succeed(&self) -> Result<AuthorizationState, DomainError> {
        self.transition(AuthorizationState::succeed)
    }

    pub fn fail(&self) -> Result<AuthorizationState, DomainError> {
        self.transition(AuthorizationState::fail)
    }

    /// Drops back to `Unauthorized` from any state (sign-out, revoked token)
    pub fn reset(&self) {
        self.tx.send_replace(AuthorizationState::Unauthorized);
    }

    fn transition(
        &self,
        step: impl FnOnce(AuthorizationState) -> Result<AuthorizationState, DomainError>,
    ) -> Result<AuthorizationState, DomainError> {
        let mut result = Ok(self.state());
        self.tx.send_if_modified(|state| match step(*state) {
            Ok(next) => {
                let changed = next != *state;
                *state = next;
                result = Ok(next);
                changed
            }
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = AuthorizationState::Unauthorized;
        let state = state.begin().unwrap();
        assert_eq!(state, AuthorizationState::Authorizing);
        let state = state.succeed().unwrap();
        assert!(state.is_authorized());
    }

    #[test]
    fn test_failure_returns_to_unauthorized() {
        let state = AuthorizationState::Unauthorized.begin().unwrap();
        assert_eq!(state.fail().unwrap(), AuthorizationState::Unauthorized);
    }

    #[test]
    fn test_renewal_from_authorized() {
        let state = AuthorizationState::Authorized.begin().unwrap();
        assert_eq!(state, AuthorizationState::Authorizing);
        assert_eq!(state.succeed().unwrap(), AuthorizationState::Authorized);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(AuthorizationState::Unauthorized.succeed().is_err());
        assert!(AuthorizationState::Authorized.fail().is_err());
        let err = AuthorizationState::Authorizing.begin().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Authorizing to Authorizing"
        );
    }

    #[tokio::test]
    async fn test_gate_notifies_subscribers() {
        let gate = AuthGate::new();
        let mut rx = gate.subscribe();
        assert_eq!(*rx.borrow(), AuthorizationState::Unauthorized);

        gate.begin().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthorizationState::Authorizing);

        gate.succeed().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthorizationState::Authorized);
        assert!(gate.is_authorized());
    }

    #[test]
    fn test_gate_rejects_invalid_transition_without_change() {
        let gate = AuthGate::new();
        assert!(gate.succeed().is_err());
        assert_eq!(gate.state(), AuthorizationState::Unauthorized);

        gate.begin().unwrap();
        gate.fail().unwrap();
        assert_eq!(gate.state(), AuthorizationState::Unauthorized);
    }

    #[test]
    fn test_gate_reset() {
        let gate = AuthGate::authorized();
        assert!(gate.is_authorized());
        gate.reset();
        assert_eq!(gate.state(), AuthorizationState::Unauthorized);
    }
}
