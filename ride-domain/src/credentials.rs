//! Session Credential Domain Types
//!
//! # Security Model
//!
//! - The access token is short-lived and presented as a bearer credential
//! - The refresh token is longer-lived and only ever sent to the renewal endpoint
//! - Neither token is ever printed by `Debug`
//! - Both are zeroized when the pair is dropped

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// Credential Pair
// =============================================================================

/// The sole valid (access, refresh) token pair of a session.
///
/// A pair is always replaced as a whole; there is no way to update one
/// token without the other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    access_token: String,
    refresh_token: String,
}

impl CredentialPair {
    /// Create a new credential pair.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Short-lived bearer token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Long-lived renewal token.
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Authentication state of the client session.
///
/// `Authenticated` is entered on login. Renewal failure and explicit logout
/// both move to `Unauthenticated`, which requires a fresh login to leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// A credential pair is held
    Authenticated(CredentialPair),
    /// No credentials; the host must re-authenticate
    Unauthenticated,
}

impl SessionState {
    /// Check if the session currently holds credentials.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Get the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

impl From<Option<CredentialPair>> for SessionState {
    fn from(pair: Option<CredentialPair>) -> Self {
        match pair {
            Some(pair) => SessionState::Authenticated(pair),
            None => SessionState::Unauthenticated,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("access-secret", "refresh-secret");
        let printed = format!("{:?}", pair);

        assert!(!printed.contains("access-secret"));
        assert!(!printed.contains("refresh-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let pair = CredentialPair::new("a", "r");
        let json = serde_json::to_value(&pair).unwrap();

        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");

        let back: CredentialPair = serde_json::from_value(json).unwrap();
        assert_eq!(back, pair);
    }

    #[test]
    fn test_session_state_from_option() {
        let state = SessionState::from(Some(CredentialPair::new("a", "r")));
        assert!(state.is_authenticated());
        assert_eq!(state.as_str(), "authenticated");

        let state = SessionState::from(None);
        assert_eq!(state, SessionState::Unauthenticated);
    }
}
