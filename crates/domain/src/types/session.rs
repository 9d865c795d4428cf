//! Identity provider session types
//!
//! Sessions are issued by the external identity provider; this crate only
//! carries them around.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserProfile;

/// User as known by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    /// Provider-side user id (a UUID for Supabase)
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session issued by the identity provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: IdentityUser,
}

impl Session {
    /// Check if the session is expired or will expire within the threshold
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at
            }
            None => false,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Session-change notification emitted by the identity provider adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
}

impl AuthEvent {
    /// Session carried by the event, `None` for sign-out.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) | Self::UserUpdated(session) => {
                Some(session)
            }
            Self::SignedOut => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::UserUpdated(_) => "user_updated",
        }
    }
}

/// Result of a provider sign-up
///
/// `session` is absent when the provider requires e-mail confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: IdentityUser,
    pub session: Option<Session>,
}

/// Client-side session state machine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    Unauthenticated,
    /// Probing the provider for a session or fetching its profile.
    #[default]
    AuthenticatingOrSyncing,
    /// `profile` is `None` when the fetch failed or no row exists yet.
    Authenticated { session: Session, profile: Option<UserProfile> },
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::AuthenticatingOrSyncing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            expires_at: None,
            user: IdentityUser { id: "uuid-1".into(), email: Some("a@example.com".into()) },
        }
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("uuid-1"));
    }

    #[test]
    fn initial_state_is_loading() {
        assert!(SessionState::default().is_loading());
    }

    #[test]
    fn sign_out_carries_no_session() {
        assert!(AuthEvent::SignedOut.session().is_none());
        assert!(AuthEvent::SignedIn(session()).session().is_some());
    }
}
