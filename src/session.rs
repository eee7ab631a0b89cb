//! Process-wide session context.
//!
//! Holds the signed-in user and their backend access token. Created once at
//! startup and handed out as `Arc<SessionContext>` to every component that
//! needs identity: the diagnosis workflow stamps reports with the user id,
//! the HTTP backend reads the bearer token. Lifecycle:
//! - `login` populates it (replacing any previous user)
//! - `logout` clears it; the token is zeroed on drop
//!
//! Nothing re-fetches "current user" on its own.

use std::sync::RwLock;

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::models::{UserId, UserIdentity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session lock poisoned")]
    LockPoisoned,
}

/// Backend bearer token, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
struct AccessToken {
    value: String,
}

struct SignedIn {
    user: UserIdentity,
    token: AccessToken,
}

/// Shared "current user" state.
pub struct SessionContext {
    inner: RwLock<Option<SignedIn>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Sign a user in. Replaces any previous session.
    pub fn login(&self, user: UserIdentity, access_token: &str) -> Result<(), SessionError> {
        let mut guard = self.inner.write().map_err(|_| SessionError::LockPoisoned)?;
        tracing::info!(user_id = %user.id, role = %user.role, "User signed in");
        *guard = Some(SignedIn {
            user,
            token: AccessToken {
                value: access_token.to_string(),
            },
        });
        Ok(())
    }

    /// Sign out. Idempotent.
    pub fn logout(&self) {
        if let Ok(mut guard) = self.inner.write() {
            if guard.take().is_some() {
                tracing::info!("User signed out");
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Owned copy of the signed-in user.
    pub fn current_user(&self) -> Result<UserIdentity, SessionError> {
        let guard = self.inner.read().map_err(|_| SessionError::LockPoisoned)?;
        guard
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(SessionError::NotAuthenticated)
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.current_user().ok().map(|u| u.id)
    }

    /// Bearer token for backend calls. The copy is zeroed when dropped.
    pub fn access_token(&self) -> Result<Zeroizing<String>, SessionError> {
        let guard = self.inner.read().map_err(|_| SessionError::LockPoisoned)?;
        guard
            .as_ref()
            .map(|s| Zeroizing::new(s.token.value.clone()))
            .ok_or(SessionError::NotAuthenticated)
    }
}
