//! Session validity gate.
//!
//! ARCHITECTURE
//! ============
//! `SessionGuard` is the only component that reads or writes the persisted
//! token. Screens ask it whether a login is required; the API client asks it
//! for a bearer token. Both paths run the same expiry check, and a token that
//! is unusable is deleted the moment it is seen.
//!
//! Expected outcomes (no token, expired, malformed) are values. Only storage
//! failures surface as errors.

pub mod token;

use std::sync::Arc;

use crate::store::{StoreError, TOKEN_KEY, TokenStore};

pub use token::{Token, TokenClaims, TokenError, decode_claims, is_valid, is_valid_at, now_unix};

/// Outcome of checking the stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Valid(TokenClaims),
    /// Nothing stored.
    Missing,
    /// Decodable, but `exp` is in the past. Cleared.
    Expired,
    /// Not decodable or no `exp`. Cleared.
    Malformed,
}

impl SessionStatus {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Message for the login redirect, `None` when no redirect is needed.
    #[must_use]
    pub fn login_prompt(&self) -> Option<&'static str> {
        match self {
            Self::Valid(_) => None,
            Self::Missing => Some("Please sign in."),
            Self::Expired => Some("Session expired. Please sign in again."),
            Self::Malformed => Some("Invalid session. Please sign in again."),
        }
    }
}

#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn TokenStore>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Raw read of the persisted token. Does not check expiry.
    pub async fn get_token(&self) -> Result<Option<Token>, StoreError> {
        Ok(self.store.get(TOKEN_KEY).await?.map(Token::from))
    }

    #[must_use]
    pub fn is_valid(token: &Token) -> bool {
        is_valid(token.as_str())
    }

    /// Persist a freshly issued token, replacing any prior one.
    pub async fn store(&self, token: &Token) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, token.as_str()).await?;
        tracing::info!("session token stored");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(TOKEN_KEY).await
    }

    /// Classify the stored session, deleting the token if it is unusable.
    pub async fn check(&self) -> Result<SessionStatus, StoreError> {
        self.check_at(now_unix()).await
    }

    pub async fn check_at(&self, now: i64) -> Result<SessionStatus, StoreError> {
        Ok(self.gate(now).await?.0)
    }

    /// `true` when a usable session exists; otherwise clears and returns `false`.
    pub async fn ensure_valid_or_clear(&self) -> Result<bool, StoreError> {
        Ok(self.check().await?.is_valid())
    }

    /// Token to attach to an authenticated request, if the session is usable.
    pub async fn bearer(&self) -> Result<Option<Token>, StoreError> {
        Ok(self.gate(now_unix()).await?.1)
    }

    /// Display claims of the current session, if it is usable.
    pub async fn claims(&self) -> Result<Option<TokenClaims>, StoreError> {
        match self.check().await? {
            SessionStatus::Valid(claims) => Ok(Some(claims)),
            _ => Ok(None),
        }
    }

    async fn gate(&self, now: i64) -> Result<(SessionStatus, Option<Token>), StoreError> {
        let Some(token) = self.get_token().await? else {
            tracing::debug!("no session token stored");
            return Ok((SessionStatus::Missing, None));
        };

        match decode_claims(token.as_str()) {
            Ok(claims) if claims.is_live_at(now) => {
                tracing::debug!(exp = claims.exp, now, "session token valid");
                Ok((SessionStatus::Valid(claims), Some(token)))
            }
            Ok(claims) => {
                tracing::info!(exp = claims.exp, now, "session token expired; clearing");
                self.clear().await?;
                Ok((SessionStatus::Expired, None))
            }
            Err(error) => {
                tracing::info!(%error, "session token malformed; clearing");
                self.clear().await?;
                Ok((SessionStatus::Malformed, None))
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
