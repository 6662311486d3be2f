//! Authentication: the identity provider seam, the session that gates
//! directory access, and the checks run on credentials before they are sent.

pub mod cognito;
pub mod session;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{AuthError, ValidationError};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Tokens issued by a successful sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh; the provider keeps the original refresh token valid.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// A signed-in session as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub username: String,
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer accepted.
    pub expires_at: i64,
}

impl StoredSession {
    pub fn new(username: impl Into<String>, tokens: Tokens, now: OffsetDateTime) -> Self {
        Self {
            username: username.into(),
            expires_at: now.unix_timestamp() + tokens.expires_in,
            id_token: tokens.id_token,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now.unix_timestamp()
    }

    /// Apply refreshed tokens, keeping the refresh token when none was issued.
    pub fn refreshed(self, tokens: Tokens, now: OffsetDateTime) -> Self {
        let refresh_token = tokens.refresh_token.clone().or(self.refresh_token);
        let mut session = Self::new(self.username, tokens, now);
        session.refresh_token = refresh_token;
        session
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
    }
}

/// Identity provider operations. Usernames are email addresses.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    async fn sign_in(&self, username: &str, password: &str) -> Result<Tokens, AuthError>;

    async fn refresh(&self, username: &str, refresh_token: &str) -> Result<Tokens, AuthError>;

    /// Register a new account; the provider emails a verification code.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError>;

    /// Request a password-reset code by email.
    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}

/// Reject a blank value for a required form field.
pub fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

/// A new password must match its confirmation and be at least `min_len`
/// characters. The match is checked first.
pub fn validate_new_password(
    password: &str,
    confirm: &str,
    min_len: usize,
) -> Result<(), ValidationError> {
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < min_len {
        return Err(ValidationError::PasswordTooShort(min_len));
    }
    Ok(())
}
