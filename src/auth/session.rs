//! The signed-in session and its lifecycle.
//!
//! A `SessionContext` is created once per run by loading the persisted
//! session file, rechecked once before the first directory access, and
//! updated by sign-in and sign-out. It is passed to whatever needs it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::auth::{require, validate_new_password, IdentityProvider, StoredSession};
use crate::error::AuthError;

pub struct SessionContext<P> {
    provider: P,
    path: PathBuf,
    session: Option<StoredSession>,
    checked: bool,
}

impl<P: IdentityProvider> SessionContext<P> {
    /// Read the persisted session, if any. An unreadable or corrupt session
    /// file is treated as signed out.
    pub fn load(provider: P, path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let session = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<StoredSession>(&text) {
                Ok(session) => Some(session),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring corrupt session file");
                    None
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(AuthError::SessionFile { path, source }),
        };
        debug!(path = %path.display(), signed_in = session.is_some(), "loaded session");
        Ok(Self {
            provider,
            path,
            session,
            checked: false,
        })
    }

    pub fn current(&self) -> Option<&StoredSession> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Validate the loaded session once per run. Expired tokens are refreshed;
    /// if that fails the session is cleared. Later calls return the result of
    /// the first check.
    pub async fn recheck(&mut self, now: OffsetDateTime) -> Result<bool, AuthError> {
        if self.checked {
            return Ok(self.is_authenticated());
        }
        self.checked = true;

        let Some(session) = self.session.take() else {
            return Ok(false);
        };
        if session.is_valid_at(now) {
            self.session = Some(session);
            return Ok(true);
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            info!(username = %session.username, "session expired");
            self.clear_file()?;
            return Ok(false);
        };
        match self.provider.refresh(&session.username, &refresh_token).await {
            Ok(tokens) => {
                debug!(username = %session.username, "refreshed session");
                let refreshed = session.refreshed(tokens, now);
                self.persist(&refreshed)?;
                self.session = Some(refreshed);
                Ok(true)
            }
            Err(err) => {
                warn!(username = %session.username, error = %err, "session refresh failed");
                self.clear_file()?;
                Ok(false)
            }
        }
    }

    /// The session, after the one-time recheck. Fails when not signed in.
    pub async fn require(&mut self, now: OffsetDateTime) -> Result<&StoredSession, AuthError> {
        if !self.recheck(now).await? {
            return Err(AuthError::NotSignedIn);
        }
        self.session.as_ref().ok_or(AuthError::NotSignedIn)
    }

    pub async fn sign_in(
        &mut self,
        email: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<&StoredSession, AuthError> {
        let email = email.trim();
        require(email, "email")?;
        require(password, "password")?;

        let tokens = self.provider.sign_in(email, password).await?;
        let session = StoredSession::new(email, tokens, now);
        self.persist(&session)?;
        info!(username = email, "signed in");
        self.checked = true;
        Ok(self.session.insert(session))
    }

    /// Forget the session locally. Always succeeds unless the session file
    /// cannot be removed.
    pub fn sign_out(&mut self) -> Result<(), AuthError> {
        if let Some(session) = self.session.take() {
            info!(username = %session.username, "signed out");
        }
        self.checked = true;
        self.clear_file()
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
        min_password_length: usize,
    ) -> Result<(), AuthError> {
        let email = email.trim();
        require(email, "email")?;
        validate_new_password(password, confirm, min_password_length)?;
        self.provider.sign_up(email, password).await
    }

    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let (email, code) = (email.trim(), code.trim());
        require(email, "email")?;
        require(code, "verification code")?;
        self.provider.confirm_sign_up(email, code).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        require(email, "email")?;
        self.provider.forgot_password(email).await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
        confirm: &str,
        min_password_length: usize,
    ) -> Result<(), AuthError> {
        let (email, code) = (email.trim(), code.trim());
        require(email, "email")?;
        require(code, "verification code")?;
        validate_new_password(password, confirm, min_password_length)?;
        self.provider.confirm_forgot_password(email, code, password).await
    }

    fn persist(&self, session: &StoredSession) -> Result<(), AuthError> {
        let file_error = |source| AuthError::SessionFile {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(file_error)?;
            }
        }
        let json = serde_json::to_string_pretty(session)?;
        write_private(&self.path, json.as_bytes()).map_err(file_error)?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }

    fn clear_file(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthError::SessionFile {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Write `contents` to a file only the owner can read. A new file is created
/// with mode 0600; an existing one is narrowed before any token is written.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::File::create(path)?.write_all(contents)
}
