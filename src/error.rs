//! Error types for the directory client.
//!
//! Library layers return these typed errors; the CLI wraps them in
//! `anyhow` with context.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to the directory backend.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status. `message` is the response
    /// body, or `Error: <status>` when the body was empty.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Body text reported by the backend.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from backend: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot carry a path.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.trim().is_empty() {
            format!("Error: {}", status)
        } else {
            body
        };
        Self::Status { status, message }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Client-side checks that run before anything is submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("password must be at least {0} characters long")]
    PasswordTooShort(usize),

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("unknown contact field `{0}`")]
    UnknownField(String),

    #[error("invalid filter `{0}`, expected field=value")]
    InvalidFilter(String),
}

/// Failure in the sign-in, sign-up, or password-reset flows.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("invalid verification code, please try again")]
    CodeMismatch,

    #[error("verification code has expired, please request a new one")]
    ExpiredCode,

    #[error("an account with this email already exists")]
    UserExists,

    #[error("account is not confirmed, check your email for a verification code")]
    NotConfirmed,

    #[error("session is no longer valid, please sign in again")]
    SessionInvalid,

    #[error("not signed in, run `contactdir login` first")]
    NotSignedIn,

    #[error("identity provider is not configured: {0}")]
    NotConfigured(&'static str),

    /// Any other error reported by the identity provider.
    #[error("{kind}: {message}")]
    Provider {
        /// Provider error type name.
        kind: String,
        /// Provider message.
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from identity provider: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to access session file {path}: {source}")]
    SessionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A resource fetched while loading the directory view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Contacts,
    Organizations,
    OrganizationTypes,
    Sectors,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Contacts => "contacts",
            Resource::Organizations => "organizations",
            Resource::OrganizationTypes => "organization types",
            Resource::Sectors => "sectors",
        })
    }
}

/// Every fetch failure of one load, collapsed into a single error state.
#[derive(Error, Debug)]
#[error("error connecting to application: failed to load {}: {source}", list_resources(.failed))]
pub struct LoadError {
    /// Resources that could not be fetched, in fetch order.
    pub failed: Vec<Resource>,
    /// The first underlying failure.
    #[source]
    pub source: ApiError,
}

impl LoadError {
    /// Collapse per-resource failures; `Ok` when there were none.
    pub fn collect(failures: Vec<(Resource, ApiError)>) -> Result<(), LoadError> {
        let mut failures = failures.into_iter();
        let Some((first, source)) = failures.next() else {
            return Ok(());
        };
        let mut failed = vec![first];
        failed.extend(failures.map(|(resource, _)| resource));
        Err(LoadError { failed, source })
    }
}

fn list_resources(resources: &[Resource]) -> String {
    resources
        .iter()
        .map(Resource::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a create, update, or delete.
#[derive(Error, Debug)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
