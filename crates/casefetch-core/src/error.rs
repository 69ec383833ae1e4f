//! Error types for credential persistence, re-authentication, portal requests
//! and patient resolution.

use std::sync::Arc;
use std::time::Duration;

/// Errors raised while persisting the session credential.
///
/// Reading never fails: unusable persisted state is reported as "absent".
#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    /// The credential file or its directory could not be written.
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The credential could not be serialized.
    #[error("Failed to serialize credential: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The temporary file could not be moved over the credential file.
    #[error("Failed to persist credential: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors raised when a fresh session token cannot be obtained.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    /// A required account secret is not configured.
    #[error("Missing account secret: {0}")]
    MissingSecret(&'static str),

    /// The login helper could not be started.
    #[error("Failed to start login helper `{program}`: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The login flow did not finish in time.
    #[error("Login did not complete within {0:?}")]
    Timeout(Duration),

    /// The login helper exited unsuccessfully.
    #[error("Login helper failed (exit code {code:?}): {stderr}")]
    LoginFailed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error output.
        stderr: String,
    },

    /// The login flow finished without producing a token.
    #[error("Login completed but produced no session token")]
    EmptyToken,

    /// A login failure, shared with every caller that waited on that login.
    #[error("{0}")]
    Shared(Arc<AuthenticationError>),
}

impl AuthenticationError {
    /// Unwraps a [`Shared`](Self::Shared) failure to the login error behind it.
    #[must_use]
    pub fn root(&self) -> &AuthenticationError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

/// Errors raised by [`AuthenticatedClient`](crate::client::AuthenticatedClient).
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Re-authentication failed, so the request could not be (re)issued.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The portal answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Upstream {
        /// Response status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response body was not the expected JSON document.
    #[error("Failed to decode response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// An href or endpoint could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RequestError {
    /// Returns the upstream status code, if the portal answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if this failure came from re-authentication.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Errors raised while building an order form parser.
#[derive(Debug, thiserror::Error)]
pub enum OrderFormError {
    /// A built-in CSS selector did not compile.
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector {
        /// Selector source.
        selector: String,
        /// Parser message.
        message: String,
    },
}

/// A resolution request that failed, tagged with the stage that failed.
///
/// "No match" is not an error; see [`Resolution::NoMatch`](crate::models::Resolution::NoMatch).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The case search filtered by patient name failed.
    #[error("Name search failed: {0}")]
    NameSearch(#[source] RequestError),

    /// The unfiltered case search failed.
    #[error("Full case search failed: {0}")]
    FullSearch(#[source] RequestError),

    /// Re-authentication failed while order forms were being fetched.
    #[error("Correlation failed: {0}")]
    Correlate(#[source] RequestError),
}

impl ResolveError {
    /// Short name of the failing stage, for diagnostics.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NameSearch(_) => "name search",
            Self::FullSearch(_) => "full search",
            Self::Correlate(_) => "correlation",
        }
    }

    /// The request failure behind this error.
    #[must_use]
    pub fn request_error(&self) -> &RequestError {
        match self {
            Self::NameSearch(e) | Self::FullSearch(e) | Self::Correlate(e) => e,
        }
    }
}
