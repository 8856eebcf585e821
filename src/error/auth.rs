//! Errors raised by the login handshake and the authentication gate.

use thiserror::Error;

/// Terminal failures of the primary login flow.
///
/// Each variant ends the request with its own user-facing response; none is
/// retried automatically.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("state parameter does not match the pending login")]
    CsrfMismatch,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("identity token verification failed: {0}")]
    VerificationFailed(String),

    #[error("identity token carries no subject id")]
    ProfileInvalid,

    #[error("the user is not authenticated")]
    NotAuthenticated,

    #[error("session store error: {0}")]
    Session(String),
}

impl AuthError {
    /// Stable machine-readable code used in JSON error bodies.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CsrfMismatch => "csrf_mismatch",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::VerificationFailed(_) => "verification_failed",
            Self::ProfileInvalid => "profile_invalid",
            Self::NotAuthenticated => "unauthenticated",
            Self::Session(_) => "session_error",
        }
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Session(err.to_string())
    }
}
