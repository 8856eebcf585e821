//! Errors of the linked photo-provider token vault.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Failures while establishing, refreshing, or using photo-provider tokens.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("photo provider is not connected for this user")]
    NotConnected,

    #[error("photo provider token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("photo provider code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("photo provider {operation} request failed with status {status}")]
    RemoteApiFailed { operation: &'static str, status: u16 },

    #[error("photo provider {operation} request could not be completed: {reason}")]
    RequestFailed { operation: &'static str, reason: String },

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("token storage failed: {0}")]
    Persistence(#[from] DbErr),
}

impl VaultError {
    /// Snake-case code safe to place in redirect query strings.
    ///
    /// Never carries token material or internal identifiers.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::ExchangeFailed(_) => "token_exchange_failed",
            Self::RemoteApiFailed { .. } | Self::RequestFailed { .. } => "remote_api_failed",
            Self::UserNotFound(_) => "user_not_found",
            Self::Persistence(_) => "storage_failed",
        }
    }
}
