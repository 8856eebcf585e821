//! The unified error handling system for the application.

pub use auth::AuthError;
pub use types::HubError;
pub use vault::VaultError;

/// A unified `Result` type for the entire application.
pub type Result<T> = std::result::Result<T, HubError>;

pub mod auth;
pub mod types;
pub mod vault;
