//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

use super::{AuthError, VaultError};

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum HubError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 登录与会话认证错误
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 照片服务令牌错误
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl HubError {
    /// 对应的 HTTP 状态码
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config { .. }
            | Self::Database { .. }
            | Self::Internal { .. }
            | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Network { .. } => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::CsrfMismatch | AuthError::ProfileInvalid => StatusCode::BAD_REQUEST,
                AuthError::ExchangeFailed(_)
                | AuthError::VerificationFailed(_)
                | AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Vault(err) => match err {
                VaultError::NotConnected => StatusCode::CONFLICT,
                VaultError::UserNotFound(_) => StatusCode::UNAUTHORIZED,
                VaultError::RefreshFailed(_)
                | VaultError::ExchangeFailed(_)
                | VaultError::RemoteApiFailed { .. }
                | VaultError::RequestFailed { .. } => StatusCode::BAD_GATEWAY,
                VaultError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 对外暴露的错误码
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::Database { .. } => "database_error",
            Self::Network { .. } => "network_error",
            Self::Auth(err) => err.error_code(),
            Self::Vault(err) => err.error_code(),
            Self::Internal { .. } | Self::Io { .. } => "internal_error",
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "IO操作失败".to_string(),
            source: err,
        }
    }
}

impl From<sea_orm::error::DbErr> for HubError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("HTTP请求失败", err)
    }
}

impl From<tower_sessions::session::Error> for HubError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Auth(err.into())
    }
}
