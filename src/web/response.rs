//! # API 响应结构
//!
//! JSON 接口统一使用 `{success, data|error, timestamp}` 信封。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, HubError};
use crate::{lerror, logging::{LogComponent, LogStage}};

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    Error(StatusCode, &'static str, String),
    AppError(HubError),
}

impl ApiResponse<()> {
    /// 未登录或会话对应的用户已不存在
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::AppError(AuthError::NotAuthenticated.into())
    }
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorInfo {
            code: code.to_string(),
            message,
        },
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}

/// 对外消息只描述错误类别，不含内部细节
fn public_message(error: &HubError) -> &'static str {
    match error.error_code() {
        "not_connected" => "尚未关联照片服务",
        "refresh_failed" => "照片服务授权已失效，请重新关联",
        "remote_api_failed" => "照片服务请求失败",
        "token_exchange_failed" => "照片服务授权失败",
        "user_not_found" | "unauthenticated" => "请先登录",
        _ => "服务器内部错误",
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => (
                StatusCode::OK,
                Json(SuccessResponse {
                    success: true,
                    data,
                    timestamp: Utc::now(),
                }),
            )
                .into_response(),
            Self::Error(status, code, message) => error_body(status, code, message),
            Self::AppError(error) => {
                let status = error.status_code();
                if status.is_server_error() {
                    lerror!(
                        "system",
                        LogStage::Error,
                        LogComponent::Server,
                        "api_error",
                        &format!("接口处理失败: {error}")
                    );
                }
                error_body(status, error.error_code(), public_message(&error).to_string())
            }
        }
    }
}

impl<T: Serialize> From<HubError> for ApiResponse<T> {
    fn from(error: HubError) -> Self {
        Self::AppError(error)
    }
}
