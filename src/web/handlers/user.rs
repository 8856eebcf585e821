//! # 用户相关处理器

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::{AuthSession, CurrentUser};
use crate::web::response::ApiResponse;

/// 首页状态
#[derive(Debug, Serialize)]
pub struct HomeStatus {
    pub authenticated: bool,
}

/// 首页：报告是否已登录
pub async fn home(session: AuthSession) -> Response {
    match session.profile().await {
        Ok(profile) => ApiResponse::Success(HomeStatus {
            authenticated: profile.is_some(),
        })
        .into_response(),
        Err(e) => ApiResponse::<()>::AppError(e.into()).into_response(),
    }
}

/// 已登录页面：返回会话中的资料
pub async fn profile(session: AuthSession) -> Response {
    match session.profile().await {
        Ok(Some(profile)) => ApiResponse::Success(profile).into_response(),
        Ok(None) => ApiResponse::unauthenticated().into_response(),
        Err(e) => ApiResponse::<()>::AppError(e.into()).into_response(),
    }
}

/// 当前用户的本地记录
pub async fn me(CurrentUser(user): CurrentUser) -> Response {
    ApiResponse::Success(user).into_response()
}
