//! # 认证中间件
//!
//! 两种变体共用同一前提：会话中是否存在登录资料。
//! 页面路由未登录时重定向到首页；接口路由返回 401 JSON，并按 subject id
//! 重新查询本地用户，注入到请求扩展中。

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use entity::users;

use super::session::AuthSession;
use crate::app::AppState;
use crate::error::HubError;
use crate::web::response::ApiResponse;
use crate::{ldebug, lerror, logging::{LogComponent, LogStage}};

/// 未登录时的跳转目标
pub const LOGIN_ENTRY_PATH: &str = "/";

/// 当前请求对应的本地用户
#[derive(Debug, Clone)]
pub struct CurrentUser(pub users::Model);

/// 页面路由认证：未登录重定向到首页
pub async fn require_session(session: AuthSession, request: Request, next: Next) -> Response {
    match session.profile().await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => Redirect::to(LOGIN_ENTRY_PATH).into_response(),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Session,
                LogComponent::Gate,
                "session_read_failed",
                &format!("读取会话失败: {e}")
            );
            Redirect::to(LOGIN_ENTRY_PATH).into_response()
        }
    }
}

/// 接口路由认证：未登录或用户已不存在时返回 401
pub async fn require_api_user(
    State(state): State<AppState>,
    session: AuthSession,
    mut request: Request,
    next: Next,
) -> Response {
    let profile = match session.profile().await {
        Ok(Some(profile)) => profile,
        Ok(None) => return ApiResponse::unauthenticated().into_response(),
        Err(e) => return ApiResponse::<()>::AppError(HubError::from(e)).into_response(),
    };

    match state.users.find_by_auth_id(&profile.sub).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => {
            ldebug!(
                "system",
                LogStage::Authentication,
                LogComponent::Gate,
                "user_vanished",
                "会话对应的用户已不存在",
                auth_id = %profile.sub
            );
            ApiResponse::unauthenticated().into_response()
        }
        Err(e) => ApiResponse::<()>::AppError(e).into_response(),
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiResponse::unauthenticated().into_response())
    }
}
