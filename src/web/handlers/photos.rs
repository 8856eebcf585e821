//! # 照片服务处理器
//!
//! 关联流程（发起授权、授权回调）以及使用已关联令牌的接口。
//! 回调结果以查询参数形式带回前端，参数值只会是固定的错误码。

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{
    AuthSession, CurrentUser,
    state::{issue_link_state, validate_link_state},
};
use crate::error::HubError;
use crate::photos::SharedAlbum;
use crate::web::response::ApiResponse;
use crate::{lwarn, logging::{LogComponent, LogStage}};

/// 前端接收关联结果的页面
pub const LINK_RESULT_PATH: &str = "/create-event";

/// 提供方未给出错误原因时使用的错误码
const DEFAULT_LINK_ERROR: &str = "missing_code";

/// 照片服务回调的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct LinkCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// 创建相册请求
#[derive(Debug, Deserialize)]
pub struct CreateAlbumRequest {
    pub title: String,
}

/// 关联状态
#[derive(Debug, Serialize)]
pub struct PhotosStatus {
    pub connected: bool,
}

/// 发起照片服务授权
pub async fn connect(State(state): State<AppState>, session: AuthSession) -> Response {
    match issue_link_state(&session).await {
        Ok(nonce) => Redirect::temporary(state.vault.authorize_url(&nonce).as_str()).into_response(),
        Err(e) => ApiResponse::<()>::AppError(e.into()).into_response(),
    }
}

/// 照片服务授权回调
pub async fn callback(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<LinkCallbackParams>,
) -> Response {
    let profile = match session.profile().await {
        Ok(Some(profile)) => profile,
        Ok(None) => return ApiResponse::unauthenticated().into_response(),
        Err(e) => return ApiResponse::<()>::AppError(e.into()).into_response(),
    };

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        let reason = params
            .error
            .as_deref()
            .filter(|e| !e.is_empty())
            .map_or(DEFAULT_LINK_ERROR, sanitize_error_code);
        return link_result(&state, Err(reason));
    };

    if validate_link_state(&session, params.state.as_deref()).await.is_err() {
        lwarn!(
            "system",
            LogStage::Callback,
            LogComponent::Vault,
            "link_state_mismatch",
            "照片服务回调 state 校验失败",
            user_id = %profile.user_id
        );
        return link_result(&state, Err("invalid_state"));
    }

    match state.vault.exchange_authorization_code(profile.user_id, code).await {
        Ok(()) => link_result(&state, Ok(())),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Callback,
                LogComponent::Vault,
                "link_failed",
                &format!("照片服务关联失败: {e}"),
                user_id = %profile.user_id
            );
            link_result(&state, Err(e.error_code()))
        }
    }
}

fn link_result(state: &AppState, outcome: Result<(), &str>) -> Response {
    let query = match outcome {
        Ok(()) => "google_photos_connected=true".to_string(),
        Err(code) => format!("google_photos_error={}", urlencoding::encode(code)),
    };
    let target = format!("{}{LINK_RESULT_PATH}?{query}", state.config.frontend_base_url);
    Redirect::temporary(&target).into_response()
}

/// 提供方错误码只允许小写字母与下划线，其余一律替换为通用错误码
fn sanitize_error_code(raw: &str) -> &str {
    let valid = raw.len() <= 64 && raw.chars().all(|c| c.is_ascii_lowercase() || c == '_');
    if valid { raw } else { "authorization_failed" }
}

/// 当前用户的关联状态
pub async fn status(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    match state.vault.has_connection(user.id).await {
        Ok(connected) => ApiResponse::Success(PhotosStatus { connected }).into_response(),
        Err(e) => ApiResponse::<()>::AppError(e.into()).into_response(),
    }
}

/// 创建并共享相册
pub async fn create_album(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateAlbumRequest>,
) -> Response {
    let title = request.title.trim();
    if title.is_empty() {
        return ApiResponse::<()>::Error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_title",
            "相册标题不能为空".to_string(),
        )
        .into_response();
    }

    match create_shared_album(&state, user.id, title).await {
        Ok(album) => ApiResponse::Success(album).into_response(),
        Err(e) => ApiResponse::<()>::AppError(e).into_response(),
    }
}

async fn create_shared_album(state: &AppState, user_id: Uuid, title: &str) -> Result<SharedAlbum, HubError> {
    let client = state.vault.get_authorized_client(user_id).await?;
    Ok(client.create_shared_album(title).await?)
}
