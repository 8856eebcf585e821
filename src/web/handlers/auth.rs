//! # 登录流程处理器
//!
//! `/login`、`/signup`、`/callback`、`/logout`。回调严格按顺序执行：
//! 校验 state、交换授权码、校验身份令牌、同步用户、写入会话。

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::{
    AuthSession, ProfileFields, SessionProfile,
    state::{issue_state, validate_state},
};
use crate::error::{AuthError, HubError};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 登录成功后的跳转目标
pub const POST_LOGIN_PATH: &str = "/user";

/// 授权回调的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// 发起登录
pub async fn login(State(state): State<AppState>, session: AuthSession) -> Response {
    start_authorization(&state, &session, None).await
}

/// 发起注册，与登录相同但提示提供方展示注册页
pub async fn signup(State(state): State<AppState>, session: AuthSession) -> Response {
    start_authorization(&state, &session, Some("signup")).await
}

async fn start_authorization(state: &AppState, session: &AuthSession, screen_hint: Option<&str>) -> Response {
    match issue_state(session).await {
        Ok(nonce) => {
            let url = state.identity.authorization_url(&nonce, screen_hint);
            Redirect::temporary(url.as_str()).into_response()
        }
        Err(e) => login_failure(&HubError::from(e)),
    }
}

/// 授权回调
pub async fn callback(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<CallbackParams>,
) -> Response {
    match complete_login(&state, &session, &params).await {
        Ok(profile) => {
            linfo!(
                "system",
                LogStage::Callback,
                LogComponent::Identity,
                "login_succeeded",
                "登录成功",
                user_id = %profile.user_id
            );
            Redirect::temporary(POST_LOGIN_PATH).into_response()
        }
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Callback,
                LogComponent::Identity,
                "login_failed",
                &format!("登录失败: {e}"),
                code = e.error_code()
            );
            login_failure(&e)
        }
    }
}

async fn complete_login(
    state: &AppState,
    session: &AuthSession,
    params: &CallbackParams,
) -> Result<SessionProfile, HubError> {
    validate_state(session, params.state.as_deref()).await?;

    if let Some(error) = params.error.as_deref() {
        return Err(AuthError::ExchangeFailed(format!("provider returned error: {error}")).into());
    }

    let tokens = state
        .identity
        .exchange_code(params.code.as_deref().unwrap_or_default())
        .await?;
    let id_token = tokens
        .id_token
        .as_deref()
        .ok_or_else(|| AuthError::VerificationFailed("token response has no id_token".to_string()))?;
    let claims = state.identity.verify_identity_token(id_token).await?;

    let subject = claims.subject()?;
    let name = claims.display_name().unwrap_or(subject);
    let user = state
        .users
        .create_or_update(
            subject,
            ProfileFields {
                email: claims.email.as_deref().unwrap_or_default(),
                name,
                picture: claims.picture.as_deref().unwrap_or_default(),
            },
        )
        .await?;

    let profile = SessionProfile {
        sub: subject.to_string(),
        user_id: user.id,
        email: claims.email.clone(),
        name: name.to_string(),
        nickname: claims.nickname.clone(),
        picture: claims.picture.clone(),
    };

    session.cycle_id().await?;
    session.set_access_token(&tokens.access_token).await?;
    session.sign_in(&profile).await?;
    Ok(profile)
}

/// 登录流程失败时的纯文本响应，每种失败各有状态码与提示
fn login_failure(error: &HubError) -> Response {
    let (status, message) = match error {
        HubError::Auth(AuthError::CsrfMismatch) => (StatusCode::BAD_REQUEST, "Invalid state parameter."),
        HubError::Auth(AuthError::ExchangeFailed(_)) => (
            StatusCode::UNAUTHORIZED,
            "Failed to convert an authorization code into a token.",
        ),
        HubError::Auth(AuthError::VerificationFailed(_)) => {
            (StatusCode::UNAUTHORIZED, "Failed to verify ID Token.")
        }
        HubError::Auth(AuthError::ProfileInvalid) => {
            (StatusCode::BAD_REQUEST, "Identity token carries no subject.")
        }
        HubError::Auth(AuthError::Session(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save the session.")
        }
        _ => {
            lerror!(
                "system",
                LogStage::Callback,
                LogComponent::Users,
                "login_internal_error",
                &format!("登录流程内部错误: {error}")
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user profile.")
        }
    };
    (status, message).into_response()
}

/// 登出：清空会话并跳转到提供方登出页
pub async fn logout(State(state): State<AppState>, session: AuthSession) -> Response {
    if let Err(e) = session.clear().await {
        lerror!(
            "system",
            LogStage::Session,
            LogComponent::Session,
            "logout_clear_failed",
            &format!("清空会话失败: {e}")
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear the session.").into_response();
    }
    Redirect::temporary(&state.identity.logout_url()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_login_failure_has_distinct_response() {
        let failures = [
            HubError::from(AuthError::CsrfMismatch),
            HubError::from(AuthError::ExchangeFailed("x".into())),
            HubError::from(AuthError::VerificationFailed("x".into())),
            HubError::from(AuthError::ProfileInvalid),
        ];
        let statuses: Vec<_> = failures.iter().map(|e| login_failure(e).status()).collect();

        assert_eq!(
            statuses,
            vec![
                StatusCode::BAD_REQUEST,
                StatusCode::UNAUTHORIZED,
                StatusCode::UNAUTHORIZED,
                StatusCode::BAD_REQUEST
            ]
        );
    }

    #[test]
    fn test_database_failure_is_server_error() {
        let response = login_failure(&HubError::database("locked"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
