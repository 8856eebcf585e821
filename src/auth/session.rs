//! # 会话视图
//!
//! 对 `tower_sessions::Session` 的类型化封装。处理器只通过这里读写会话，
//! 不直接接触字符串键。

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_sessions::{Expiry, Session};
use uuid::Uuid;

use crate::error::AuthError;

/// 会话 Cookie 名称
pub const SESSION_COOKIE_NAME: &str = "auth-session";

const STATE_KEY: &str = "state";
const LINK_STATE_KEY: &str = "photos_link_state";
const PROFILE_KEY: &str = "profile";
const ACCESS_TOKEN_KEY: &str = "access_token";
const LOGGED_IN_AT_KEY: &str = "logged_in_at";

/// 登录态的最长有效期，从登录时刻起算，不随访问顺延
pub const LOGIN_LIFETIME: time::Duration = time::Duration::hours(24);

/// 登录成功后写入会话的用户资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// 身份提供方的 subject id
    pub sub: String,
    /// 本地用户 id
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// 类型化的会话访问器
#[derive(Debug, Clone)]
pub struct AuthSession {
    session: Session,
}

impl AuthSession {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// 当前待校验的 state
    pub async fn pending_state(&self) -> Result<Option<String>, AuthError> {
        Ok(self.session.get::<String>(STATE_KEY).await?)
    }

    /// 写入新的 state，覆盖此前未完成的握手
    pub async fn set_pending_state(&self, nonce: &str) -> Result<(), AuthError> {
        self.session.insert(STATE_KEY, nonce).await?;
        Ok(())
    }

    /// 取出并删除 state
    pub async fn take_pending_state(&self) -> Result<Option<String>, AuthError> {
        Ok(self.session.remove::<String>(STATE_KEY).await?)
    }

    /// 照片服务授权流程待校验的 state，与登录 state 互不覆盖
    pub async fn pending_link_state(&self) -> Result<Option<String>, AuthError> {
        Ok(self.session.get::<String>(LINK_STATE_KEY).await?)
    }

    pub async fn set_pending_link_state(&self, nonce: &str) -> Result<(), AuthError> {
        self.session.insert(LINK_STATE_KEY, nonce).await?;
        Ok(())
    }

    pub async fn take_pending_link_state(&self) -> Result<Option<String>, AuthError> {
        Ok(self.session.remove::<String>(LINK_STATE_KEY).await?)
    }

    /// 当前登录资料；登录已超过 [`LOGIN_LIFETIME`] 时清空会话并返回 `None`
    pub async fn profile(&self) -> Result<Option<SessionProfile>, AuthError> {
        let Some(profile) = self.session.get::<SessionProfile>(PROFILE_KEY).await? else {
            return Ok(None);
        };

        let logged_in_at = self.session.get::<i64>(LOGGED_IN_AT_KEY).await?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match logged_in_at {
            Some(at) if now - at < LOGIN_LIFETIME.whole_seconds() => Ok(Some(profile)),
            _ => {
                self.session.flush().await?;
                Ok(None)
            }
        }
    }

    /// 写入登录资料并记录登录时刻，会话到期时间固定为登录后 [`LOGIN_LIFETIME`]
    pub async fn sign_in(&self, profile: &SessionProfile) -> Result<(), AuthError> {
        let now = OffsetDateTime::now_utc();
        self.session.insert(PROFILE_KEY, profile).await?;
        self.session
            .insert(LOGGED_IN_AT_KEY, now.unix_timestamp())
            .await?;
        self.session
            .set_expiry(Some(Expiry::AtDateTime(now + LOGIN_LIFETIME)));
        Ok(())
    }

    /// 保存主身份提供方的访问令牌，只存在于会话中
    pub async fn set_access_token(&self, token: &str) -> Result<(), AuthError> {
        self.session.insert(ACCESS_TOKEN_KEY, token).await?;
        Ok(())
    }

    /// 更换会话 id，防止会话固定攻击
    pub async fn cycle_id(&self) -> Result<(), AuthError> {
        self.session.cycle_id().await?;
        Ok(())
    }

    /// 清空会话并删除存储中的记录
    pub async fn clear(&self) -> Result<(), AuthError> {
        self.session.flush().await?;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(Self::new(session))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    pub(crate) fn memory_session() -> AuthSession {
        AuthSession::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let session = memory_session();
        assert!(session.profile().await.unwrap().is_none());

        let profile = SessionProfile {
            sub: "auth0|123".to_string(),
            user_id: Uuid::new_v4(),
            email: Some("a@b.com".to_string()),
            name: "A".to_string(),
            nickname: None,
            picture: None,
        };
        session.sign_in(&profile).await.unwrap();

        assert_eq!(session.profile().await.unwrap(), Some(profile));
    }

    fn sample_profile() -> SessionProfile {
        SessionProfile {
            sub: "auth0|456".to_string(),
            user_id: Uuid::new_v4(),
            email: None,
            name: "B".to_string(),
            nickname: None,
            picture: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_pins_absolute_expiry() {
        let session = memory_session();
        let before = OffsetDateTime::now_utc();

        session.sign_in(&sample_profile()).await.unwrap();

        assert!(matches!(session.session.expiry(), Some(Expiry::AtDateTime(_))));
        let remaining = session.session.expiry_date() - before;
        assert!(remaining <= LOGIN_LIFETIME + time::Duration::seconds(1));
        assert!(remaining > LOGIN_LIFETIME - time::Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_login_older_than_lifetime_is_dropped() {
        let session = memory_session();
        session.sign_in(&sample_profile()).await.unwrap();

        let stale = OffsetDateTime::now_utc() - LOGIN_LIFETIME - time::Duration::minutes(1);
        session
            .session
            .insert(LOGGED_IN_AT_KEY, stale.unix_timestamp())
            .await
            .unwrap();

        assert!(session.profile().await.unwrap().is_none());
        assert!(session.session.get::<SessionProfile>(PROFILE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_without_login_time_is_dropped() {
        let session = memory_session();
        session
            .session
            .insert(PROFILE_KEY, sample_profile())
            .await
            .unwrap();

        assert!(session.profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let session = memory_session();
        session.set_pending_state("nonce").await.unwrap();
        session.set_access_token("token").await.unwrap();

        session.clear().await.unwrap();

        assert!(session.pending_state().await.unwrap().is_none());
        assert!(session.profile().await.unwrap().is_none());
    }
}
