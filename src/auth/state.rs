//! # CSRF state 握手
//!
//! 每次发起登录生成一个随机 state 存入会话，回调时严格比对并立即作废。

use base64::engine::{Engine, general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

use super::session::AuthSession;
use crate::error::AuthError;

/// state 的随机字节数
pub const STATE_ENTROPY_BYTES: usize = 32;

/// 生成 URL 安全的随机 state
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 生成 state 并写入会话，返回值用于拼接授权地址
pub async fn issue_state(session: &AuthSession) -> Result<String, AuthError> {
    let nonce = generate_state();
    session.set_pending_state(&nonce).await?;
    Ok(nonce)
}

/// 校验回调携带的 state
///
/// 会话中没有 state 或不相等均视为 `CsrfMismatch`。校验成功后 state 被删除，
/// 同一个 state 不能通过两次；校验失败时会话保持不变。
pub async fn validate_state(session: &AuthSession, received: Option<&str>) -> Result<(), AuthError> {
    let stored = session.pending_state().await?;
    ensure_matches(stored.as_deref(), received)?;
    session.take_pending_state().await?;
    Ok(())
}

/// 照片服务授权流程的 state
pub async fn issue_link_state(session: &AuthSession) -> Result<String, AuthError> {
    let nonce = generate_state();
    session.set_pending_link_state(&nonce).await?;
    Ok(nonce)
}

/// 校验照片服务回调的 state，规则同 [`validate_state`]
pub async fn validate_link_state(session: &AuthSession, received: Option<&str>) -> Result<(), AuthError> {
    let stored = session.pending_link_state().await?;
    ensure_matches(stored.as_deref(), received)?;
    session.take_pending_link_state().await?;
    Ok(())
}

fn ensure_matches(stored: Option<&str>, received: Option<&str>) -> Result<(), AuthError> {
    match (stored, received) {
        (Some(stored), Some(received)) if !received.is_empty() && stored == received => Ok(()),
        _ => Err(AuthError::CsrfMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::memory_session;

    #[test]
    fn test_generated_state_is_url_safe_and_unique() {
        let a = generate_state();
        let b = generate_state();

        assert_ne!(a, b);
        // 32 字节无填充 base64
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_issued_state_validates_exactly_once() {
        let session = memory_session();
        let nonce = issue_state(&session).await.unwrap();

        assert!(validate_state(&session, Some(&nonce)).await.is_ok());
        assert!(matches!(
            validate_state(&session, Some(&nonce)).await,
            Err(AuthError::CsrfMismatch)
        ));
    }

    #[tokio::test]
    async fn test_wrong_state_rejected_and_pending_kept() {
        let session = memory_session();
        let nonce = issue_state(&session).await.unwrap();

        assert!(matches!(
            validate_state(&session, Some("WRONG")).await,
            Err(AuthError::CsrfMismatch)
        ));
        assert_eq!(session.pending_state().await.unwrap(), Some(nonce));
    }

    #[tokio::test]
    async fn test_validation_without_issuance_fails() {
        let session = memory_session();

        assert!(validate_state(&session, Some("anything")).await.is_err());
        assert!(validate_state(&session, None).await.is_err());
    }

    #[tokio::test]
    async fn test_login_and_link_states_are_independent() {
        let session = memory_session();
        let login = issue_state(&session).await.unwrap();
        let link = issue_link_state(&session).await.unwrap();

        assert!(validate_state(&session, Some(&link)).await.is_err());
        assert!(validate_link_state(&session, Some(&login)).await.is_err());
        assert!(validate_link_state(&session, Some(&link)).await.is_ok());
        assert!(validate_state(&session, Some(&login)).await.is_ok());
    }

    #[tokio::test]
    async fn test_new_issuance_supersedes_previous() {
        let session = memory_session();
        let first = issue_state(&session).await.unwrap();
        let second = issue_state(&session).await.unwrap();

        assert!(validate_state(&session, Some(&first)).await.is_err());
        assert!(validate_state(&session, Some(&second)).await.is_ok());
    }
}
