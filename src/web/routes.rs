//! # 路由配置
//!
//! 页面路由使用重定向型认证，`/api` 下的接口使用 JSON 型认证。
//! 会话层包在最外侧，所有路由共享同一个会话 Cookie。

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sha2::{Digest, Sha512};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tower_sessions::{Expiry, SessionManagerLayer, cookie::Key, service::SignedCookie};

use super::handlers::{auth, photos, user};
use crate::app::AppState;
use crate::auth::{SESSION_COOKIE_NAME, SqlSessionStore, require_api_user, require_session};
use crate::config::SessionConfig;

/// 登录前的会话闲置超过该时长后失效
const SESSION_IDLE_HOURS: i64 = 24;

/// 创建完整路由
pub fn build_router(state: AppState) -> Router {
    let protected_pages = Router::new()
        .route("/user", get(user::profile))
        .route("/oauth/secondary/connect", get(photos::connect))
        .route_layer(middleware::from_fn(require_session));

    let api = Router::new()
        .route("/me", get(user::me))
        .route("/user/photos-status", get(photos::status))
        .route("/photos/albums", post(photos::create_album))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_user));

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let sessions = session_layer(SqlSessionStore::new(state.db.clone()), &state.config.session);

    Router::new()
        .route("/", get(user::home))
        .route("/login", get(auth::login))
        .route("/signup", get(auth::signup))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/oauth/secondary/callback", get(photos::callback))
        .merge(protected_pages)
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(sessions),
        )
        .with_state(state)
}

/// 签名 Cookie 的会话层
///
/// 签名密钥由会话密钥经 SHA-512 派生，满足 64 字节的长度要求。
fn session_layer(
    store: SqlSessionStore,
    config: &SessionConfig,
) -> SessionManagerLayer<SqlSessionStore, SignedCookie> {
    let key = Key::from(Sha512::digest(config.secret.expose().as_bytes()).as_slice());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_signed(key)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(SESSION_IDLE_HOURS)))
        .with_http_only(true)
        .with_path("/")
        .with_secure(config.secure)
        .with_same_site(config.same_site.into())
}
