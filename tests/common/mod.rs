//! # 集成测试公共设施
//!
//! 以 wiremock 模拟身份提供方与照片服务，数据库使用内存 SQLite。

#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use eventhub::{
    AppConfig,
    app::{AppContext, AppState},
    database,
    web::build_router,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "hub-client";
pub const CLIENT_SECRET: &str = "hub-client-secret-for-tests";
pub const FRONTEND: &str = "https://web.example.com";
pub const RS256_SIGNING_PEM: &str = include_str!("../fixtures/rs256_signing.pem");
pub const RS256_OTHER_PEM: &str = include_str!("../fixtures/rs256_other.pem");

/// 一个完整的测试应用实例
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identity: MockServer,
    pub google: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let identity = MockServer::start().await;
        let google = MockServer::start().await;

        let env = HashMap::from([
            ("AUTH0_DOMAIN", identity.uri()),
            ("AUTH0_CLIENT_ID", CLIENT_ID.to_string()),
            ("AUTH0_CLIENT_SECRET", CLIENT_SECRET.to_string()),
            ("AUTH0_CALLBACK_URL", "https://app.example.com/callback".to_string()),
            ("GOOGLE_CLIENT_ID", "google-id".to_string()),
            ("GOOGLE_CLIENT_SECRET", "google-secret".to_string()),
            (
                "GOOGLE_REDIRECT_URI",
                "https://app.example.com/oauth/secondary/callback".to_string(),
            ),
            ("GOOGLE_AUTH_URL", format!("{}/o/oauth2/v2/auth", google.uri())),
            ("GOOGLE_TOKEN_URL", format!("{}/token", google.uri())),
            ("GOOGLE_PHOTOS_API_BASE", format!("{}/v1", google.uri())),
            ("FRONTEND_REDIRECT_BASE_URL", FRONTEND.to_string()),
            ("SESSION_SECRET", "s".repeat(64)),
            ("DATABASE_URL", "sqlite::memory:".to_string()),
        ]);
        let config = AppConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        let db = database::init_database(&config.database).await.unwrap();
        database::run_migrations(&db).await.unwrap();
        let state = AppState::new(AppContext::new(config.into(), db).unwrap());

        Self {
            router: build_router(state.clone()),
            state,
            identity,
            google,
        }
    }

    /// 以同一数据库重建路由，模拟进程重启
    pub fn restart(&mut self) {
        self.router = build_router(self.state.clone());
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(&self, uri: &str, cookie: Option<&str>, body: &Value) -> Response<Body> {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// 令牌端点返回签名正确的身份令牌
    pub async fn mock_identity_token(&self, claims: &Value) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "primary-access-token",
                "id_token": sign_id_token(claims),
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .mount(&self.identity)
            .await;
    }

    /// 身份提供方以 RS256 签发令牌，并在 JWKS 端点公布对应公钥
    pub async fn mock_identity_rs256_token(&self, claims: &Value, signing_pem: &str) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(include_str!("../fixtures/rs256_jwks.json"), "application/json"),
            )
            .mount(&self.identity)
            .await;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("rs256-test-key".to_string());
        let id_token = encode(
            &header,
            claims,
            &EncodingKey::from_rsa_pem(signing_pem.as_bytes()).unwrap(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "primary-access-token",
                "id_token": id_token,
                "token_type": "Bearer",
            })))
            .mount(&self.identity)
            .await;
    }

    /// 完成一次登录，返回登录后的会话 Cookie
    pub async fn login(&self, claims: &Value) -> String {
        self.mock_identity_token(claims).await;

        let start = self.get("/login", None).await;
        let cookie = session_cookie(&start).unwrap();
        let state = query_param(&location(&start), "state").unwrap();

        let callback = self
            .get(&format!("/callback?code=auth-code&state={state}"), Some(&cookie))
            .await;
        assert_eq!(callback.status(), 307);
        session_cookie(&callback).unwrap_or(cookie)
    }

    pub fn issuer(&self) -> String {
        format!("{}/", self.identity.uri())
    }

    /// 默认的身份令牌声明
    pub fn claims(&self, sub: &str) -> Value {
        json!({
            "sub": sub,
            "email": "alice@example.com",
            "name": "Alice",
            "picture": "https://cdn.example.com/alice.png",
            "iss": self.issuer(),
            "aud": CLIENT_ID,
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }
}

pub fn sign_id_token(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(CLIENT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// 取出响应设置的会话 Cookie（`name=value` 部分）
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("auth-session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
