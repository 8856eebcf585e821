//! # 主身份提供方客户端
//!
//! 负责授权码模式的三步：拼接授权地址、用授权码换取令牌、校验身份令牌。
//! 令牌交换直接以表单请求令牌端点，以便拿到响应中的 `id_token`。

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use super::jwks::JwksCache;
use crate::config::IdentityProviderConfig;
use crate::error::{AuthError, HubError, Result};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 登录请求的 scope
pub const LOGIN_SCOPES: &str = "openid profile email";

/// 身份令牌时间校验的容差（秒）
pub const CLOCK_LEEWAY_SECS: u64 = 60;

/// 令牌端点的成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// 已验证身份令牌中的声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl IdentityClaims {
    /// 非空的 subject id
    pub fn subject(&self) -> std::result::Result<&str, AuthError> {
        non_empty(self.sub.as_deref()).ok_or(AuthError::ProfileInvalid)
    }

    /// 显示名：`name`，其次 `nickname`，再次 `email`
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(self.nickname.as_deref()))
            .or_else(|| non_empty(self.email.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 主身份提供方客户端
pub struct IdentityClient {
    config: IdentityProviderConfig,
    http: reqwest::Client,
    authorize_endpoint: Url,
    jwks: JwksCache,
}

impl IdentityClient {
    pub fn new(config: IdentityProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HubError::internal_with_source("无法创建身份提供方HTTP客户端", e))?;
        let authorize_endpoint = Url::parse(&config.authorize_url())
            .map_err(|e| HubError::config_with_source("授权端点地址无效", e))?;
        let jwks = JwksCache::new(http.clone(), config.jwks_url());

        Ok(Self {
            config,
            http,
            authorize_endpoint,
            jwks,
        })
    }

    /// 拼接授权地址，不发起网络请求
    #[must_use]
    pub fn authorization_url(&self, state: &str, screen_hint: Option<&str>) -> Url {
        let mut url = self.authorize_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.callback_url.as_str())
                .append_pair("scope", LOGIN_SCOPES)
                .append_pair("state", state);
            if let Some(hint) = screen_hint {
                query.append_pair("screen_hint", hint);
            }
        }
        url
    }

    /// 登出地址，`returnTo` 为回调地址所在站点的根路径
    #[must_use]
    pub fn logout_url(&self) -> String {
        let mut return_to = self.config.callback_url.clone();
        return_to.set_path("");
        return_to.set_query(None);
        return_to.set_fragment(None);

        format!(
            "{}?returnTo={}&client_id={}",
            self.config.logout_url(),
            urlencoding::encode(return_to.as_str()),
            urlencoding::encode(&self.config.client_id)
        )
    }

    /// 用授权码换取令牌
    ///
    /// 授权码只能使用一次，失败后不重试。
    pub async fn exchange_code(&self, code: &str) -> std::result::Result<ProviderTokens, AuthError> {
        if code.is_empty() {
            return Err(AuthError::ExchangeFailed("missing authorization code".to_string()));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose()),
            ("code", code),
            ("redirect_uri", self.config.callback_url.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ProviderErrorBody>(&body).map_or_else(
                |_| format!("HTTP {status}"),
                |err| {
                    format!(
                        "HTTP {status}: {} {}",
                        err.error,
                        err.error_description.unwrap_or_default()
                    )
                },
            );
            lwarn!(
                "system",
                LogStage::TokenExchange,
                LogComponent::Identity,
                "code_exchange_rejected",
                "身份提供方拒绝授权码",
                status = status.as_u16()
            );
            return Err(AuthError::ExchangeFailed(reason));
        }

        let tokens = response
            .json::<ProviderTokens>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("malformed token response: {e}")))?;

        ldebug!(
            "system",
            LogStage::TokenExchange,
            LogComponent::Identity,
            "code_exchanged",
            "授权码交换成功",
            has_id_token = tokens.id_token.is_some()
        );
        Ok(tokens)
    }

    /// 校验身份令牌并提取声明
    ///
    /// `RS256` 使用 JWKS 公钥，`HS256` 使用客户端密钥，其余算法一律拒绝。
    /// 签发方、受众与过期时间都必须通过校验。
    pub async fn verify_identity_token(
        &self,
        token: &str,
    ) -> std::result::Result<IdentityClaims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::VerificationFailed(format!("malformed token header: {e}")))?;

        let key = match header.alg {
            Algorithm::RS256 => {
                let kid = header.kid.ok_or_else(|| {
                    AuthError::VerificationFailed("token header has no key id".to_string())
                })?;
                self.jwks.decoding_key(&kid).await?
            }
            Algorithm::HS256 => DecodingKey::from_secret(self.config.client_secret.expose().as_bytes()),
            other => {
                return Err(AuthError::VerificationFailed(format!(
                    "unsupported signing algorithm {other:?}"
                )));
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = CLOCK_LEEWAY_SECS;

        let data = decode::<IdentityClaims>(token, &key, &validation)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use pretty_assertions::assert_eq;

    const SECRET: &str = "identity-client-secret";

    fn client(base_url: &str) -> IdentityClient {
        IdentityClient::new(IdentityProviderConfig {
            base_url: base_url.to_string(),
            client_id: "client-123".to_string(),
            client_secret: SecretString::new(SECRET),
            callback_url: Url::parse("https://app.example.com/callback").unwrap(),
        })
        .unwrap()
    }

    fn sign(claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> serde_json::Value {
        serde_json::json!({
            "sub": "auth0|123",
            "email": "a@b.com",
            "name": "A",
            "iss": "https://tenant.auth0.com/",
            "aud": "client-123",
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }

    #[test]
    fn test_authorization_url_carries_all_parameters() {
        let url = client("https://tenant.auth0.com").authorization_url("nonce-1", Some("signup"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/authorize");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(pairs["scope"], "openid profile email");
        assert_eq!(pairs["state"], "nonce-1");
        assert_eq!(pairs["screen_hint"], "signup");
    }

    #[test]
    fn test_login_url_has_no_screen_hint() {
        let url = client("https://tenant.auth0.com").authorization_url("nonce-1", None);
        assert!(url.query_pairs().all(|(k, _)| k != "screen_hint"));
    }

    #[test]
    fn test_logout_url_returns_to_site_root() {
        let url = client("https://tenant.auth0.com").logout_url();
        assert_eq!(
            url,
            "https://tenant.auth0.com/v2/logout?returnTo=https%3A%2F%2Fapp.example.com%2F&client_id=client-123"
        );
    }

    #[tokio::test]
    async fn test_hs256_token_verified() {
        let claims = client("https://tenant.auth0.com")
            .verify_identity_token(&sign(&valid_claims()))
            .await
            .unwrap();

        assert_eq!(claims.subject().unwrap(), "auth0|123");
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let mut claims = valid_claims();
        claims["aud"] = "someone-else".into();

        let result = client("https://tenant.auth0.com")
            .verify_identity_token(&sign(&claims))
            .await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let mut claims = valid_claims();
        claims["iss"] = "https://evil.example.com/".into();

        let result = client("https://tenant.auth0.com")
            .verify_identity_token(&sign(&claims))
            .await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let mut claims = valid_claims();
        claims["exp"] = (chrono::Utc::now().timestamp() - 3600).into();

        let result = client("https://tenant.auth0.com")
            .verify_identity_token(&sign(&claims))
            .await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &valid_claims(),
            &EncodingKey::from_secret(b"not-the-client-secret"),
        )
        .unwrap();

        let result = client("https://tenant.auth0.com").verify_identity_token(&token).await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    const RS256_KID: &str = "rs256-test-key";
    const RS256_SIGNING_PEM: &str = include_str!("../../tests/fixtures/rs256_signing.pem");
    const RS256_OTHER_PEM: &str = include_str!("../../tests/fixtures/rs256_other.pem");
    const RS256_JWKS: &str = include_str!("../../tests/fixtures/rs256_jwks.json");

    async fn jwks_server() -> wiremock::MockServer {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(RS256_JWKS, "application/json"))
            .mount(&server)
            .await;
        server
    }

    fn sign_rs256(pem: &str, kid: &str, issuer: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let mut claims = valid_claims();
        claims["iss"] = issuer.into();
        encode(&header, &claims, &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_rs256_token_verified_through_jwks() {
        let server = jwks_server().await;
        let issuer = format!("{}/", server.uri());

        let claims = client(&server.uri())
            .verify_identity_token(&sign_rs256(RS256_SIGNING_PEM, RS256_KID, &issuer))
            .await
            .unwrap();

        assert_eq!(claims.subject().unwrap(), "auth0|123");
    }

    #[tokio::test]
    async fn test_rs256_token_from_other_key_rejected() {
        let server = jwks_server().await;
        let issuer = format!("{}/", server.uri());

        let result = client(&server.uri())
            .verify_identity_token(&sign_rs256(RS256_OTHER_PEM, RS256_KID, &issuer))
            .await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_rs256_token_with_unknown_kid_rejected() {
        let server = jwks_server().await;
        let issuer = format!("{}/", server.uri());

        let result = client(&server.uri())
            .verify_identity_token(&sign_rs256(RS256_SIGNING_PEM, "retired-key", &issuer))
            .await;
        match result {
            Err(AuthError::VerificationFailed(reason)) => assert!(reason.contains("retired-key")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let result = client("https://tenant.auth0.com")
            .verify_identity_token("not-a-jwt")
            .await;
        assert!(matches!(result, Err(AuthError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_code_never_hits_network() {
        // 指向不可达地址，若发起请求会得到传输错误而非该消息
        let result = client("http://127.0.0.1:9").exchange_code("").await;
        match result {
            Err(AuthError::ExchangeFailed(reason)) => assert!(reason.contains("missing")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_display_name_fallback_order() {
        let mut claims = IdentityClaims {
            sub: Some("auth0|1".to_string()),
            email: Some("x@y.com".to_string()),
            name: None,
            nickname: Some("bob".to_string()),
            picture: None,
        };
        assert_eq!(claims.display_name(), Some("bob"));

        claims.nickname = None;
        assert_eq!(claims.display_name(), Some("x@y.com"));

        claims.name = Some("Bob Smith".to_string());
        assert_eq!(claims.display_name(), Some("Bob Smith"));

        claims.name = Some("  ".to_string());
        claims.email = None;
        assert_eq!(claims.display_name(), None);
    }

    #[test]
    fn test_missing_subject_is_profile_invalid() {
        let claims = IdentityClaims::default();
        assert!(matches!(claims.subject(), Err(AuthError::ProfileInvalid)));
    }
}
