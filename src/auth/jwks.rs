//! # JWKS 缓存
//!
//! 拉取身份提供方公布的签名公钥，按 `kid` 查找，缓存一小时；
//! 遇到未知 `kid` 时强制重新拉取一次以应对密钥轮换。

use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AuthError;
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 公钥缓存有效期
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// JWKS 中的单个公钥
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS 文档
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// 带过期时间的 JWKS 缓存
pub struct JwksCache {
    http: reqwest::Client,
    jwks_url: String,
    ttl: Duration,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    #[must_use]
    pub fn new(http: reqwest::Client, jwks_url: String) -> Self {
        Self {
            http,
            jwks_url,
            ttl: JWKS_CACHE_TTL,
            cached: RwLock::new(None),
        }
    }

    /// 按 `kid` 取得 RSA 验签公钥
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.cached.read().await;
            let fresh = cached
                .as_ref()
                .filter(|entry| entry.fetched_at.elapsed() < self.ttl);
            if let Some(jwk) = fresh.and_then(|entry| entry.keys.find(kid)) {
                return rsa_key(jwk);
            }
        }

        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Jwks,
            "jwks_refetch",
            "JWKS 缓存未命中，重新拉取",
            kid = kid
        );
        let keys = self.fetch().await?;
        let result = keys.find(kid).map(rsa_key);

        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        result.unwrap_or_else(|| {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::Jwks,
                "unknown_kid",
                "身份令牌引用了未知的签名密钥",
                kid = kid
            );
            Err(AuthError::VerificationFailed(format!("unknown signing key id: {kid}")))
        })
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::VerificationFailed(format!("failed to fetch JWKS: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::VerificationFailed(format!(
                "JWKS endpoint returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::VerificationFailed(format!("failed to parse JWKS: {e}")))
    }
}

fn rsa_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        return Err(AuthError::VerificationFailed(format!(
            "signing key {} is not an RSA key",
            jwk.kid
        )));
    }
    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        return Err(AuthError::VerificationFailed(format!(
            "signing key {} lacks RSA components",
            jwk.kid
        )));
    };
    DecodingKey::from_rsa_components(n, e)
        .map_err(|e| AuthError::VerificationFailed(format!("invalid RSA key: {e}")))
}
