//! # 应用配置结构定义

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::TimeDelta;
use tower_sessions::cookie::SameSite;
use url::Url;

use super::DatabaseConfig;
use crate::error::{HubError, Result};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_GOOGLE_PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com/v1";
const DEFAULT_GOOGLE_PHOTOS_SCOPES: &str = "https://www.googleapis.com/auth/photoslibrary.sharing \
     https://www.googleapis.com/auth/photoslibrary.appendonly";

/// 会话签名密钥的最小长度（字节）
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// 不会出现在 `Debug` 输出中的敏感字符串
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 取出明文，仅用于发往提供方或签名
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// 应用主配置结构
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 主身份提供方（Auth0）配置
    pub identity: IdentityProviderConfig,
    /// 照片提供方（Google Photos）配置
    pub photos: PhotosProviderConfig,
    /// 会话 Cookie 配置
    pub session: SessionConfig,
    /// 前端基础地址，用于拼接照片授权完成后的跳转目标
    pub frontend_base_url: String,
}

/// HTTP 服务配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// 单个请求的超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 主身份提供方配置
#[derive(Debug, Clone)]
pub struct IdentityProviderConfig {
    /// 提供方基础地址，不带末尾斜杠
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: Url,
}

impl IdentityProviderConfig {
    /// 授权端点
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    /// 令牌端点
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    /// JWKS 端点
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.base_url)
    }

    /// 登出端点
    #[must_use]
    pub fn logout_url(&self) -> String {
        format!("{}/v2/logout", self.base_url)
    }

    /// 身份令牌中期望的 `iss`
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/", self.base_url)
    }
}

/// 照片提供方配置
#[derive(Debug, Clone)]
pub struct PhotosProviderConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    pub auth_url: Url,
    pub token_url: Url,
    /// REST API 基础地址，不带末尾斜杠
    pub api_base: String,
    pub scopes: Vec<String>,
    /// 距离过期不足该时长时视为需要刷新
    pub refresh_threshold: TimeDelta,
}

/// Cookie 的 `SameSite` 策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    None,
    Lax,
    Strict,
}

impl FromStr for SameSitePolicy {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            other => Err(HubError::config(format!(
                "SESSION_SAME_SITE 取值无效: {other}（可选 none / lax / strict）"
            ))),
        }
    }
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::None => Self::None,
            SameSitePolicy::Lax => Self::Lax,
            SameSitePolicy::Strict => Self::Strict,
        }
    }
}

/// 会话 Cookie 配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 签名密钥
    pub secret: SecretString,
    pub secure: bool,
    pub same_site: SameSitePolicy,
}

impl AppConfig {
    /// 通过查找函数构建配置
    ///
    /// 生产环境传入环境变量读取函数，测试传入内存映射。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let server = ServerConfig {
            bind_address: env
                .optional("BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
                .parse()
                .map_err(|e| HubError::config_with_source("BIND_ADDRESS 不是合法的监听地址", e))?,
            request_timeout_secs: env.positive("REQUEST_TIMEOUT_SECS", 30)?,
        };

        let database = DatabaseConfig {
            url: env
                .optional("DATABASE_URL")
                .unwrap_or_else(|| super::database::DEFAULT_DATABASE_URL.to_string()),
            max_connections: env.positive("DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let identity = IdentityProviderConfig {
            base_url: identity_base_url(&env.required("AUTH0_DOMAIN")?)?,
            client_id: env.required("AUTH0_CLIENT_ID")?,
            client_secret: SecretString::new(env.required("AUTH0_CLIENT_SECRET")?),
            callback_url: env.url("AUTH0_CALLBACK_URL")?,
        };

        let scopes: Vec<String> = env
            .optional("GOOGLE_PHOTOS_SCOPES")
            .unwrap_or_else(|| DEFAULT_GOOGLE_PHOTOS_SCOPES.to_string())
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if scopes.is_empty() {
            return Err(HubError::config("GOOGLE_PHOTOS_SCOPES 不能为空"));
        }

        let threshold_secs: i64 = env.positive("PHOTOS_REFRESH_THRESHOLD_SECS", 60)?;
        let refresh_threshold = TimeDelta::try_seconds(threshold_secs).ok_or_else(|| {
            HubError::config(format!("PHOTOS_REFRESH_THRESHOLD_SECS 超出范围: {threshold_secs}"))
        })?;

        let photos = PhotosProviderConfig {
            client_id: env.required("GOOGLE_CLIENT_ID")?,
            client_secret: SecretString::new(env.required("GOOGLE_CLIENT_SECRET")?),
            redirect_uri: env.url("GOOGLE_REDIRECT_URI")?,
            auth_url: env.url_or("GOOGLE_AUTH_URL", DEFAULT_GOOGLE_AUTH_URL)?,
            token_url: env.url_or("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL)?,
            api_base: env
                .url_or("GOOGLE_PHOTOS_API_BASE", DEFAULT_GOOGLE_PHOTOS_API_BASE)?
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            scopes,
            refresh_threshold,
        };

        let secret = env.required("SESSION_SECRET")?;
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(HubError::config(format!(
                "SESSION_SECRET 长度至少为 {MIN_SESSION_SECRET_LEN} 字节"
            )));
        }
        let session = SessionConfig {
            secret: SecretString::new(secret),
            secure: env.flag("SESSION_SECURE", true)?,
            same_site: env
                .optional("SESSION_SAME_SITE")
                .map_or(Ok(SameSitePolicy::None), |v| v.parse::<SameSitePolicy>())?,
        };
        if session.same_site == SameSitePolicy::None && !session.secure {
            return Err(HubError::config(
                "SESSION_SAME_SITE=none 需要同时启用 SESSION_SECURE",
            ));
        }

        let frontend = env.url("FRONTEND_REDIRECT_BASE_URL")?;

        Ok(Self {
            server,
            database,
            identity,
            photos,
            session,
            frontend_base_url: frontend.as_str().trim_end_matches('/').to_string(),
        })
    }
}

/// `AUTH0_DOMAIN` 既可以是裸域名，也可以是完整的基础地址
fn identity_base_url(domain: &str) -> Result<String> {
    let candidate = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    };
    let parsed = Url::parse(&candidate)
        .map_err(|e| HubError::config_with_source("AUTH0_DOMAIN 无法解析为地址", e))?;
    if parsed.host_str().is_none() {
        return Err(HubError::config("AUTH0_DOMAIN 缺少主机名"));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| HubError::config(format!("缺少必需的环境变量: {key}")))
    }

    fn url(&self, key: &str) -> Result<Url> {
        Url::parse(&self.required(key)?)
            .map_err(|e| HubError::config_with_source(format!("{key} 不是合法的URL"), e))
    }

    fn url_or(&self, key: &str, default: &str) -> Result<Url> {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        Url::parse(&raw).map_err(|e| HubError::config_with_source(format!("{key} 不是合法的URL"), e))
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        let value: T = raw
            .parse()
            .map_err(|e| HubError::config_with_source(format!("{key} 必须是数字"), e))?;
        if value <= T::default() {
            return Err(HubError::config(format!("{key} 必须为正数")));
        }
        Ok(value)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(HubError::config(format!("{key} 不是合法的布尔值: {v}"))),
        }
    }
}
