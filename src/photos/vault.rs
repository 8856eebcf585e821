//! # 照片服务令牌库
//!
//! 按用户保存照片服务的访问令牌、刷新令牌与过期时间，使用前按需刷新并回写。
//!
//! 同一用户的并发请求可能同时判定需要刷新，各自刷新成功后按写入先后覆盖，
//! 数据库中保留最后一次写入的结果。这里不加锁。

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use entity::users;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use url::Url;
use uuid::Uuid;

use super::client::PhotosClient;
use crate::config::PhotosProviderConfig;
use crate::error::{HubError, Result, VaultError};
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

type PhotosOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// 刷新判定策略
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// 距离过期不足该时长即刷新
    pub refresh_threshold: TimeDelta,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            refresh_threshold: TimeDelta::seconds(60),
        }
    }
}

impl RefreshPolicy {
    /// 没有过期时间的令牌视为长期有效
    #[must_use]
    pub fn needs_refresh(&self, expiry: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
        expiry.is_some_and(|expiry| expiry - now <= self.refresh_threshold)
    }
}

/// 一组必须同时写入的令牌字段
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenSet {
    access_token: String,
    refresh_token: Option<String>,
    expiry: Option<NaiveDateTime>,
}

impl TokenSet {
    /// 提供方未轮换刷新令牌时沿用旧值
    fn from_response<T: TokenResponse>(response: &T, previous_refresh: Option<&str>) -> Self {
        let expiry = response
            .expires_in()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .map(|d| Utc::now().naive_utc() + d);

        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous_refresh.map(str::to_string)),
            expiry,
        }
    }
}

/// 照片服务令牌库
pub struct TokenVault {
    db: DatabaseConnection,
    oauth: PhotosOAuthClient,
    http: reqwest::Client,
    api_base: String,
    scopes: Vec<String>,
    policy: RefreshPolicy,
}

impl TokenVault {
    pub fn new(db: DatabaseConnection, config: &PhotosProviderConfig) -> Result<Self> {
        let oauth = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.expose().to_string()))
            .set_auth_uri(AuthUrl::from_url(config.auth_url.clone()))
            .set_token_uri(TokenUrl::from_url(config.token_url.clone()))
            .set_redirect_uri(RedirectUrl::from_url(config.redirect_uri.clone()))
            .set_auth_type(AuthType::RequestBody);

        // 令牌端点不应跟随重定向
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HubError::internal_with_source("无法创建照片服务HTTP客户端", e))?;

        Ok(Self {
            db,
            oauth,
            http,
            api_base: config.api_base.clone(),
            scopes: config.scopes.clone(),
            policy: RefreshPolicy {
                refresh_threshold: config.refresh_threshold,
            },
        })
    }

    /// 照片服务授权地址，请求离线访问以获得刷新令牌
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> Url {
        let state = state.to_string();
        let (url, _) = self
            .oauth
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        url
    }

    /// 用户是否已关联照片服务
    pub async fn has_connection(&self, user_id: Uuid) -> std::result::Result<bool, VaultError> {
        Ok(self.load_user(user_id).await?.has_photos_connection())
    }

    /// 取得绑定有效访问令牌的客户端
    ///
    /// 令牌已过期或即将过期时先刷新并写回三项令牌字段，再返回客户端。
    pub async fn get_authorized_client(
        &self,
        user_id: Uuid,
    ) -> std::result::Result<PhotosClient, VaultError> {
        let user = self.load_user(user_id).await?;
        let Some(access_token) = user.photos_access_token.filter(|t| !t.is_empty()) else {
            return Err(VaultError::NotConnected);
        };

        let now = Utc::now().naive_utc();
        if !self.policy.needs_refresh(user.photos_token_expiry, now) {
            return Ok(self.client_for(access_token));
        }

        let refresh_token = user
            .photos_refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VaultError::RefreshFailed("no refresh token stored".to_string()))?;

        ldebug!(
            "system",
            LogStage::TokenRefresh,
            LogComponent::Vault,
            "refresh_start",
            "照片服务访问令牌即将过期，开始刷新",
            user_id = %user_id
        );

        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                let reason = describe_token_error(&e);
                lwarn!(
                    "system",
                    LogStage::TokenRefresh,
                    LogComponent::Vault,
                    "refresh_failed",
                    "照片服务令牌刷新失败",
                    user_id = %user_id,
                    reason = %reason
                );
                VaultError::RefreshFailed(reason)
            })?;

        let tokens = TokenSet::from_response(&response, Some(&refresh_token));
        self.persist(user_id, &tokens).await?;

        linfo!(
            "system",
            LogStage::TokenRefresh,
            LogComponent::Vault,
            "refresh_persisted",
            "照片服务令牌已刷新并保存",
            user_id = %user_id
        );
        Ok(self.client_for(tokens.access_token))
    }

    /// 首次授权：用授权码换取令牌并保存
    pub async fn exchange_authorization_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> std::result::Result<(), VaultError> {
        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| VaultError::ExchangeFailed(describe_token_error(&e)))?;

        let tokens = TokenSet::from_response(&response, None);
        if tokens.refresh_token.is_none() {
            lwarn!(
                "system",
                LogStage::TokenExchange,
                LogComponent::Vault,
                "no_refresh_token",
                "照片服务未返回刷新令牌，过期后需要重新授权",
                user_id = %user_id
            );
        }
        self.persist(user_id, &tokens).await?;

        linfo!(
            "system",
            LogStage::TokenExchange,
            LogComponent::Vault,
            "connection_established",
            "照片服务关联成功",
            user_id = %user_id
        );
        Ok(())
    }

    async fn load_user(&self, user_id: Uuid) -> std::result::Result<users::Model, VaultError> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(VaultError::UserNotFound(user_id))
    }

    /// 单条 UPDATE 同时写入三项令牌字段
    async fn persist(&self, user_id: Uuid, tokens: &TokenSet) -> std::result::Result<(), VaultError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::PhotosAccessToken, Expr::value(Some(tokens.access_token.clone())))
            .col_expr(users::Column::PhotosRefreshToken, Expr::value(tokens.refresh_token.clone()))
            .col_expr(users::Column::PhotosTokenExpiry, Expr::value(tokens.expiry))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(VaultError::UserNotFound(user_id));
        }
        Ok(())
    }

    fn client_for(&self, access_token: String) -> PhotosClient {
        PhotosClient::new(self.http.clone(), self.api_base.clone(), access_token)
    }
}

/// 只保留错误类别与提供方错误码，不带响应原文
fn describe_token_error<RE, T>(err: &RequestTokenError<RE, T>) -> String
where
    RE: std::error::Error + 'static,
    T: oauth2::ErrorResponse + std::fmt::Display + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => format!("provider rejected request: {resp}"),
        RequestTokenError::Request(e) => format!("request failed: {e}"),
        RequestTokenError::Parse(e, _) => format!("malformed token response: {e}"),
        RequestTokenError::Other(msg) => msg.clone(),
    }
}
