//! # 应用上下文
//!
//! 启动时构建一次，持有配置与各服务实例，在所有请求间共享。

use std::ops::Deref;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{IdentityClient, UserService};
use crate::config::AppConfig;
use crate::error::Result;
use crate::photos::TokenVault;

/// 跨模块共享的服务实例
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub identity: IdentityClient,
    pub users: UserService,
    pub vault: TokenVault,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Result<Self> {
        let identity = IdentityClient::new(config.identity.clone())?;
        let users = UserService::new(db.clone());
        let vault = TokenVault::new(db.clone(), &config.photos)?;

        Ok(Self {
            config,
            db,
            identity,
            users,
            vault,
        })
    }
}

/// Axum 路由状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub fn new(context: AppContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
