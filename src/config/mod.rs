//! # 配置管理模块
//!
//! 启动时从环境变量构建一次 [`AppConfig`]，之后以 `Arc` 共享给各组件。
//! 请求处理路径中不再读取环境变量。

mod app_config;
mod database;

pub use app_config::{
    AppConfig, IdentityProviderConfig, PhotosProviderConfig, SameSitePolicy, SecretString,
    ServerConfig, SessionConfig,
};
pub use database::DatabaseConfig;

use std::env;

use crate::error::Result;

/// 从进程环境加载配置
///
/// 若存在 `.env` 文件，先将其载入进程环境。
pub fn load_config() -> Result<AppConfig> {
    // .env 缺失不是错误
    let _ = dotenv::dotenv();
    AppConfig::from_lookup(|key| env::var(key).ok())
}
