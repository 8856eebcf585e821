//! # EventHub 核心库
//!
//! 基于会话的 Web 服务认证核心：主身份提供方登录、本地用户同步、
//! 照片服务令牌库以及页面与接口认证中间件。

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod photos;
pub mod web;

pub use config::AppConfig;
pub use error::{HubError, Result};
