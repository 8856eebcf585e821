//! # 请求处理器

pub mod auth;
pub mod photos;
pub mod user;
