//! # 照片服务集成
//!
//! 用户登录后可另行关联照片服务。[`TokenVault`] 负责令牌的获取、刷新与保存，
//! [`PhotosClient`] 用刷新后的令牌调用相册接口。

pub mod client;
pub mod vault;

pub use client::{PhotosClient, SharedAlbum};
pub use vault::{RefreshPolicy, TokenVault};
