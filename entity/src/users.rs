//! # 用户实体定义
//!
//! 本地用户表的 Sea-ORM 实体模型。`auth_id` 是身份提供商的 subject id，
//! 照片服务的三个令牌字段只在服务端使用，序列化时一律跳过。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 新用户的默认角色
pub const DEFAULT_ROLE: &str = "user";

/// 用户实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Subject id issued by the identity provider. Written once, at creation.
    #[sea_orm(unique)]
    pub auth_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip)]
    pub photos_access_token: Option<String>,
    #[serde(skip)]
    pub photos_refresh_token: Option<String>,
    #[serde(skip)]
    pub photos_token_expiry: Option<DateTime>,
}

impl Model {
    /// 是否已关联照片服务
    #[must_use]
    pub fn has_photos_connection(&self) -> bool {
        self.photos_access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
