//! # 会话实体定义
//!
//! 会话记录整体序列化后存入 `data`，`expires_at` 为 Unix 秒，用于加载过滤与过期清理。

use sea_orm::entity::prelude::*;

/// 会话实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tower_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub data: Vec<u8>,
    pub expires_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
