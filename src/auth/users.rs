//! # 用户同步服务
//!
//! 以身份提供方的 subject id 为键创建或更新本地用户。

use chrono::Utc;
use entity::users;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr, Unchanged,
};
use uuid::Uuid;

use crate::error::{AuthError, HubError, Result};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 身份提供方提供的可变资料
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub picture: &'a str,
}

/// 本地用户读写服务
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_auth_id(&self, auth_id: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::AuthId.eq(auth_id))
            .one(&self.db)
            .await?)
    }

    /// 创建或更新用户
    ///
    /// 已存在时只更新 email、name、picture；角色、启用状态与本地 id 保持不变。
    /// 并发创建时唯一约束冲突会转为更新，调用方看不到冲突。
    pub async fn create_or_update(&self, auth_id: &str, profile: ProfileFields<'_>) -> Result<users::Model> {
        if auth_id.trim().is_empty() {
            return Err(AuthError::ProfileInvalid.into());
        }

        if let Some(existing) = self.find_by_auth_id(auth_id).await? {
            return self.update_profile(existing.id, &profile).await;
        }

        let now = Utc::now().naive_utc();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            auth_id: Set(auth_id.to_string()),
            email: Set(profile.email.to_string()),
            name: Set(profile.name.to_string()),
            picture: Set(profile.picture.to_string()),
            role: Set(users::DEFAULT_ROLE.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            photos_access_token: Set(None),
            photos_refresh_token: Set(None),
            photos_token_expiry: Set(None),
        };

        match user.insert(&self.db).await {
            Ok(created) => {
                linfo!(
                    "system",
                    LogStage::UserSync,
                    LogComponent::Users,
                    "user_created",
                    "创建本地用户",
                    user_id = %created.id,
                    auth_id = auth_id
                );
                Ok(created)
            }
            Err(err) if is_unique_violation(&err) => {
                lwarn!(
                    "system",
                    LogStage::UserSync,
                    LogComponent::Users,
                    "create_conflict_retry",
                    "并发创建同一用户，改为更新",
                    auth_id = auth_id
                );
                let winner = self.find_by_auth_id(auth_id).await?.ok_or_else(|| {
                    HubError::database(format!("唯一约束冲突后未找到用户: {auth_id}"))
                })?;
                self.update_profile(winner.id, &profile).await
            }
            Err(err) => Err(HubError::database_with_source("创建用户失败", err)),
        }
    }

    async fn update_profile(&self, id: Uuid, profile: &ProfileFields<'_>) -> Result<users::Model> {
        let changes = users::ActiveModel {
            id: Unchanged(id),
            email: Set(profile.email.to_string()),
            name: Set(profile.name.to_string()),
            picture: Set(profile.picture.to_string()),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        let updated = changes
            .update(&self.db)
            .await
            .map_err(|e| HubError::database_with_source("更新用户资料失败", e))?;

        linfo!(
            "system",
            LogStage::UserSync,
            LogComponent::Users,
            "user_updated",
            "更新本地用户资料",
            user_id = %updated.id
        );
        Ok(updated)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
