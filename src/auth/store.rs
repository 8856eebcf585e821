//! # 会话存储
//!
//! 会话记录落在应用数据库的 `tower_sessions` 表中，重启后登录态仍然有效。
//! 过期记录在加载时被忽略，并由后台任务定期清理。

use std::time::Duration;

use async_trait::async_trait;
use entity::sessions::{self, Entity as Sessions};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::OnConflict,
};
use time::OffsetDateTime;
use tower_sessions::{
    ExpiredDeletion, SessionStore,
    session::{Id, Record},
    session_store,
};

use crate::{lwarn, logging::{LogComponent, LogStage}};

/// 基于 Sea-ORM 的会话存储
#[derive(Clone, Debug)]
pub struct SqlSessionStore {
    db: DatabaseConnection,
}

impl SqlSessionStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn exists(&self, id: &Id) -> session_store::Result<bool> {
        let found = Sessions::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(found.is_some())
    }

    /// 按固定间隔清理过期会话，清理失败只记录日志
    pub async fn run_cleanup(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = self.delete_expired().await {
                lwarn!(
                    "system",
                    LogStage::Session,
                    LogComponent::Session,
                    "session_cleanup_failed",
                    &format!("过期会话清理失败: {e}")
                );
            }
        }
    }
}

fn backend(e: sea_orm::DbErr) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.exists(&record.id).await? {
            record.id = Id::default();
        }
        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let data = serde_json::to_vec(record)
            .map_err(|e| session_store::Error::Encode(e.to_string()))?;

        let model = sessions::ActiveModel {
            id: Set(record.id.to_string()),
            data: Set(data),
            expires_at: Set(record.expiry_date.unix_timestamp()),
        };

        Sessions::insert(model)
            .on_conflict(
                OnConflict::column(sessions::Column::Id)
                    .update_columns([sessions::Column::Data, sessions::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let row = Sessions::find_by_id(id.to_string())
            .filter(sessions::Column::ExpiresAt.gt(now_unix()))
            .one(&self.db)
            .await
            .map_err(backend)?;

        row.map(|row| {
            serde_json::from_slice(&row.data)
                .map_err(|e| session_store::Error::Decode(e.to_string()))
        })
        .transpose()
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        Sessions::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SqlSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        Sessions::delete_many()
            .filter(sessions::Column::ExpiresAt.lte(now_unix()))
            .exec(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use pretty_assertions::assert_eq;
    use sea_orm::{Database, PaginatorTrait};
    use std::collections::HashMap;

    async fn store() -> SqlSessionStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SqlSessionStore::new(db)
    }

    fn record(expiry_date: OffsetDateTime) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::from([("state".to_string(), serde_json::json!("nonce-1"))]),
            expiry_date,
        }
    }

    fn hours_from_now(hours: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() + time::Duration::hours(hours)
    }

    #[tokio::test]
    async fn test_saved_record_loads_back() {
        let store = store().await;
        let mut record = record(hours_from_now(1));

        store.create(&mut record).await.unwrap();
        let loaded = store.load(&record.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.data, record.data);
        assert_eq!(
            loaded.expiry_date.unix_timestamp(),
            record.expiry_date.unix_timestamp()
        );
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_row() {
        let store = store().await;
        let mut record = record(hours_from_now(1));
        store.create(&mut record).await.unwrap();

        record
            .data
            .insert("profile".to_string(), serde_json::json!({"name": "A"}));
        store.save(&record).await.unwrap();

        let loaded = store.load(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.data.len(), 2);
        assert_eq!(Sessions::find().count(&store.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_regenerates_colliding_id() {
        let store = store().await;
        let mut first = record(hours_from_now(1));
        store.create(&mut first).await.unwrap();

        let mut second = record(hours_from_now(1));
        second.id = first.id;
        store.create(&mut second).await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(Sessions::find().count(&store.db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_loaded() {
        let store = store().await;
        let mut record = record(hours_from_now(-1));
        store.create(&mut record).await.unwrap();

        assert!(store.load(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_sessions() {
        let store = store().await;
        let mut live = record(hours_from_now(1));
        let mut stale = record(hours_from_now(-1));
        store.create(&mut live).await.unwrap();
        store.create(&mut stale).await.unwrap();

        store.delete_expired().await.unwrap();

        let remaining = Sessions::find().all(&store.db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id.to_string());
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let store = store().await;
        let mut record = record(hours_from_now(1));
        store.create(&mut record).await.unwrap();

        store.delete(&record.id).await.unwrap();

        assert!(store.load(&record.id).await.unwrap().is_none());
        assert_eq!(Sessions::find().count(&store.db).await.unwrap(), 0);
    }
}
