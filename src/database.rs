//! # 数据库模块
//!
//! 数据库连接和迁移管理

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::config::DatabaseConfig;
use crate::error::{HubError, Result};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    config.ensure_database_path()?;

    let url = config.connection_url();
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "db_connecting",
        "正在连接数据库",
        memory = config.is_memory_database()
    );

    // 内存库的每个连接都是独立实例，只能使用单连接
    let max_connections = if config.is_memory_database() { 1 } else { config.max_connections };
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| HubError::database_with_source("数据库连接失败", e))?;

    linfo!("system", LogStage::Startup, LogComponent::Database, "db_connected", "数据库连接成功");
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> std::result::Result<(), DbErr> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;
    if pending.is_empty() {
        linfo!("system", LogStage::Startup, LogComponent::Database, "migrations_current", "所有迁移都已应用");
        return Ok(());
    }

    lwarn!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "migrations_pending",
        &format!("有 {} 个待应用的迁移", pending.len())
    );

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!("system", LogStage::Startup, LogComponent::Database, "migrations_done", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrations_failed",
                &format!("数据库迁移失败: {e}")
            );
            Err(e)
        }
    }
}
