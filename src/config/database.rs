//! # 数据库配置

use crate::error::{HubError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};
use std::path::Path;

/// 默认数据库地址
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/eventhub.db";

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    /// 检查是否为内存数据库
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 确保 SQLite 文件数据库的父目录存在
    pub fn ensure_database_path(&self) -> Result<()> {
        if !self.url.starts_with("sqlite:") || self.is_memory_database() {
            return Ok(());
        }

        let path_str = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url);
        let path_str = path_str.split('?').next().unwrap_or(path_str);
        let db_path = Path::new(path_str);

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HubError::config_with_source(format!("无法创建数据库目录: {}", parent.display()), e)
            })?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "create_db_dir",
                &format!("创建数据库目录: {}", parent.display())
            );
        }

        Ok(())
    }

    /// 获取连接字符串，文件数据库在首次连接时创建
    #[must_use]
    pub fn connection_url(&self) -> String {
        if self.url.starts_with("sqlite:") && !self.is_memory_database() && !self.url.contains("mode=") {
            let separator = if self.url.contains('?') { '&' } else { '?' };
            format!("{}{separator}mode=rwc", self.url)
        } else {
            self.url.clone()
        }
    }
}
