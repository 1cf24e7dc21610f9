//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;
mod tasks;

use std::future::Future;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};
use tracing::info;

use crate::config::StorageConfig;
use crate::errors::{Result, StoreError};
use crate::storage::models::{
    DeleteTask, MarkDeleteResult, StorageCounts, TaskStatus, UrlRecord, User,
};
use crate::storage::traits::{DeleteTaskStore, LinkStore};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::{model_to_record, model_to_task, record_to_active_model, task_to_active_model};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(StoreError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 规范化 backend 名称
pub fn normalize_backend_name(backend: &str) -> String {
    match backend {
        "mariadb" => "mysql".to_string(),
        "postgresql" => "postgres".to_string(),
        other => other.to_string(),
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    timeout_ms: u64,
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(StoreError::database_config("database_url 未设置"));
        }

        let backend_name = normalize_backend_name(&infer_backend_from_url(&config.database_url)?);

        let db = if backend_name == "sqlite" {
            connect_sqlite(&config.database_url).await?
        } else {
            connect_generic(&config.database_url, &backend_name, config.pool_size).await?
        };

        run_migrations(&db).await?;

        let storage = SeaOrmStorage {
            db,
            backend_name,
            timeout_ms: config.timeout_ms,
            retry_config: retry::RetryConfig {
                max_retries: config.retry_count,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
        };

        info!(
            "{} storage initialized (timeout {}ms)",
            storage.backend_name.to_uppercase(),
            storage.timeout_ms
        );
        Ok(storage)
    }

    /// 以超时与锁冲突重试执行一次数据库操作
    async fn run<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, DbErr>>,
    {
        retry::with_timeout(operation_name, self.retry_config, self.timeout_ms, operation).await
    }
}

#[async_trait]
impl LinkStore for SeaOrmStorage {
    fn backend_name(&self) -> &'static str {
        "database"
    }

    async fn insert(&self, record: UrlRecord) -> Result<String> {
        self.insert_record(record).await
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<String>> {
        self.insert_records(records).await
    }

    async fn lookup(&self, short_code: &str) -> Result<UrlRecord> {
        self.find_by_code(short_code).await
    }

    async fn lookup_code_by_original(&self, original_url: &str) -> Result<String> {
        self.find_code_by_original(original_url).await
    }

    async fn exists(&self, short_code: &str) -> Result<bool> {
        self.code_exists(short_code).await
    }

    async fn mark_deleted(&self, tasks: &[DeleteTask]) -> Result<Vec<MarkDeleteResult>> {
        self.soft_delete(tasks).await
    }

    async fn register_user(&self) -> Result<User> {
        self.create_user().await
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<UrlRecord>> {
        self.find_by_owner(owner_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| StoreError::unavailable(format!("数据库不可用: {}", e)))
    }

    async fn count(&self) -> Result<StorageCounts> {
        self.count_rows().await
    }

    async fn close(&self) -> Result<()> {
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| StoreError::database_connection(format!("关闭数据库连接失败: {}", e)))
    }
}

#[async_trait]
impl DeleteTaskStore for SeaOrmStorage {
    async fn register(&self, short_codes: &[String], requester_id: i32) -> Result<()> {
        self.register_tasks(short_codes, requester_id).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<DeleteTask>> {
        self.find_tasks_by_status(status).await
    }

    async fn update_status(&self, tasks: &[DeleteTask], status: TaskStatus) -> Result<()> {
        self.set_task_status(tasks, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://data.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("links.sqlite").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url(":memory:").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mysql://u@h/db").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("mariadb://u@h/db").unwrap(), "mysql");
        assert_eq!(
            infer_backend_from_url("postgresql://u@h/db").unwrap(),
            "postgres"
        );
        assert!(matches!(
            infer_backend_from_url("redis://h"),
            Err(StoreError::DatabaseConfig(_))
        ));
    }

    #[test]
    fn test_normalize_backend_name() {
        assert_eq!(normalize_backend_name("mariadb"), "mysql");
        assert_eq!(normalize_backend_name("postgresql"), "postgres");
        assert_eq!(normalize_backend_name("sqlite"), "sqlite");
    }
}
