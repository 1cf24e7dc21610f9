//! Storage contract shared by the memory, file and database backends.
//!
//! Cancellation and deadlines follow the usual async rules: dropping the
//! returned future abandons the call. The database backend additionally
//! bounds every round-trip with its configured timeout.

use async_trait::async_trait;

use super::models::{DeleteTask, MarkDeleteResult, StorageCounts, TaskStatus, UrlRecord, User};
use crate::errors::Result;

/// 短链接存储
#[async_trait]
pub trait LinkStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Store a new record.
    ///
    /// When the original URL is already stored, returns
    /// `Err(StoreError::OriginalExists(existing_code))` and leaves the
    /// backend untouched.
    async fn insert(&self, record: UrlRecord) -> Result<String>;

    /// Store records without the per-record dedup check.
    ///
    /// Callers are expected to pre-generate unique codes. Returns, in input
    /// order, the code each record's original URL is stored under; a code
    /// other than the record's own means the record was not written because
    /// the URL was already held.
    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<String>>;

    async fn lookup(&self, short_code: &str) -> Result<UrlRecord>;

    async fn lookup_code_by_original(&self, original_url: &str) -> Result<String>;

    async fn exists(&self, short_code: &str) -> Result<bool>;

    /// Soft-delete the records named by `tasks`.
    ///
    /// Per-task failures (missing record, requester is not the owner) are
    /// reported in the returned results and never stop sibling tasks. The
    /// outer error is reserved for the backend itself failing.
    async fn mark_deleted(&self, tasks: &[DeleteTask]) -> Result<Vec<MarkDeleteResult>>;

    async fn register_user(&self) -> Result<User>;

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<UrlRecord>>;

    async fn ping(&self) -> Result<()>;

    async fn count(&self) -> Result<StorageCounts>;

    /// Flush and release backend resources before shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Explicit persistence step, for backends that have one.
    fn as_saver(&self) -> Option<&dyn RecordSaver> {
        None
    }
}

/// 需要单独保存步骤的存储（追加写文件）
pub trait RecordSaver: Send + Sync {
    fn save(&self, record: &UrlRecord) -> Result<()>;
}

/// 删除任务存储
#[async_trait]
pub trait DeleteTaskStore: Send + Sync {
    /// Register one task per code. Re-registering a code overwrites the
    /// previous task with a fresh `Registered` one.
    async fn register(&self, short_codes: &[String], requester_id: i32) -> Result<()>;

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<DeleteTask>>;

    /// Move `tasks` to `status`. Tasks re-registered by another requester in
    /// the meantime are left alone.
    async fn update_status(&self, tasks: &[DeleteTask], status: TaskStatus) -> Result<()>;
}

/// 完整的存储后端
pub trait Storage: LinkStore + DeleteTaskStore {}

impl<T: LinkStore + DeleteTaskStore> Storage for T {}
