//! In-process storage backend.
//!
//! All state sits behind one `RwLock`, so the dedup check and the insert
//! that follows it happen atomically even under concurrent callers.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::models::{DeleteTask, MarkDeleteResult, StorageCounts, TaskStatus, UrlRecord, User};
use super::traits::{DeleteTaskStore, LinkStore};
use crate::errors::{Result, StoreError};

#[derive(Default)]
struct MemoryState {
    urls: HashMap<String, UrlRecord>,
    /// original_url -> short_code
    by_original: HashMap<String, String>,
    users: BTreeSet<i32>,
    last_user_id: i32,
    tasks: HashMap<String, DeleteTask>,
}

impl MemoryState {
    /// 直接写入记录，同短码后写覆盖前写
    fn put(&mut self, record: UrlRecord) {
        if let Some(previous) = self.urls.get(&record.short_code)
            && previous.original_url != record.original_url
        {
            self.by_original.remove(&previous.original_url);
        }
        self.by_original
            .insert(record.original_url.clone(), record.short_code.clone());
        self.urls.insert(record.short_code.clone(), record);
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record as-is, bypassing the dedup check. Used by log replay.
    pub(crate) fn restore(&self, record: UrlRecord) {
        let mut state = self.state.write();
        if let Some(owner) = record.owner_id {
            state.users.insert(owner);
            state.last_user_id = state.last_user_id.max(owner);
        }
        state.put(record);
    }

    pub(crate) fn apply_mark_deleted(&self, tasks: &[DeleteTask]) -> Vec<MarkDeleteResult> {
        let mut state = self.state.write();
        tasks
            .iter()
            .map(|task| {
                let outcome = match state.urls.get_mut(&task.short_code) {
                    None => Err(StoreError::not_found(format!(
                        "no record for short code {}",
                        task.short_code
                    ))),
                    Some(record) if !record.is_owned_by(task.requester_id) => {
                        Err(StoreError::ownership_violation(format!(
                            "user {} does not own {}",
                            task.requester_id, task.short_code
                        )))
                    }
                    Some(record) => {
                        record.deleted = true;
                        debug!("Marked {} as deleted", task.short_code);
                        Ok(())
                    }
                };
                MarkDeleteResult {
                    task: task.clone(),
                    outcome,
                }
            })
            .collect()
    }
}

#[async_trait]
impl LinkStore for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: UrlRecord) -> Result<String> {
        let mut state = self.state.write();
        if let Some(existing) = state.by_original.get(&record.original_url) {
            return Err(StoreError::original_exists(existing.clone()));
        }
        let code = record.short_code.clone();
        state.put(record);
        Ok(code)
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<String>> {
        let mut state = self.state.write();
        let mut stored_as = Vec::with_capacity(records.len());
        for record in records {
            // 同一原始链接已由其他短码持有时跳过，保持每个原始链接最多一条记录
            if let Some(existing) = state.by_original.get(&record.original_url)
                && existing != &record.short_code
            {
                warn!(
                    "Skipping batch record {}: original already stored as {}",
                    record.short_code, existing
                );
                stored_as.push(existing.clone());
                continue;
            }
            stored_as.push(record.short_code.clone());
            state.put(record);
        }
        Ok(stored_as)
    }

    async fn lookup(&self, short_code: &str) -> Result<UrlRecord> {
        self.state
            .read()
            .urls
            .get(short_code)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("no record for short code {}", short_code)))
    }

    async fn lookup_code_by_original(&self, original_url: &str) -> Result<String> {
        self.state
            .read()
            .by_original
            .get(original_url)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(format!("no short code for original {}", original_url))
            })
    }

    async fn exists(&self, short_code: &str) -> Result<bool> {
        Ok(self.state.read().urls.contains_key(short_code))
    }

    async fn mark_deleted(&self, tasks: &[DeleteTask]) -> Result<Vec<MarkDeleteResult>> {
        Ok(self.apply_mark_deleted(tasks))
    }

    async fn register_user(&self) -> Result<User> {
        let mut state = self.state.write();
        state.last_user_id += 1;
        let id = state.last_user_id;
        state.users.insert(id);
        Ok(User::new(id))
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<UrlRecord>> {
        let state = self.state.read();
        let mut records: Vec<UrlRecord> = state
            .urls
            .values()
            .filter(|r| r.is_owned_by(owner_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.short_code.cmp(&b.short_code));
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<StorageCounts> {
        let state = self.state.read();
        Ok(StorageCounts {
            urls: state.urls.len(),
            users: state.users.len(),
        })
    }
}

#[async_trait]
impl DeleteTaskStore for MemoryStorage {
    async fn register(&self, short_codes: &[String], requester_id: i32) -> Result<()> {
        let mut state = self.state.write();
        for code in short_codes {
            state
                .tasks
                .insert(code.clone(), DeleteTask::registered(code.clone(), requester_id));
        }
        Ok(())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<DeleteTask>> {
        let state = self.state.read();
        let mut tasks: Vec<DeleteTask> = state
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.registered_at);
        Ok(tasks)
    }

    async fn update_status(&self, tasks: &[DeleteTask], status: TaskStatus) -> Result<()> {
        let mut state = self.state.write();
        for task in tasks {
            if let Some(stored) = state.tasks.get_mut(&task.short_code)
                && stored.requester_id == task.requester_id
            {
                stored.status = status;
            }
        }
        Ok(())
    }
}
