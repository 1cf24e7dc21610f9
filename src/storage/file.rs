//! Append-only file backend.
//!
//! Wraps [`MemoryStorage`] and persists records as one JSON object per line.
//! On open the log is replayed in file order, so the last line for a given
//! short code wins. Nothing is ever rewritten or compacted.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::memory::MemoryStorage;
use super::models::{DeleteTask, MarkDeleteResult, StorageCounts, TaskStatus, UrlRecord, User};
use super::traits::{DeleteTaskStore, LinkStore, RecordSaver};
use crate::errors::{Result, StoreError};

pub struct FileStorage {
    memory: MemoryStorage,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileStorage {
    /// Open (or create) the log at `path` and replay it into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                StoreError::file_operation(format!(
                    "Failed to open storage file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let memory = MemoryStorage::new();
        let replayed = Self::replay(&file, &memory)?;
        info!(
            "Replayed {} records from storage file {}",
            replayed,
            path.display()
        );

        Ok(Self {
            memory,
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn replay(file: &File, memory: &MemoryStorage) -> Result<usize> {
        let reader = BufReader::new(file);
        let mut count = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: UrlRecord = serde_json::from_str(line).map_err(|e| {
                StoreError::serialization(format!(
                    "Malformed record on line {}: {}",
                    index + 1,
                    e
                ))
            })?;
            memory.restore(record);
            count += 1;
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered lines to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// 把写入端换成只读句柄，之后的追加都会失败
    #[cfg(test)]
    fn break_writer(&self) -> Result<()> {
        *self.writer.lock() = BufWriter::new(File::open(&self.path)?);
        Ok(())
    }

    fn append(&self, record: &UrlRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl RecordSaver for FileStorage {
    fn save(&self, record: &UrlRecord) -> Result<()> {
        self.append(record).map_err(|e| {
            StoreError::file_operation(format!(
                "Failed to save record {}: {}",
                record.short_code,
                e.message()
            ))
        })
    }
}

#[async_trait]
impl LinkStore for FileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn insert(&self, record: UrlRecord) -> Result<String> {
        self.memory.insert(record).await
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<String>> {
        self.memory.insert_batch(records).await
    }

    async fn lookup(&self, short_code: &str) -> Result<UrlRecord> {
        self.memory.lookup(short_code).await
    }

    async fn lookup_code_by_original(&self, original_url: &str) -> Result<String> {
        self.memory.lookup_code_by_original(original_url).await
    }

    async fn exists(&self, short_code: &str) -> Result<bool> {
        self.memory.exists(short_code).await
    }

    async fn mark_deleted(&self, tasks: &[DeleteTask]) -> Result<Vec<MarkDeleteResult>> {
        let mut results = self.memory.apply_mark_deleted(tasks);

        // 追加一行覆盖旧记录，重放时软删除状态得以保留；
        // 写入失败的任务按失败上报，下个周期重新标记
        for result in results.iter_mut().filter(|r| r.is_ok()) {
            let code = &result.task.short_code;
            let persisted = match self.memory.lookup(code).await {
                Ok(record) => self.append(&record),
                Err(e) => Err(e),
            };
            if let Err(e) = persisted {
                warn!("Soft delete of {} applied in memory but not persisted: {}", code, e);
                result.outcome = Err(StoreError::file_operation(format!(
                    "Failed to persist soft delete of {}: {}",
                    code,
                    e.message()
                )));
            }
        }

        Ok(results)
    }

    async fn register_user(&self) -> Result<User> {
        self.memory.register_user().await
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<UrlRecord>> {
        self.memory.list_by_owner(owner_id).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<StorageCounts> {
        self.memory.count().await
    }

    async fn close(&self) -> Result<()> {
        self.sync()
    }

    fn as_saver(&self) -> Option<&dyn RecordSaver> {
        Some(self)
    }
}

#[async_trait]
impl DeleteTaskStore for FileStorage {
    async fn register(&self, short_codes: &[String], requester_id: i32) -> Result<()> {
        self.memory.register(short_codes, requester_id).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<DeleteTask>> {
        self.memory.list_by_status(status).await
    }

    async fn update_status(&self, tasks: &[DeleteTask], status: TaskStatus) -> Result<()> {
        self.memory.update_status(tasks, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn insert_and_save(storage: &FileStorage, record: UrlRecord) {
        storage.insert(record.clone()).await.unwrap();
        storage.as_saver().unwrap().save(&record).unwrap();
    }

    #[tokio::test]
    async fn test_replay_restores_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");

        let records: Vec<UrlRecord> = (0..5)
            .map(|i| UrlRecord::new(format!("code{}", i), format!("https://x.test/{}", i)).with_owner(1))
            .collect();

        {
            let storage = FileStorage::open(&path).unwrap();
            for record in &records {
                insert_and_save(&storage, record.clone()).await;
            }
            storage.sync().unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        for record in &records {
            assert_eq!(&reopened.lookup(&record.short_code).await.unwrap(), record);
        }
        assert_eq!(reopened.count().await.unwrap().urls, 5);
    }

    #[tokio::test]
    async fn test_replay_last_line_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"short_url":"abc","original_url":"https://x.test/old","uuid":"1","user_id":1,"is_deleted":false}"#,
                "\n\n",
                r#"{"short_url":"abc","original_url":"https://x.test/new","uuid":"2","user_id":1,"is_deleted":false}"#,
                "\n"
            ),
        )
        .unwrap();

        let storage = FileStorage::open(&path).unwrap();
        let record = storage.lookup("abc").await.unwrap();
        assert_eq!(record.original_url, "https://x.test/new");
        assert_eq!(record.id, "2");
    }

    #[tokio::test]
    async fn test_replay_rejects_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");
        std::fs::write(&path, "{\"short_url\":\"abc\"\nnot json\n").unwrap();

        let err = FileStorage::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(err.message().contains("line 1"));
    }

    #[tokio::test]
    async fn test_soft_delete_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");

        {
            let storage = FileStorage::open(&path).unwrap();
            insert_and_save(&storage, UrlRecord::new("abc", "https://x.test/a").with_owner(4)).await;
            let results = storage
                .mark_deleted(&[DeleteTask::registered("abc", 4)])
                .await
                .unwrap();
            assert!(results[0].is_ok());
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert!(reopened.lookup("abc").await.unwrap().deleted);

        let lines = std::fs::read_to_string(&path).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_unpersisted_soft_delete_is_reported_as_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");

        {
            let storage = FileStorage::open(&path).unwrap();
            insert_and_save(&storage, UrlRecord::new("abc", "https://x.test/a").with_owner(4)).await;
            insert_and_save(&storage, UrlRecord::new("xyz", "https://x.test/b").with_owner(5)).await;
            storage.break_writer().unwrap();

            let results = storage
                .mark_deleted(&[
                    DeleteTask::registered("abc", 4),
                    DeleteTask::registered("xyz", 4),
                ])
                .await
                .unwrap();
            assert!(matches!(results[0].outcome, Err(StoreError::FileOperation(_))));
            assert!(matches!(
                results[1].outcome,
                Err(StoreError::OwnershipViolation(_))
            ));
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert!(!reopened.lookup("abc").await.unwrap().deleted);

        // 重新标记是幂等的，写入恢复后即可持久化
        let results = reopened
            .mark_deleted(&[DeleteTask::registered("abc", 4)])
            .await
            .unwrap();
        assert!(results[0].is_ok());
        drop(reopened);
        assert!(FileStorage::open(&path).unwrap().lookup("abc").await.unwrap().deleted);
    }

    #[tokio::test]
    async fn test_new_users_do_not_reuse_replayed_owner_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");

        {
            let storage = FileStorage::open(&path).unwrap();
            insert_and_save(&storage, UrlRecord::new("abc", "https://x.test/a").with_owner(9)).await;
        }

        let reopened = FileStorage::open(&path).unwrap();
        let user = reopened.register_user().await.unwrap();
        assert_eq!(user.id, 10);
    }

    #[tokio::test]
    async fn test_insert_without_save_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.jsonl");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .insert(UrlRecord::new("abc", "https://x.test/a"))
                .await
                .unwrap();
            assert!(storage.exists("abc").await.unwrap());
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert!(!reopened.exists("abc").await.unwrap());
    }
}
