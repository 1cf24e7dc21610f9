//! LinkService end-to-end tests

use std::sync::Arc;

use shortvault::config::{StorageConfig, StorageMode, WorkerConfig};
use shortvault::errors::StoreError;
use shortvault::services::{LinkService, ShortCodeGenerator};
use shortvault::storage::{
    FileStorage, LinkStore, MemoryStorage, Storage, StorageFactory, UrlRecord,
};
use shortvault::worker::DeleteWorker;
use tempfile::TempDir;

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval_ms: 10,
        concurrency: 2,
    }
}

async fn run_scenario(storage: Arc<dyn Storage>) {
    let service = LinkService::new(storage.clone(), ShortCodeGenerator::default());
    let owner = service.register_user().await.unwrap();

    let first = service
        .shorten("https://x.test/a", Some(owner.id))
        .await
        .unwrap();
    assert_eq!(first.short_code.len(), 10);

    let err = service
        .shorten("https://x.test/a", Some(owner.id))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::OriginalExists(_)));
    assert_eq!(err.existing_code(), Some(first.short_code.as_str()));

    let resolved = service.resolve(&first.short_code).await.unwrap();
    assert_eq!(resolved.original_url, "https://x.test/a");
    assert!(!resolved.deleted);

    service
        .request_deletion(&[first.short_code.clone()], owner.id)
        .await
        .unwrap();
    // 删除是异步的：worker 运行前记录仍可见
    assert!(!service.resolve(&first.short_code).await.unwrap().deleted);

    let worker = DeleteWorker::from_storage(storage, &worker_config());
    let report = worker.run_cycle().await.unwrap();
    assert_eq!(report.done, 1);

    assert!(service.resolve(&first.short_code).await.unwrap().deleted);
}

#[tokio::test]
async fn test_scenario_memory() {
    run_scenario(Arc::new(MemoryStorage::new())).await;
}

#[tokio::test]
async fn test_scenario_file() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path().join("storage.jsonl")).unwrap();
    run_scenario(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_scenario_database() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        mode: StorageMode::Database,
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        ..Default::default()
    };
    run_scenario(StorageFactory::create(&config).await.unwrap()).await;
}

#[tokio::test]
async fn test_file_round_trip_through_service() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.jsonl");

    let originals: Vec<String> = (0..5).map(|i| format!("https://x.test/{}", i)).collect();
    let created = {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&path).unwrap());
        let service = LinkService::new(storage.clone(), ShortCodeGenerator::default());
        let created = service.shorten_batch(&originals, Some(1)).await.unwrap();
        storage.close().await.unwrap();
        created
    };

    assert_eq!(created.len(), 5);
    for (record, original) in created.iter().zip(&originals) {
        assert_eq!(&record.original_url, original);
    }

    let reopened = FileStorage::open(&path).unwrap();
    for record in &created {
        assert_eq!(&reopened.lookup(&record.short_code).await.unwrap(), record);
    }
}

/// 批内重复以及已存在的原始链接都返回持有它的记录
async fn check_batch_dedup(storage: Arc<dyn Storage>) -> Vec<UrlRecord> {
    let service = LinkService::new(storage.clone(), ShortCodeGenerator::default());
    let existing = service.shorten("https://x.test/old", Some(1)).await.unwrap();

    let originals: Vec<String> = ["https://x.test/a", "https://x.test/a", "https://x.test/old"]
        .iter()
        .map(|u| u.to_string())
        .collect();
    let created = service.shorten_batch(&originals, Some(1)).await.unwrap();

    assert_eq!(created.len(), 3);
    assert_eq!(created[0], created[1]);
    assert_eq!(created[2], existing);
    for record in &created {
        assert_eq!(&storage.lookup(&record.short_code).await.unwrap(), record);
    }
    assert_eq!(storage.count().await.unwrap().urls, 2);
    created
}

#[tokio::test]
async fn test_shorten_batch_dedup_memory() {
    check_batch_dedup(Arc::new(MemoryStorage::new())).await;
}

#[tokio::test]
async fn test_shorten_batch_dedup_database() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        mode: StorageMode::Database,
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        ..Default::default()
    };
    check_batch_dedup(StorageFactory::create(&config).await.unwrap()).await;
}

#[tokio::test]
async fn test_shorten_batch_dedup_file_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.jsonl");

    let created = {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&path).unwrap());
        let created = check_batch_dedup(storage.clone()).await;
        storage.close().await.unwrap();
        created
    };

    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(reopened.count().await.unwrap().urls, 2);
    for record in &created {
        assert_eq!(&reopened.lookup(&record.short_code).await.unwrap(), record);
        assert_eq!(
            reopened
                .lookup_code_by_original(&record.original_url)
                .await
                .unwrap(),
            record.short_code
        );
    }
    // 只有真正写入的记录才会落盘
    let lines = std::fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), 2);
}

#[tokio::test]
async fn test_shorten_batch_codes_are_unique() {
    let service = LinkService::new(
        Arc::new(MemoryStorage::new()),
        ShortCodeGenerator::new(4, 20),
    );
    let originals: Vec<String> = (0..30).map(|i| format!("https://x.test/{}", i)).collect();

    let created = service.shorten_batch(&originals, None).await.unwrap();
    let mut codes: Vec<&str> = created.iter().map(|r| r.short_code.as_str()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 30);
    assert!(created.iter().all(|r| r.short_code.len() == 4));
}

#[tokio::test]
async fn test_stats_and_ping() {
    let service = LinkService::new(Arc::new(MemoryStorage::new()), ShortCodeGenerator::default());
    service.ping().await.unwrap();

    let user = service.register_user().await.unwrap();
    service.shorten("https://x.test/a", Some(user.id)).await.unwrap();
    service.shorten("https://x.test/b", None).await.unwrap();

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.urls, 2);
    assert_eq!(stats.users, 1);
}
