use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageMode};
use crate::errors::Result;

pub mod backend;
pub mod file;
pub mod memory;
pub mod models;
pub mod traits;

pub use backend::SeaOrmStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use models::{DeleteTask, MarkDeleteResult, StorageCounts, TaskStatus, UrlRecord, User};
pub use traits::{DeleteTaskStore, LinkStore, RecordSaver, Storage};

pub struct StorageFactory;

impl StorageFactory {
    /// 按配置的模式创建存储后端
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match config.mode {
            StorageMode::Memory => Arc::new(MemoryStorage::new()),
            StorageMode::File => Arc::new(FileStorage::open(&config.file_path)?),
            StorageMode::Database => Arc::new(SeaOrmStorage::new(config).await?),
        };

        info!("Storage backend ready: {}", storage.backend_name());
        Ok(storage)
    }
}
