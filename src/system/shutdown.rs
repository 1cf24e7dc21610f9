//! Graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::storage::{LinkStore, Storage};
use crate::worker::WorkerHandle;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C 信号
pub async fn wait_for_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// Stop the delete worker after its current cycle, then close the backend.
pub async fn shutdown(worker: WorkerHandle, storage: Arc<dyn Storage>) {
    let result = timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), async {
        worker.stop().await;
        if let Err(e) = storage.close().await {
            error!("Failed to close {} storage: {}", storage.backend_name(), e);
        }
    })
    .await;

    match result {
        Ok(()) => info!("Shutdown completed"),
        Err(_) => error!(
            "Shutdown timed out after {} seconds, exiting anyway",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
