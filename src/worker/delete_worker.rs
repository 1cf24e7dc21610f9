//! 删除任务后台处理
//!
//! 每个周期：拉取 Registered 任务 -> 分发到若干并发 worker 调用
//! `mark_deleted` -> 汇总结果 -> 成功的任务标记为 Done。
//! 失败的任务保持 Registered，下个周期自动重试。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::config::WorkerConfig;
use crate::errors::Result;
use crate::storage::{DeleteTask, DeleteTaskStore, LinkStore, MarkDeleteResult, Storage, TaskStatus};

/// Worker 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Polling,
    Draining,
    Applying,
    Updating,
    Stopped,
}

/// 单个周期的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// 本周期拉取到的 Registered 任务数
    pub found: usize,
    /// 转为 Done 的任务数
    pub done: usize,
    /// 失败并保留为 Registered 的任务数
    pub failed: usize,
}

pub struct DeleteWorker {
    links: Arc<dyn LinkStore>,
    tasks: Arc<dyn DeleteTaskStore>,
    poll_interval: Duration,
    concurrency: usize,
    state: watch::Sender<WorkerState>,
}

impl DeleteWorker {
    pub fn new(
        links: Arc<dyn LinkStore>,
        tasks: Arc<dyn DeleteTaskStore>,
        config: &WorkerConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            links,
            tasks,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            concurrency: config.concurrency.max(1),
            state,
        }
    }

    /// 同一个后端同时充当链接存储与任务存储
    pub fn from_storage(storage: Arc<dyn Storage>, config: &WorkerConfig) -> Self {
        let links: Arc<dyn LinkStore> = storage.clone();
        let tasks: Arc<dyn DeleteTaskStore> = storage;
        Self::new(links, tasks, config)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: WorkerState) {
        trace!("DeleteWorker: {:?}", state);
        self.state.send_replace(state);
    }

    /// Run one Polling -> Updating pass.
    ///
    /// Backend failures on individual tasks are counted in
    /// [`CycleReport::failed`]; only task-store failures are returned as
    /// errors.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.set_state(WorkerState::Polling);
        let pending = match self.tasks.list_by_status(TaskStatus::Registered).await {
            Ok(pending) => pending,
            Err(e) => {
                self.set_state(WorkerState::Idle);
                return Err(e);
            }
        };

        if pending.is_empty() {
            self.set_state(WorkerState::Idle);
            return Ok(CycleReport::default());
        }

        let found = pending.len();
        debug!("DeleteWorker: {} registered tasks", found);

        self.set_state(WorkerState::Draining);
        let shares = split_into_shares(pending, self.concurrency);

        self.set_state(WorkerState::Applying);
        let results = self.apply(shares).await;

        if results.len() < found {
            // 分片任务异常退出时其结果不会回传，这些任务保持 Registered
            warn!(
                "DeleteWorker: {} tasks returned no result",
                found - results.len()
            );
        }

        let mut succeeded = Vec::new();
        for result in results {
            match result.outcome {
                Ok(()) => succeeded.push(result.task),
                Err(e) => {
                    warn!(
                        "DeleteWorker: task {} by user {} failed: {}",
                        result.task.short_code, result.task.requester_id, e
                    );
                }
            }
        }

        self.set_state(WorkerState::Updating);
        if !succeeded.is_empty()
            && let Err(e) = self.tasks.update_status(&succeeded, TaskStatus::Done).await
        {
            self.set_state(WorkerState::Idle);
            return Err(e);
        }

        self.set_state(WorkerState::Idle);
        let report = CycleReport {
            found,
            done: succeeded.len(),
            failed: found.saturating_sub(succeeded.len()),
        };
        info!(
            "DeleteWorker: cycle finished, {} done, {} failed",
            report.done, report.failed
        );
        Ok(report)
    }

    /// 并发执行每一份任务并汇总结果（按完成顺序）
    async fn apply(&self, shares: Vec<Vec<DeleteTask>>) -> Vec<MarkDeleteResult> {
        let (tx, mut rx) = mpsc::channel::<MarkDeleteResult>(64);

        let mut handles = Vec::with_capacity(shares.len());
        for share in shares {
            let links = Arc::clone(&self.links);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let results = match links.mark_deleted(&share).await {
                    Ok(results) => results,
                    Err(e) => {
                        // 整份失败：逐个任务带回同一错误
                        share
                            .into_iter()
                            .map(|task| MarkDeleteResult {
                                task,
                                outcome: Err(e.clone()),
                            })
                            .collect()
                    }
                };
                for result in results {
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!("DeleteWorker: share task failed: {}", e);
            }
        }
        results
    }

    /// 启动后台循环
    pub fn spawn(self) -> WorkerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state_rx = self.state.subscribe();
        let join = tokio::spawn(self.run(stop_rx));
        WorkerHandle {
            stop_tx,
            state_rx,
            join,
        }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            "DeleteWorker started (interval {:?}, concurrency {})",
            self.poll_interval, self.concurrency
        );

        loop {
            if *stop_rx.borrow() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!("DeleteWorker: cycle failed: {}", e);
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                changed = stop_rx.changed() => {
                    // 发送端已关闭也视为停止
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(WorkerState::Stopped);
        info!("DeleteWorker stopped");
    }
}

/// 按轮转方式把任务分成至多 `concurrency` 份
fn split_into_shares(tasks: Vec<DeleteTask>, concurrency: usize) -> Vec<Vec<DeleteTask>> {
    let count = concurrency.min(tasks.len()).max(1);
    let mut shares: Vec<Vec<DeleteTask>> = (0..count).map(|_| Vec::new()).collect();
    for (i, task) in tasks.into_iter().enumerate() {
        shares[i % count].push(task);
    }
    shares
}

/// 后台 worker 句柄
pub struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<WorkerState>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state_rx.borrow()
    }

    /// Signal the loop to stop and wait for the current cycle to finish.
    pub async fn stop(self) {
        self.stop_tx.send_replace(true);
        if let Err(e) = self.join.await {
            error!("DeleteWorker task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, UrlRecord};

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval_ms: 10,
            concurrency: 2,
        }
    }

    #[test]
    fn test_split_into_shares() {
        let tasks: Vec<DeleteTask> = (0..5)
            .map(|i| DeleteTask::registered(format!("c{}", i), 1))
            .collect();

        let shares = split_into_shares(tasks.clone(), 2);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].len(), 3);
        assert_eq!(shares[1].len(), 2);

        assert_eq!(split_into_shares(tasks.clone(), 10).len(), 5);
        assert_eq!(split_into_shares(Vec::new(), 3).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = DeleteWorker::from_storage(storage, &fast_config());

        let report = worker.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_cycle_marks_owned_records_deleted() {
        let storage = Arc::new(MemoryStorage::new());
        for i in 0..6 {
            storage
                .insert(UrlRecord::new(format!("c{}", i), format!("https://x.test/{}", i)).with_owner(1))
                .await
                .unwrap();
        }
        let codes: Vec<String> = (0..6).map(|i| format!("c{}", i)).collect();
        storage.register(&codes, 1).await.unwrap();

        let worker = DeleteWorker::from_storage(storage.clone(), &fast_config());
        let report = worker.run_cycle().await.unwrap();

        assert_eq!(report.found, 6);
        assert_eq!(report.done, 6);
        for code in &codes {
            assert!(storage.lookup(code).await.unwrap().deleted);
        }
        assert!(storage
            .list_by_status(TaskStatus::Registered)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let storage = Arc::new(MemoryStorage::new());
        let handle = DeleteWorker::from_storage(storage, &fast_config()).spawn();

        sleep(Duration::from_millis(30)).await;
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_reaches_stopped_state() {
        let storage = Arc::new(MemoryStorage::new());
        let worker = DeleteWorker::from_storage(storage, &fast_config());
        let mut state_rx = worker.state.subscribe();
        let handle = worker.spawn();

        handle.stop().await;
        assert_eq!(*state_rx.borrow_and_update(), WorkerState::Stopped);
    }
}
