//! Background deletion pipeline.

mod delete_worker;

pub use crate::config::WorkerConfig;
pub use delete_worker::{CycleReport, DeleteWorker, WorkerHandle, WorkerState};
