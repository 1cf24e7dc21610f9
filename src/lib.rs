//! shortvault - short-code to URL storage
//!
//! Stores short-code mappings with at most one code per original URL,
//! behind one contract with three backends (memory, append-only file,
//! relational database), and applies deletions asynchronously through a
//! polling background worker.
//!
//! # Architecture
//! - `storage`: the storage contract and its memory, file and SeaORM backends
//! - `services`: short-code generation and link workflows
//! - `worker`: the background delete worker
//! - `config`: configuration loading
//! - `system`: logging and shutdown

pub mod cli;
pub mod config;
pub mod errors;
pub mod services;
pub mod storage;
pub mod system;
pub mod worker;
