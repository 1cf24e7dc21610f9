//! Process-level concerns: logging setup and graceful shutdown.

pub mod logging;
pub mod shutdown;

pub use logging::init_logging;
