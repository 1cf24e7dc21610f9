mod r#impl;
mod structs;

pub use r#impl::{get_config, init_config_with};
pub use structs::*;
