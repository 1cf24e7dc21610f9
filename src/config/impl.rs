use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config_with() first.")
        .load_full()
}

/// Initialize the global configuration with an already loaded value.
///
/// Has no effect if the configuration was initialized before.
///
/// # Examples
/// ```no_run
/// use shortvault::config::{StaticConfig, init_config_with};
/// init_config_with(StaticConfig::load_from("config.toml"));
/// ```
pub fn init_config_with(config: StaticConfig) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(config));
}
