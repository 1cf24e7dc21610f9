use serde::{Deserialize, Serialize};

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    #[default]
    File,
    #[serde(alias = "db", alias = "postgres", alias = "sqlite", alias = "mysql")]
    Database,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Database => write!(f, "database"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "database" | "db" | "postgres" | "sqlite" | "mysql" => Ok(Self::Database),
            _ => Err(format!(
                "Invalid storage mode: '{}'. Valid: memory, file, database",
                s
            )),
        }
    }
}

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 优先级：ENV > config.toml > 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub shortcode: ShortCodeConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从指定 TOML 文件和环境变量加载配置
    ///
    /// ENV 前缀：SV，分隔符：__
    /// 示例：SV__STORAGE__MODE=database
    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SV")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,
    /// 追加写日志文件（file 模式）
    #[serde(default = "default_file_path")]
    pub file_path: String,
    /// sqlite:// | postgres:// | mysql://（database 模式）
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// 单次数据库操作超时
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 短码生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortCodeConfig {
    #[serde(default = "default_code_length")]
    pub length: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// 删除 worker 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// fan-out 并发数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_file_path() -> String {
    "storage.jsonl".to_string()
}

fn default_database_url() -> String {
    "sqlite://shortvault.db?mode=rwc".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_code_length() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            file_path: default_file_path(),
            database_url: default_database_url(),
            pool_size: default_pool_size(),
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for ShortCodeConfig {
    fn default() -> Self {
        Self {
            length: default_code_length(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.storage.mode, StorageMode::File);
        assert_eq!(config.shortcode.length, 10);
        assert_eq!(config.shortcode.max_attempts, 5);
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.storage.timeout_ms, 15_000);
    }

    #[test]
    fn test_storage_mode_from_str() {
        assert_eq!("MEMORY".parse::<StorageMode>().unwrap(), StorageMode::Memory);
        assert_eq!("file".parse::<StorageMode>().unwrap(), StorageMode::File);
        assert_eq!("postgres".parse::<StorageMode>().unwrap(), StorageMode::Database);
        assert!("redis".parse::<StorageMode>().is_err());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: StaticConfig = toml::from_str(
            r#"
            [storage]
            mode = "memory"

            [worker]
            concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.mode, StorageMode::Memory);
        assert_eq!(config.storage.file_path, "storage.jsonl");
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.worker.poll_interval_ms, 1000);
    }

    #[test]
    fn test_sample_config_roundtrips() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.storage.mode, StorageMode::File);
        assert_eq!(parsed.shortcode.length, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("shortvault.toml");
        std::fs::write(&path, "[shortcode]\nlength = 12\n").unwrap();

        let config = StaticConfig::load_from(path.to_str().unwrap());
        assert_eq!(config.shortcode.length, 12);
    }
}
