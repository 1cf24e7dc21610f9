use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
    Validation(String),
    NotFound(String),
    /// 原始链接已存在，载荷为已有的短码
    OriginalExists(String),
    Exhausted(String),
    OwnershipViolation(String),
    Unavailable(String),
    Timeout(String),
}

impl StoreError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DatabaseConfig(_) => "E001",
            StoreError::DatabaseConnection(_) => "E002",
            StoreError::DatabaseOperation(_) => "E003",
            StoreError::FileOperation(_) => "E004",
            StoreError::Serialization(_) => "E005",
            StoreError::Validation(_) => "E006",
            StoreError::NotFound(_) => "E007",
            StoreError::OriginalExists(_) => "E008",
            StoreError::Exhausted(_) => "E009",
            StoreError::OwnershipViolation(_) => "E010",
            StoreError::Unavailable(_) => "E011",
            StoreError::Timeout(_) => "E012",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            StoreError::DatabaseConfig(_) => "Database Configuration Error",
            StoreError::DatabaseConnection(_) => "Database Connection Error",
            StoreError::DatabaseOperation(_) => "Database Operation Error",
            StoreError::FileOperation(_) => "File Operation Error",
            StoreError::Serialization(_) => "Serialization Error",
            StoreError::Validation(_) => "Validation Error",
            StoreError::NotFound(_) => "Resource Not Found",
            StoreError::OriginalExists(_) => "Original URL Already Shortened",
            StoreError::Exhausted(_) => "Short Code Space Exhausted",
            StoreError::OwnershipViolation(_) => "Ownership Violation",
            StoreError::Unavailable(_) => "Backend Unavailable",
            StoreError::Timeout(_) => "Operation Timed Out",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            StoreError::DatabaseConfig(msg)
            | StoreError::DatabaseConnection(msg)
            | StoreError::DatabaseOperation(msg)
            | StoreError::FileOperation(msg)
            | StoreError::Serialization(msg)
            | StoreError::Validation(msg)
            | StoreError::NotFound(msg)
            | StoreError::OriginalExists(msg)
            | StoreError::Exhausted(msg)
            | StoreError::OwnershipViolation(msg)
            | StoreError::Unavailable(msg)
            | StoreError::Timeout(msg) => msg,
        }
    }

    /// Short code of the record that already holds the original URL.
    pub fn existing_code(&self) -> Option<&str> {
        match self {
            StoreError::OriginalExists(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for StoreError {}

// 便捷的构造函数
impl StoreError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        StoreError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        StoreError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        StoreError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        StoreError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        StoreError::Serialization(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        StoreError::NotFound(msg.into())
    }

    pub fn original_exists<T: Into<String>>(existing_code: T) -> Self {
        StoreError::OriginalExists(existing_code.into())
    }

    pub fn exhausted<T: Into<String>>(msg: T) -> Self {
        StoreError::Exhausted(msg.into())
    }

    pub fn ownership_violation<T: Into<String>>(msg: T) -> Self {
        StoreError::OwnershipViolation(msg.into())
    }

    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        StoreError::Unavailable(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        StoreError::Timeout(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
