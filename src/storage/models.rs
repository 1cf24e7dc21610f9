use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// 存储的短链接记录
///
/// 序列化字段名即追加日志的行格式：
/// `{"short_url", "original_url", "uuid", "user_id", "is_deleted"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    #[serde(rename = "short_url")]
    pub short_code: String,
    pub original_url: String,
    #[serde(rename = "uuid", default)]
    pub id: String,
    /// None 表示匿名创建
    #[serde(rename = "user_id", default)]
    pub owner_id: Option<i32>,
    #[serde(rename = "is_deleted", default)]
    pub deleted: bool,
}

impl UrlRecord {
    pub fn new(short_code: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            short_code: short_code.into(),
            original_url: original_url.into(),
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: None,
            deleted: false,
        }
    }

    pub fn with_owner(mut self, owner_id: i32) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// 用户；`urls` 只是后端记录的视图
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: i32,
    pub urls: Vec<UrlRecord>,
}

impl User {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            urls: Vec::new(),
        }
    }
}

/// 删除任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Registered,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Registered => "Registered",
            TaskStatus::Done => "Done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Registered" => Ok(TaskStatus::Registered),
            "Done" => Ok(TaskStatus::Done),
            _ => Err(format!("Invalid task status: '{}'", s)),
        }
    }
}

/// 删除任务，按短码索引；只会从 Registered 变为 Done，从不物理删除
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub short_code: String,
    pub requester_id: i32,
    pub status: TaskStatus,
    pub registered_at: DateTime<Utc>,
}

impl DeleteTask {
    pub fn registered(short_code: impl Into<String>, requester_id: i32) -> Self {
        Self {
            short_code: short_code.into(),
            requester_id,
            status: TaskStatus::Registered,
            registered_at: Utc::now(),
        }
    }
}

/// 单个删除任务的执行结果
#[derive(Debug, Clone)]
pub struct MarkDeleteResult {
    pub task: DeleteTask,
    pub outcome: Result<()>,
}

impl MarkDeleteResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// 记录数与用户数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageCounts {
    pub urls: usize,
    pub users: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_log_field_names() {
        let record = UrlRecord {
            short_code: "Ab3dE6gH9k".to_string(),
            original_url: "https://x.test/a".to_string(),
            id: "0b7e".to_string(),
            owner_id: Some(7),
            deleted: false,
        };

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["short_url"], "Ab3dE6gH9k");
        assert_eq!(json["original_url"], "https://x.test/a");
        assert_eq!(json["uuid"], "0b7e");
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["is_deleted"], false);
    }

    #[test]
    fn test_record_deserializes_minimal_line() {
        let record: UrlRecord =
            serde_json::from_str(r#"{"short_url":"abc","original_url":"https://x.test"}"#)
                .unwrap();
        assert_eq!(record.owner_id, None);
        assert!(!record.deleted);
        assert!(record.id.is_empty());
    }

    #[test]
    fn test_ownership() {
        let record = UrlRecord::new("abc", "https://x.test").with_owner(3);
        assert!(record.is_owned_by(3));
        assert!(!record.is_owned_by(4));
        assert!(!UrlRecord::new("abc", "https://x.test").is_owned_by(3));
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!("Done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!(TaskStatus::Registered.to_string(), "Registered");
        assert!("done".parse::<TaskStatus>().is_err());
    }
}
