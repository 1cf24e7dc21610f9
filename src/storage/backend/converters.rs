use std::str::FromStr;

use tracing::warn;

use crate::storage::models::{DeleteTask, TaskStatus, UrlRecord};
use migration::entities::{delete_task, url};

/// 将 url Model 转换为 UrlRecord
pub fn model_to_record(model: url::Model) -> UrlRecord {
    UrlRecord {
        short_code: model.short_url,
        original_url: model.original_url,
        id: model.uuid,
        owner_id: model.user_id,
        deleted: model.is_deleted,
    }
}

/// 将 UrlRecord 转换为 ActiveModel（用于插入）
pub fn record_to_active_model(record: &UrlRecord) -> url::ActiveModel {
    use sea_orm::ActiveValue::*;

    let uuid = if record.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        record.id.clone()
    };

    url::ActiveModel {
        short_url: Set(record.short_code.clone()),
        original_url: Set(record.original_url.clone()),
        uuid: Set(uuid),
        user_id: Set(record.owner_id),
        is_deleted: Set(record.deleted),
    }
}

/// 将 delete_task Model 转换为 DeleteTask；未知状态按 Registered 处理
pub fn model_to_task(model: delete_task::Model) -> DeleteTask {
    let status = TaskStatus::from_str(&model.status).unwrap_or_else(|e| {
        warn!("{} for task {}, treating as Registered", e, model.short_url);
        TaskStatus::Registered
    });

    DeleteTask {
        short_code: model.short_url,
        requester_id: model.user_id,
        status,
        registered_at: model.registered_at,
    }
}

pub fn task_to_active_model(task: &DeleteTask) -> delete_task::ActiveModel {
    use sea_orm::ActiveValue::*;

    delete_task::ActiveModel {
        short_url: Set(task.short_code.clone()),
        user_id: Set(task.requester_id),
        status: Set(task.status.as_str().to_string()),
        registered_at: Set(task.registered_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::ActiveValue;

    fn create_test_model() -> url::Model {
        url::Model {
            short_url: "Ab3dE6gH9k".to_string(),
            original_url: "https://x.test/a".to_string(),
            uuid: "6f1c".to_string(),
            user_id: Some(3),
            is_deleted: true,
        }
    }

    #[test]
    fn test_model_to_record() {
        let record = model_to_record(create_test_model());

        assert_eq!(record.short_code, "Ab3dE6gH9k");
        assert_eq!(record.original_url, "https://x.test/a");
        assert_eq!(record.id, "6f1c");
        assert_eq!(record.owner_id, Some(3));
        assert!(record.deleted);
    }

    #[test]
    fn test_record_to_active_model_keeps_id() {
        let record = model_to_record(create_test_model());
        let active_model = record_to_active_model(&record);

        assert_eq!(active_model.uuid, ActiveValue::Set("6f1c".to_string()));
        assert_eq!(active_model.user_id, ActiveValue::Set(Some(3)));
        assert_eq!(active_model.is_deleted, ActiveValue::Set(true));
    }

    #[test]
    fn test_record_to_active_model_fills_missing_id() {
        let mut record = UrlRecord::new("abc", "https://x.test");
        record.id.clear();

        let active_model = record_to_active_model(&record);
        match active_model.uuid {
            ActiveValue::Set(uuid) => assert!(!uuid.is_empty()),
            other => panic!("uuid should be set, got {:?}", other),
        }
    }

    #[test]
    fn test_model_to_task_unknown_status() {
        let task = model_to_task(delete_task::Model {
            short_url: "abc".to_string(),
            user_id: 1,
            status: "Pending".to_string(),
            registered_at: Utc::now(),
        });
        assert_eq!(task.status, TaskStatus::Registered);
    }

    #[test]
    fn test_task_roundtrip() {
        let task = DeleteTask::registered("abc", 5);
        let active_model = task_to_active_model(&task);
        assert_eq!(
            active_model.status,
            ActiveValue::Set("Registered".to_string())
        );
        assert_eq!(active_model.user_id, ActiveValue::Set(5));
    }
}
