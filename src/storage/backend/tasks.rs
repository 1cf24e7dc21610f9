//! Delete-task table operations for SeaOrmStorage

use std::collections::BTreeMap;

use sea_orm::{
    ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::OnConflict,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::{model_to_task, task_to_active_model};
use crate::errors::Result;
use crate::storage::models::{DeleteTask, TaskStatus};

use migration::entities::delete_task;

impl SeaOrmStorage {
    /// 注册删除任务；同一短码重复注册时覆盖为新的 Registered 任务
    pub(super) async fn register_tasks(&self, short_codes: &[String], requester_id: i32) -> Result<()> {
        if short_codes.is_empty() {
            return Ok(());
        }

        let db = &self.db;
        let active_models: Vec<delete_task::ActiveModel> = short_codes
            .iter()
            .map(|code| task_to_active_model(&DeleteTask::registered(code.clone(), requester_id)))
            .collect();

        self.run(&format!("register_tasks({})", short_codes.len()), || async {
            delete_task::Entity::insert_many(active_models.clone())
                .on_conflict(
                    OnConflict::column(delete_task::Column::ShortUrl)
                        .update_columns([
                            delete_task::Column::UserId,
                            delete_task::Column::Status,
                            delete_task::Column::RegisteredAt,
                        ])
                        .to_owned(),
                )
                .exec(db)
                .await
                .map(|_| ())
        })
        .await?;

        debug!(
            "Registered {} delete tasks for user {}",
            short_codes.len(),
            requester_id
        );
        Ok(())
    }

    pub(super) async fn find_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<DeleteTask>> {
        let db = &self.db;

        let models = self
            .run(&format!("list_tasks({})", status), || async {
                delete_task::Entity::find()
                    .filter(delete_task::Column::Status.eq(status.as_str()))
                    .order_by_asc(delete_task::Column::RegisteredAt)
                    .all(db)
                    .await
            })
            .await?;

        Ok(models.into_iter().map(model_to_task).collect())
    }

    /// 按请求者分组更新，已被其他用户重新注册的任务不受影响
    pub(super) async fn set_task_status(&self, tasks: &[DeleteTask], status: TaskStatus) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let mut by_requester: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        for task in tasks {
            by_requester
                .entry(task.requester_id)
                .or_default()
                .push(task.short_code.clone());
        }

        let db = &self.db;
        self.run(&format!("update_task_status({})", tasks.len()), || async {
            let txn = db.begin().await?;
            for (requester_id, codes) in &by_requester {
                delete_task::Entity::update_many()
                    .set(delete_task::ActiveModel {
                        status: Set(status.as_str().to_string()),
                        ..Default::default()
                    })
                    .filter(delete_task::Column::ShortUrl.is_in(codes.iter().cloned()))
                    .filter(delete_task::Column::UserId.eq(*requester_id))
                    .exec(&txn)
                    .await?;
            }
            txn.commit().await?;
            Ok::<_, DbErr>(())
        })
        .await?;

        debug!("Moved {} delete tasks to {}", tasks.len(), status);
        Ok(())
    }
}
