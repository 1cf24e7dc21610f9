//! Mutation operations for SeaOrmStorage
//!
//! This module contains all write database operations.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, QueryFilter, SqlErr, TransactionTrait,
};
use tracing::{debug, info, warn};

use super::SeaOrmStorage;
use super::converters::record_to_active_model;
use crate::errors::{Result, StoreError};
use crate::storage::models::{DeleteTask, MarkDeleteResult, UrlRecord, User};

use migration::entities::{secret_key, url, user};

/// 单条插入的事务结果
enum InsertOutcome {
    Inserted,
    /// 原始链接已存在，携带已有短码
    Duplicate(String),
    /// 唯一约束冲突（并发写入同一原始链接或短码碰撞）
    Conflict,
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl SeaOrmStorage {
    pub(super) async fn insert_record(&self, record: UrlRecord) -> Result<String> {
        let db = &self.db;
        let active_model = record_to_active_model(&record);

        let outcome = self
            .run(&format!("insert({})", record.short_code), || async {
                let txn = db.begin().await?;

                if let Some(existing) = url::Entity::find()
                    .filter(url::Column::OriginalUrl.eq(record.original_url.as_str()))
                    .one(&txn)
                    .await?
                {
                    return Ok::<_, DbErr>(InsertOutcome::Duplicate(existing.short_url));
                }

                match url::Entity::insert(active_model.clone()).exec(&txn).await {
                    Ok(_) => {
                        txn.commit().await?;
                        Ok(InsertOutcome::Inserted)
                    }
                    Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
                    Err(e) => Err(e),
                }
            })
            .await?;

        match outcome {
            InsertOutcome::Inserted => {
                debug!("Stored {} -> {}", record.short_code, record.original_url);
                Ok(record.short_code)
            }
            InsertOutcome::Duplicate(existing) => Err(StoreError::original_exists(existing)),
            InsertOutcome::Conflict => {
                // 并发写入者可能抢先插入了同一原始链接
                match self.find_code_by_original(&record.original_url).await {
                    Ok(existing) => Err(StoreError::original_exists(existing)),
                    Err(e) if e.is_not_found() => Err(StoreError::validation(format!(
                        "short code {} is already taken",
                        record.short_code
                    ))),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// 批量插入（单事务，任一约束冲突则整体回滚）
    pub(super) async fn insert_records(&self, records: Vec<UrlRecord>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let db = &self.db;
        let active_models: Vec<url::ActiveModel> =
            records.iter().map(record_to_active_model).collect();

        self.run(&format!("insert_batch({})", records.len()), || async {
            let txn = db.begin().await?;
            url::Entity::insert_many(active_models.clone())
                .exec(&txn)
                .await?;
            txn.commit().await
        })
        .await?;

        info!("Batch inserted {} records", records.len());
        Ok(records.into_iter().map(|r| r.short_code).collect())
    }

    /// 软删除；逐条判定存在性与归属，只更新通过校验的记录
    pub(super) async fn soft_delete(&self, tasks: &[DeleteTask]) -> Result<Vec<MarkDeleteResult>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let db = &self.db;
        let codes: Vec<String> = tasks.iter().map(|t| t.short_code.clone()).collect();

        let owners = self
            .run(&format!("mark_deleted({})", tasks.len()), || async {
                let txn = db.begin().await?;

                let owners: HashMap<String, Option<i32>> = url::Entity::find()
                    .filter(url::Column::ShortUrl.is_in(codes.iter().cloned()))
                    .all(&txn)
                    .await?
                    .into_iter()
                    .map(|m| (m.short_url, m.user_id))
                    .collect();

                let permitted: Vec<String> = tasks
                    .iter()
                    .filter(|t| owners.get(&t.short_code) == Some(&Some(t.requester_id)))
                    .map(|t| t.short_code.clone())
                    .collect();

                if !permitted.is_empty() {
                    url::Entity::update_many()
                        .set(url::ActiveModel {
                            is_deleted: Set(true),
                            ..Default::default()
                        })
                        .filter(url::Column::ShortUrl.is_in(permitted))
                        .exec(&txn)
                        .await?;
                }

                txn.commit().await?;
                Ok::<_, DbErr>(owners)
            })
            .await?;

        let results = tasks
            .iter()
            .map(|task| {
                let outcome = match owners.get(&task.short_code) {
                    None => Err(StoreError::not_found(format!(
                        "no record for short code {}",
                        task.short_code
                    ))),
                    Some(owner) if *owner != Some(task.requester_id) => {
                        Err(StoreError::ownership_violation(format!(
                            "user {} does not own {}",
                            task.requester_id, task.short_code
                        )))
                    }
                    Some(_) => Ok(()),
                };
                MarkDeleteResult {
                    task: task.clone(),
                    outcome,
                }
            })
            .collect();

        Ok(results)
    }

    pub(super) async fn create_user(&self) -> Result<User> {
        let db = &self.db;

        let result = self
            .run("register_user", || async {
                user::Entity::insert(user::ActiveModel {
                    created_at: Set(Utc::now()),
                    ..Default::default()
                })
                .exec(db)
                .await
            })
            .await?;

        debug!("Registered user {}", result.last_insert_id);
        Ok(User::new(result.last_insert_id))
    }

    /// 读取签名密钥，不存在时生成并保存
    pub async fn load_or_create_secret_key(&self) -> Result<String> {
        let db = &self.db;

        if let Some(model) = self
            .run("load_secret_key", || async {
                secret_key::Entity::find().one(db).await
            })
            .await?
        {
            return Ok(model.key);
        }

        let key = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );

        let inserted = self
            .run("create_secret_key", || async {
                secret_key::Entity::insert(secret_key::ActiveModel {
                    key: Set(key.clone()),
                })
                .exec(db)
                .await
            })
            .await;

        match inserted {
            Ok(_) => {
                info!("Generated new secret key");
                Ok(key)
            }
            Err(e) => {
                // 另一个实例可能同时写入了密钥，以库中已有的为准
                warn!("Failed to store secret key ({}), re-reading", e);
                self.run("load_secret_key", || async {
                    secret_key::Entity::find().one(db).await
                })
                .await?
                .map(|m| m.key)
                .ok_or(e)
            }
        }
    }
}
