//! Query operations for SeaOrmStorage
//!
//! This module contains all read-only database operations.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use tracing::error;

use super::SeaOrmStorage;
use super::converters::model_to_record;
use crate::errors::{Result, StoreError};
use crate::storage::models::{StorageCounts, UrlRecord};

use migration::entities::{url, user};

impl SeaOrmStorage {
    pub(super) async fn find_by_code(&self, short_code: &str) -> Result<UrlRecord> {
        let db = &self.db;

        let model = self
            .run(&format!("lookup({})", short_code), || async {
                url::Entity::find_by_id(short_code.to_string()).one(db).await
            })
            .await?;

        model
            .map(model_to_record)
            .ok_or_else(|| StoreError::not_found(format!("no record for short code {}", short_code)))
    }

    pub(super) async fn find_code_by_original(&self, original_url: &str) -> Result<String> {
        let db = &self.db;

        let model = self
            .run("lookup_code_by_original", || async {
                url::Entity::find()
                    .filter(url::Column::OriginalUrl.eq(original_url))
                    .one(db)
                    .await
            })
            .await?;

        model
            .map(|m| m.short_url)
            .ok_or_else(|| StoreError::not_found(format!("no short code for original {}", original_url)))
    }

    pub(super) async fn code_exists(&self, short_code: &str) -> Result<bool> {
        let db = &self.db;

        let n = self
            .run(&format!("exists({})", short_code), || async {
                url::Entity::find()
                    .filter(url::Column::ShortUrl.eq(short_code))
                    .count(db)
                    .await
            })
            .await
            .inspect_err(|e| error!("检查短码是否存在失败: {}", e))?;

        Ok(n > 0)
    }

    pub(super) async fn find_by_owner(&self, owner_id: i32) -> Result<Vec<UrlRecord>> {
        let db = &self.db;

        let models = self
            .run(&format!("list_by_owner({})", owner_id), || async {
                url::Entity::find()
                    .filter(url::Column::UserId.eq(owner_id))
                    .order_by_asc(url::Column::ShortUrl)
                    .all(db)
                    .await
            })
            .await?;

        Ok(models.into_iter().map(model_to_record).collect())
    }

    pub(super) async fn count_rows(&self) -> Result<StorageCounts> {
        let db = &self.db;

        let urls = self
            .run("count(url)", || async { url::Entity::find().count(db).await })
            .await?;
        let users = self
            .run("count(user)", || async { user::Entity::find().count(db).await })
            .await?;

        Ok(StorageCounts {
            urls: urls as usize,
            users: users as usize,
        })
    }
}
