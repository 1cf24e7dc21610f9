//! Link management service
//!
//! Orchestrates code generation, storage and the explicit save step for
//! backends that have one. Transport layers sit on top of this.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::shortcode::ShortCodeGenerator;
use crate::errors::{Result, StoreError};
use crate::storage::{DeleteTaskStore, LinkStore, Storage, StorageCounts, UrlRecord, User};

/// Service for link operations
pub struct LinkService {
    storage: Arc<dyn Storage>,
    generator: ShortCodeGenerator,
}

impl LinkService {
    pub fn new(storage: Arc<dyn Storage>, generator: ShortCodeGenerator) -> Self {
        Self { storage, generator }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Shorten `original_url` for `owner`.
    ///
    /// A URL that is already stored yields `Err(StoreError::OriginalExists)`
    /// carrying the existing code; see [`StoreError::existing_code`].
    pub async fn shorten(&self, original_url: &str, owner: Option<i32>) -> Result<UrlRecord> {
        if original_url.trim().is_empty() {
            return Err(StoreError::validation("original URL must not be empty"));
        }

        let code = self.generator.generate(self.storage.as_ref()).await?;
        let mut record = UrlRecord::new(code, original_url);
        record.owner_id = owner;

        match self.storage.insert(record.clone()).await {
            Ok(_) => {}
            Err(StoreError::OriginalExists(existing)) => {
                info!("Original URL already shortened as {}: {}", existing, original_url);
                return Err(StoreError::OriginalExists(existing));
            }
            Err(e) => {
                error!("Failed to store {}: {}", original_url, e);
                return Err(e);
            }
        }

        // 保存失败不回滚已完成的插入
        if let Some(saver) = self.storage.as_saver()
            && let Err(e) = saver.save(&record)
        {
            error!("Stored {} but failed to persist it: {}", record.short_code, e);
            return Err(e);
        }

        debug!("Shortened {} -> {}", original_url, record.short_code);
        Ok(record)
    }

    /// Shorten several URLs at once, returned in input order.
    ///
    /// URLs that are already stored, or repeated within `original_urls`,
    /// come back as the record that holds them; only records actually
    /// written by this call are saved.
    pub async fn shorten_batch(
        &self,
        original_urls: &[String],
        owner: Option<i32>,
    ) -> Result<Vec<UrlRecord>> {
        if original_urls.is_empty() {
            return Ok(Vec::new());
        }
        if original_urls.iter().any(|u| u.trim().is_empty()) {
            return Err(StoreError::validation("original URL must not be empty"));
        }

        // 批内重复的原始链接只生成一个短码
        let mut seen = HashSet::with_capacity(original_urls.len());
        let distinct: Vec<&str> = original_urls
            .iter()
            .map(String::as_str)
            .filter(|u| seen.insert(*u))
            .collect();

        // 已存储的原始链接直接沿用现有记录
        let mut by_original: HashMap<String, UrlRecord> = HashMap::with_capacity(distinct.len());
        let mut fresh = Vec::with_capacity(distinct.len());
        for original in distinct {
            match self.storage.lookup_code_by_original(original).await {
                Ok(code) => {
                    let existing = self.storage.lookup(&code).await?;
                    by_original.insert(original.to_string(), existing);
                }
                Err(e) if e.is_not_found() => fresh.push(original),
                Err(e) => return Err(e),
            }
        }

        let codes = self
            .generator
            .generate_batch(self.storage.as_ref(), fresh.len())
            .await?;

        let records: Vec<UrlRecord> = codes
            .into_iter()
            .zip(&fresh)
            .map(|(code, original)| {
                let mut record = UrlRecord::new(code, *original);
                record.owner_id = owner;
                record
            })
            .collect();

        let stored_as = if records.is_empty() {
            Vec::new()
        } else {
            self.storage
                .insert_batch(records.clone())
                .await
                .inspect_err(|e| error!("Batch insert of {} records failed: {}", records.len(), e))?
        };

        let saver = self.storage.as_saver();
        let mut first_failure = None;
        let mut written = 0;
        for (record, code) in records.into_iter().zip(stored_as) {
            // 查询与写入之间被其他调用抢先存储
            if code != record.short_code {
                info!(
                    "Original URL already shortened as {}: {}",
                    code, record.original_url
                );
                let existing = self.storage.lookup(&code).await?;
                by_original.insert(record.original_url, existing);
                continue;
            }

            written += 1;
            if let Some(saver) = saver
                && let Err(e) = saver.save(&record)
            {
                error!("Stored {} but failed to persist it: {}", record.short_code, e);
                first_failure.get_or_insert(e);
            }
            by_original.insert(record.original_url.clone(), record);
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        info!(
            "Shortened batch of {} URLs ({} new)",
            original_urls.len(),
            written
        );
        original_urls
            .iter()
            .map(|original| {
                by_original.get(original).cloned().ok_or_else(|| {
                    StoreError::not_found(format!("no record stored for {}", original))
                })
            })
            .collect()
    }

    pub async fn resolve(&self, short_code: &str) -> Result<UrlRecord> {
        self.storage.lookup(short_code).await
    }

    /// Queue `short_codes` for deletion on behalf of `requester_id`.
    ///
    /// Returns once the tasks are registered; the delete worker applies
    /// them on a later cycle.
    pub async fn request_deletion(&self, short_codes: &[String], requester_id: i32) -> Result<()> {
        if short_codes.is_empty() {
            return Ok(());
        }
        self.storage.register(short_codes, requester_id).await?;
        info!(
            "User {} requested deletion of {} codes",
            requester_id,
            short_codes.len()
        );
        Ok(())
    }

    pub async fn user_links(&self, owner_id: i32) -> Result<User> {
        let urls = self.storage.list_by_owner(owner_id).await?;
        Ok(User { id: owner_id, urls })
    }

    pub async fn register_user(&self) -> Result<User> {
        self.storage.register_user().await
    }

    pub async fn stats(&self) -> Result<StorageCounts> {
        self.storage.count().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.storage.ping().await
    }
}
