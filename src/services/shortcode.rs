//! Random short-code generation with backend uniqueness checks.

use std::collections::HashSet;
use std::iter;

use tracing::{debug, warn};

use crate::config::ShortCodeConfig;
use crate::errors::{Result, StoreError};
use crate::storage::LinkStore;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate_random_code(length: usize) -> String {
    iter::repeat_with(|| CHARSET[rand::random_range(0..CHARSET.len())] as char)
        .take(length)
        .collect()
}

/// 短码生成器
///
/// Codes are checked against the backend at call time only; there is no
/// reservation, so two concurrent callers can still draw the same free code.
/// The backend's insert path is the final arbiter.
#[derive(Debug, Clone, Copy)]
pub struct ShortCodeGenerator {
    length: usize,
    max_attempts: u32,
}

impl ShortCodeGenerator {
    pub fn new(length: usize, max_attempts: u32) -> Self {
        Self {
            length,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &ShortCodeConfig) -> Self {
        Self::new(config.length, config.max_attempts)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draw a code that `store` does not currently hold.
    pub async fn generate(&self, store: &dyn LinkStore) -> Result<String> {
        self.generate_excluding(store, &HashSet::new()).await
    }

    /// Draw `count` distinct codes, each verified against `store` and
    /// against the codes already drawn for this batch.
    pub async fn generate_batch(&self, store: &dyn LinkStore, count: usize) -> Result<Vec<String>> {
        let mut issued = HashSet::with_capacity(count);
        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let code = self.generate_excluding(store, &issued).await?;
            issued.insert(code.clone());
            codes.push(code);
        }
        Ok(codes)
    }

    async fn generate_excluding(
        &self,
        store: &dyn LinkStore,
        issued: &HashSet<String>,
    ) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let code = generate_random_code(self.length);
            if issued.contains(&code) || store.exists(&code).await? {
                debug!("Short code collision on attempt {}: {}", attempt, code);
                continue;
            }
            return Ok(code);
        }

        warn!(
            "No free short code of length {} after {} attempts",
            self.length, self.max_attempts
        );
        Err(StoreError::exhausted(format!(
            "no free short code of length {} after {} attempts",
            self.length, self.max_attempts
        )))
    }
}

impl Default for ShortCodeGenerator {
    fn default() -> Self {
        Self::from_config(&ShortCodeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, UrlRecord};

    #[test]
    fn test_random_code_charset_and_length() {
        let code = generate_random_code(64);
        assert_eq!(code.len(), 64);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_generate_default_length() {
        let store = MemoryStorage::new();
        let code = ShortCodeGenerator::default().generate(&store).await.unwrap();
        assert_eq!(code.len(), 10);
    }

    #[tokio::test]
    async fn test_generate_exhausted_when_space_is_full() {
        // 长度为 1 的短码只有 62 种，全部占用后必然耗尽
        let store = MemoryStorage::new();
        let records: Vec<UrlRecord> = CHARSET
            .iter()
            .map(|c| {
                let code = (*c as char).to_string();
                let original = format!("https://x.test/{}", code);
                UrlRecord::new(code, original)
            })
            .collect();
        store.insert_batch(records).await.unwrap();

        let err = ShortCodeGenerator::new(1, 5).generate(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Exhausted(_)));
    }

    #[tokio::test]
    async fn test_generate_batch_codes_are_distinct() {
        let store = MemoryStorage::new();
        // 短码空间只有 62 个，批内去重才能保证不重复
        let codes = ShortCodeGenerator::new(1, 500)
            .generate_batch(&store, 40)
            .await
            .unwrap();

        let unique: HashSet<&String> = codes.iter().collect();
        assert_eq!(codes.len(), 40);
        assert_eq!(unique.len(), 40);
    }
}
