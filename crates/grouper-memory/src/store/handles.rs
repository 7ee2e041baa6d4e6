//! Handle ↔ identity cache.
//!
//! Keys are lowercase handles without the leading `@`.

use super::Store;
use async_trait::async_trait;
use grouper_core::{error::GrouperError, traits::HandleCache};

/// Normalize a handle into its cache key.
pub(crate) fn cache_key(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

impl Store {
    /// Upsert a handle mapping.
    pub async fn cache_handle(
        &self,
        handle: &str,
        inbox_id: &str,
        address: Option<&str>,
    ) -> Result<(), GrouperError> {
        let key = cache_key(handle);
        if key.is_empty() {
            return Err(GrouperError::Memory("empty handle".to_string()));
        }
        sqlx::query(
            "INSERT INTO handle_cache (handle, inbox_id, address) VALUES (?, ?, ?) \
             ON CONFLICT(handle) DO UPDATE SET inbox_id = excluded.inbox_id, \
             address = COALESCE(excluded.address, handle_cache.address), \
             updated_at = datetime('now')",
        )
        .bind(&key)
        .bind(inbox_id)
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(|e| GrouperError::Memory(format!("upsert handle failed: {e}")))?;

        Ok(())
    }

    /// Look up the cached recipient for a handle.
    pub async fn cached_inbox(&self, handle: &str) -> Result<Option<String>, GrouperError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT inbox_id FROM handle_cache WHERE handle = ?")
                .bind(cache_key(handle))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| GrouperError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(|(v,)| v))
    }

    /// Number of cached handles.
    pub async fn handle_count(&self) -> Result<i64, GrouperError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM handle_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GrouperError::Memory(format!("count failed: {e}")))?;
        Ok(n)
    }
}

#[async_trait]
impl HandleCache for Store {
    async fn lookup(&self, handle: &str) -> Result<Option<String>, GrouperError> {
        self.cached_inbox(handle).await
    }

    async fn remember(
        &self,
        handle: &str,
        inbox_id: &str,
        address: Option<&str>,
    ) -> Result<(), GrouperError> {
        self.cache_handle(handle, inbox_id, address).await
    }
}
