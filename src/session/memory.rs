use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::error::SessionError;
use super::store::SessionHandler;

#[derive(Debug, Clone)]
struct Record {
    payload: Vec<u8>,
    last_activity: DateTime<Utc>,
}

/// In-process session store for tests and single-process development.
/// Same protocol and semantics as `PgSessionStore`; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }
}

#[async_trait]
impl SessionHandler for MemorySessionStore {
    async fn read(&self, id: &str) -> Result<Vec<u8>, SessionError> {
        let records = self.records.read().await;
        Ok(records.get(id).map(|r| r.payload.clone()).unwrap_or_default())
    }

    async fn write(&self, id: &str, payload: &[u8]) -> Result<(), SessionError> {
        let mut records = self.records.write().await;
        records.insert(
            id.to_string(),
            Record {
                payload: payload.to_vec(),
                last_activity: Utc::now(),
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn gc(&self, max_lifetime_secs: u64) -> Result<u64, SessionError> {
        // Threshold is taken under the write lock, so no write can interleave
        let mut records = self.records.write().await;
        let threshold = i64::try_from(max_lifetime_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_sub_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = records.len();
        records.retain(|_, record| record.last_activity >= threshold);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backdate(store: &MemorySessionStore, id: &str, secs: i64) {
        let mut records = store.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.last_activity = Utc::now() - Duration::seconds(secs);
        }
    }

    #[tokio::test]
    async fn write_then_read_returns_payload() {
        let store = MemorySessionStore::new();
        store.write("abc", b"payload").await.unwrap();
        assert_eq!(store.read("abc").await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn missing_id_reads_empty() {
        let store = MemorySessionStore::new();
        assert!(store.read("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn destroy_then_read_is_empty_and_idempotent() {
        let store = MemorySessionStore::new();
        store.write("abc", b"payload").await.unwrap();
        store.destroy("abc").await.unwrap();
        assert!(store.read("abc").await.unwrap().is_empty());
        store.destroy("abc").await.unwrap();
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let store = MemorySessionStore::new();
        store.write("abc", b"first").await.unwrap();
        store.write("abc", b"second").await.unwrap();
        assert_eq!(store.read("abc").await.unwrap(), b"second");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn gc_removes_only_idle_records() {
        let store = MemorySessionStore::new();
        store.write("stale", b"old").await.unwrap();
        store.write("fresh", b"new").await.unwrap();
        backdate(&store, "stale", 3_600).await;

        let removed = store.gc(600).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!store.contains("stale").await);
        assert!(store.contains("fresh").await);
    }

    #[tokio::test]
    async fn refreshed_record_survives_gc() {
        let store = MemorySessionStore::new();
        store.write("abc", b"v1").await.unwrap();
        backdate(&store, "abc", 3_600).await;
        // A write before the delete runs refreshes last-activity
        store.write("abc", b"v2").await.unwrap();

        assert_eq!(store.gc(600).await.unwrap(), 0);
        assert_eq!(store.read("abc").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn huge_lifetime_removes_nothing() {
        let store = MemorySessionStore::new();
        store.write("abc", b"v1").await.unwrap();
        assert_eq!(store.gc(u64::MAX).await.unwrap(), 0);
    }
}
