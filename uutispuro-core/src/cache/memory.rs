use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheBucket, CacheKey, CacheStore, CachedResponse};
use crate::error::StoreError;

type Entries = Arc<RwLock<HashMap<CacheKey, CachedResponse>>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    buckets: Arc<RwLock<HashMap<String, Entries>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryBucket {
    name: String,
    entries: Entries,
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    type Bucket = MemoryBucket;

    async fn open_named(&self, name: &str) -> Result<MemoryBucket, StoreError> {
        let mut buckets = self.buckets.write().await;
        let entries = buckets.entry(name.to_string()).or_default().clone();
        Ok(MemoryBucket {
            name: name.to_string(),
            entries,
        })
    }

    async fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CacheBucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), StoreError> {
        self.entries.write().await.insert(key, response);
        Ok(())
    }

    async fn put_all(&self, batch: Vec<(CacheKey, CachedResponse)>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.extend(batch);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> CacheKey {
        CacheKey::get(&Url::parse("https://example.com").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn reopening_a_bucket_shares_entries() {
        let store = MemoryCacheStore::new();
        let first = store.open_named("v1").await.unwrap();
        first.put(key("/fi"), CachedResponse::new(200, "fi")).await.unwrap();

        let again = store.open_named("v1").await.unwrap();
        let hit = again.get(&key("/fi")).await.unwrap().unwrap();
        assert_eq!(hit.body, "fi");
    }

    #[tokio::test]
    async fn versions_do_not_merge() {
        let store = MemoryCacheStore::new();
        let v1 = store.open_named("v1").await.unwrap();
        v1.put(key("/en"), CachedResponse::new(200, "old")).await.unwrap();

        let v2 = store.open_named("v2").await.unwrap();
        assert!(v2.get(&key("/en")).await.unwrap().is_none());
        assert!(v2.is_empty().await);
        assert_eq!(store.bucket_names().await, vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryCacheStore::new();
        let bucket = store.open_named("v1").await.unwrap();
        bucket.put(key("/fi"), CachedResponse::new(200, "a")).await.unwrap();
        bucket.put(key("/fi"), CachedResponse::new(200, "b")).await.unwrap();
        assert_eq!(bucket.len().await, 1);
        assert_eq!(bucket.get(&key("/fi")).await.unwrap().unwrap().body, "b");
    }
}
