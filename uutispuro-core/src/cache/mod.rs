//! Versioned cache buckets.
//!
//! A [`CacheStore`] hands out named buckets. Each bucket maps a [`CacheKey`]
//! (method + URL) to the most recent [`CachedResponse`] written for it; writes
//! to the same key are last-writer-wins.

mod disk;
mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Method;
use url::Url;

use crate::error::StoreError;

pub use disk::{DiskBucket, DiskCacheStore};
pub use memory::{MemoryBucket, MemoryCacheStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Fragments never reach the network, so they are not part of the identity.
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(&Method::GET, url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn from_parts(method: String, url: String) -> Self {
        Self { method, url }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait CacheBucket: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError>;

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), StoreError>;

    /// Stores a batch in one step; either every entry lands or none does.
    async fn put_all(&self, entries: Vec<(CacheKey, CachedResponse)>) -> Result<(), StoreError>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    type Bucket: CacheBucket + Clone + 'static;

    /// Opens the bucket called `name`, creating it when absent. Opening the
    /// same name twice yields handles onto the same entries.
    async fn open_named(&self, name: &str) -> Result<Self::Bucket, StoreError>;

    async fn bucket_names(&self) -> Vec<String>;
}
