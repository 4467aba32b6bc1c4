use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{CacheBucket, CacheKey, CacheStore, CachedResponse};
use crate::error::StoreError;

/// Bucket file layout on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    stored_at: DateTime<Utc>,
}

impl StoredEntry {
    fn from_entry(key: &CacheKey, response: &CachedResponse) -> Self {
        Self {
            method: key.method().to_string(),
            url: key.url().to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body: STANDARD.encode(&response.body),
            stored_at: response.stored_at,
        }
    }

    fn into_entry(self) -> Result<(CacheKey, CachedResponse), StoreError> {
        let key = CacheKey::from_parts(self.method, self.url);
        let body = STANDARD
            .decode(self.body.as_bytes())
            .map_err(|_| StoreError::Body(key.to_string()))?;
        let response = CachedResponse {
            status: self.status,
            headers: self.headers,
            body: body.into(),
            stored_at: self.stored_at,
        };
        Ok((key, response))
    }
}

/// Keeps every bucket as `<dir>/<name>.json`, rewritten atomically through a
/// `.json.tmp` sibling on each write.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    dir: PathBuf,
    opened: Arc<RwLock<HashMap<String, DiskBucket>>>,
}

#[derive(Debug, Clone)]
pub struct DiskBucket {
    name: String,
    path: PathBuf,
    entries: Arc<RwLock<HashMap<CacheKey, CachedResponse>>>,
    // Serializes writers so file I/O happens outside the `entries` lock.
    write_lock: Arc<Mutex<()>>,
}

impl DiskCacheStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            opened: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bucket_path(&self, name: &str) -> PathBuf {
        let file: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

async fn read_stored(path: &Path) -> Result<Option<Vec<StoredEntry>>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Loads a bucket file. When the main file cannot be read, the `.json.tmp`
/// copy of an interrupted write stands in for it; a bucket with no file at
/// all is empty. Fails only when the main file is unreadable and no usable
/// tmp copy exists.
async fn load_bucket_file(path: &Path) -> Result<Vec<StoredEntry>, StoreError> {
    let main = read_stored(path).await;
    if let Ok(Some(entries)) = main {
        return Ok(entries);
    }

    let tmp = path.with_extension("json.tmp");
    match read_stored(&tmp).await {
        Ok(Some(entries)) => {
            warn!(path = %path.display(), "bucket file unusable, restored from tmp copy");
            Ok(entries)
        }
        Ok(None) | Err(_) => match main {
            Err(e) => {
                warn!(error = %e, path = %path.display(), "bucket file corrupted and no usable tmp copy");
                Err(e)
            }
            Ok(_) => Ok(Vec::new()),
        },
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    type Bucket = DiskBucket;

    async fn open_named(&self, name: &str) -> Result<DiskBucket, StoreError> {
        if let Some(bucket) = self.opened.read().await.get(name) {
            return Ok(bucket.clone());
        }

        let mut opened = self.opened.write().await;
        if let Some(bucket) = opened.get(name) {
            return Ok(bucket.clone());
        }

        let path = self.bucket_path(name);
        let mut entries = HashMap::new();
        for stored in load_bucket_file(&path).await? {
            match stored.into_entry() {
                Ok((key, response)) => {
                    entries.insert(key, response);
                }
                Err(e) => warn!(error = %e, bucket = name, "dropping unreadable cache entry"),
            }
        }
        debug!(bucket = name, entries = entries.len(), "opened disk bucket");

        let bucket = DiskBucket {
            name: name.to_string(),
            path,
            entries: Arc::new(RwLock::new(entries)),
            write_lock: Arc::new(Mutex::new(())),
        };
        opened.insert(name.to_string(), bucket.clone());
        Ok(bucket)
    }

    async fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.opened.read().await.keys().cloned().collect();
        if let Ok(mut dir) = tokio::fs::read_dir(&self.dir).await {
            while let Ok(Some(entry)) = dir.next_entry().await {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    if !names.iter().any(|name| name == stem) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names
    }
}

impl DiskBucket {
    async fn persist(&self, entries: &HashMap<CacheKey, CachedResponse>) -> Result<(), StoreError> {
        let stored: Vec<StoredEntry> = entries
            .iter()
            .map(|(key, response)| StoredEntry::from_entry(key, response))
            .collect();
        let bytes = serde_json::to_vec_pretty(&stored)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheBucket for DiskBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), StoreError> {
        self.put_all(vec![(key, response)]).await
    }

    async fn put_all(&self, batch: Vec<(CacheKey, CachedResponse)>) -> Result<(), StoreError> {
        let _writer = self.write_lock.lock().await;
        let mut staged = self.entries.read().await.clone();
        staged.extend(batch.iter().cloned());
        self.persist(&staged).await?;
        self.entries.write().await.extend(batch);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
