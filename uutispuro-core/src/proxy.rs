//! Stale-while-revalidate caching proxy.
//!
//! The hosting runtime drives [`CacheProxy`] through its lifecycle events:
//! [`on_install`](CacheProxy::on_install) precaches the manifest into the
//! versioned bucket, [`on_activate`](CacheProxy::on_activate) claims open
//! pages, and [`on_fetch`](CacheProxy::on_fetch) answers every request from the
//! bucket first while refreshing it from the network in the background.

use std::sync::Arc;

use futures_util::future::try_join_all;
use reqwest::Method;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheBucket, CacheKey, CacheStore, CachedResponse};
use crate::clients::ClientRegistry;
use crate::error::{FetchError, ProxyError};
use crate::fetch::{Fetcher, ProxyRequest};
use crate::manifest::PrecacheManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the runtime may try again.
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub bucket: String,
    pub cached: usize,
    /// Take over from the previous version without waiting for its pages to close.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

/// Background bucket write started by a fetch. Awaiting it is optional; the
/// write proceeds either way.
#[derive(Debug)]
pub struct Revalidation(Option<JoinHandle<bool>>);

impl Revalidation {
    fn none() -> Self {
        Self(None)
    }

    /// Resolves to `true` when the bucket entry was replaced.
    pub async fn finished(self) -> bool {
        match self.0 {
            Some(handle) => handle.await.unwrap_or(false),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct ProxyResponse {
    pub response: CachedResponse,
    pub source: Source,
    pub revalidation: Revalidation,
}

pub struct CacheProxy<S: CacheStore, F: Fetcher> {
    store: Arc<S>,
    fetcher: Arc<F>,
    version: String,
    origin: Url,
    manifest: PrecacheManifest,
    state: Arc<RwLock<Lifecycle>>,
}

impl<S: CacheStore, F: Fetcher> Clone for CacheProxy<S, F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            version: self.version.clone(),
            origin: self.origin.clone(),
            manifest: self.manifest.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S: CacheStore, F: Fetcher> CacheProxy<S, F> {
    pub fn new(
        store: S,
        fetcher: F,
        version: impl Into<String>,
        origin: Url,
        manifest: PrecacheManifest,
    ) -> Self {
        Self {
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            version: version.into(),
            origin,
            manifest,
            state: Arc::new(RwLock::new(Lifecycle::Parsed)),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.state.read().await
    }

    pub async fn on_install(&self) -> Result<InstallReport, ProxyError> {
        *self.state.write().await = Lifecycle::Installing;
        info!(bucket = %self.version, paths = self.manifest.len(), "installing caching proxy");

        match self.precache().await {
            Ok(cached) => {
                *self.state.write().await = Lifecycle::Installed;
                info!(bucket = %self.version, cached, "precache complete, skipping wait");
                Ok(InstallReport {
                    bucket: self.version.clone(),
                    cached,
                    skip_waiting: true,
                })
            }
            Err(err) => {
                *self.state.write().await = Lifecycle::Redundant;
                warn!(bucket = %self.version, error = %err, "install failed");
                Err(err)
            }
        }
    }

    // Every manifest entry is fetched before anything is written, so a
    // failed install leaves the bucket as it was.
    async fn precache(&self) -> Result<usize, ProxyError> {
        let bucket = self.store.open_named(&self.version).await?;
        let urls = self.manifest.resolve(&self.origin).map_err(|err| ProxyError::Precache {
            url: self.origin.to_string(),
            source: FetchError::Url(err),
        })?;

        let fetches = urls.into_iter().map(|url| {
            let fetcher = self.fetcher.clone();
            async move {
                let request = ProxyRequest::get(url);
                let response = fetcher
                    .fetch(&request)
                    .await
                    .map_err(|source| ProxyError::Precache {
                        url: request.url.to_string(),
                        source,
                    })?;
                if !response.is_success() {
                    return Err(ProxyError::Precache {
                        url: request.url.to_string(),
                        source: FetchError::Status {
                            url: request.url.to_string(),
                            status: response.status,
                        },
                    });
                }
                Ok((request.key(), response))
            }
        });

        let staged = try_join_all(fetches).await?;
        let cached = staged.len();
        bucket.put_all(staged).await?;
        Ok(cached)
    }

    /// Claims already-open pages so the new version serves them without a
    /// reload. Buckets of older versions are left in place.
    pub async fn on_activate(&self, clients: &ClientRegistry) -> Result<usize, ProxyError> {
        {
            let mut state = self.state.write().await;
            match *state {
                Lifecycle::Installed | Lifecycle::Activated => *state = Lifecycle::Activating,
                _ => return Err(ProxyError::NotInstalled),
            }
        }
        let claimed = clients.claim(&self.version).await;
        *self.state.write().await = Lifecycle::Activated;
        info!(bucket = %self.version, claimed, "claimed open pages");
        Ok(claimed)
    }

    /// Picks up a version installed by an earlier run: a persisted, non-empty
    /// bucket for this version means the proxy was already active.
    pub async fn resume(&self) -> Result<bool, ProxyError> {
        let bucket = self.store.open_named(&self.version).await?;
        if bucket.is_empty().await {
            return Ok(false);
        }
        *self.state.write().await = Lifecycle::Activated;
        debug!(bucket = %self.version, "resumed active proxy");
        Ok(true)
    }

    pub async fn on_fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        if self.lifecycle().await != Lifecycle::Activated || request.method != Method::GET {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(ProxyResponse {
                response,
                source: Source::Network,
                revalidation: Revalidation::none(),
            });
        }

        let bucket = self.store.open_named(&self.version).await?;
        let key = request.key();
        let cached = match bucket.get(&key).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(%key, error = %err, "cache lookup failed, going to network");
                None
            }
        };

        if let Some(response) = cached {
            debug!(%key, "serving from cache");
            let revalidation = self.spawn_refresh(bucket, key, request);
            return Ok(ProxyResponse {
                response,
                source: Source::Cache,
                revalidation,
            });
        }

        debug!(%key, "cache miss, fetching from network");
        let response = self.fetcher.fetch(&request).await?;
        let revalidation = if response.is_success() {
            let fresh = response.clone();
            Revalidation(Some(tokio::spawn(store_fresh(bucket, key, fresh))))
        } else {
            Revalidation::none()
        };
        Ok(ProxyResponse {
            response,
            source: Source::Network,
            revalidation,
        })
    }

    fn spawn_refresh(&self, bucket: S::Bucket, key: CacheKey, request: ProxyRequest) -> Revalidation {
        let fetcher = self.fetcher.clone();
        Revalidation(Some(tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => store_fresh(bucket, key, response).await,
                Ok(response) => {
                    debug!(%key, status = response.status, "keeping cached copy");
                    false
                }
                Err(err) => {
                    debug!(%key, error = %err, "background refresh failed");
                    false
                }
            }
        })))
    }
}

async fn store_fresh<B: CacheBucket>(bucket: B, key: CacheKey, response: CachedResponse) -> bool {
    match bucket.put(key.clone(), response).await {
        Ok(()) => {
            debug!(%key, bucket = bucket.name(), "cache entry refreshed");
            true
        }
        Err(err) => {
            warn!(%key, error = %err, "failed to store response");
            false
        }
    }
}
