pub mod cache;
pub mod click;
pub mod clients;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod manifest;
pub mod proxy;

pub use cache::{CacheBucket, CacheKey, CacheStore, CachedResponse, DiskCacheStore, MemoryCacheStore};
pub use click::ClickBeacon;
pub use clients::{ClientRegistry, PageId, Registration};
pub use config::{ClientConfig, DEFAULT_CACHE_VERSION};
pub use error::{ConfigError, FeedError, FetchError, ProxyError, StoreError};
pub use feed::{FeedClient, FeedClientHandle, FeedPage, Locale, NewsItem, SharedContainer, VisibleList};
pub use fetch::{Fetcher, HttpFetcher, ProxyRequest};
pub use manifest::PrecacheManifest;
pub use proxy::{CacheProxy, InstallReport, Lifecycle, ProxyResponse, Source};
