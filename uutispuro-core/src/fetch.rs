use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder, Method};
use tracing::debug;
use url::Url;

use crate::cache::{CacheKey, CachedResponse};
use crate::config::CacheConfig;
use crate::error::FetchError;

/// A request intercepted on its way from the page to the network.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// The network side of the proxy.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Resolves with whatever the server answered; only transport failures are
    /// errors here.
    async fn fetch(&self, request: &ProxyRequest) -> Result<CachedResponse, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> Result<CachedResponse, FetchError> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_connect() || err.is_timeout() {
                FetchError::Unreachable(request.url.to_string())
            } else {
                FetchError::Transport(err)
            }
        })?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        debug!(url = %request.url, status, bytes = body.len(), "network response");

        Ok(CachedResponse {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        })
    }
}
