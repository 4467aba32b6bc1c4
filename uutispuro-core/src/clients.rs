use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ProxyError;

pub const SITE_ROOT_SCOPE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered { scope: String },
    AlreadyControlled { version: String },
}

/// Open pages of the origin and the proxy version controlling each of them.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    pages: Arc<RwLock<HashMap<PageId, Option<String>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open_page(&self, page: PageId) {
        self.pages.write().await.entry(page).or_insert(None);
    }

    pub async fn close_page(&self, page: PageId) {
        self.pages.write().await.remove(&page);
    }

    pub async fn controller(&self, page: PageId) -> Option<String> {
        self.pages.read().await.get(&page).cloned().flatten()
    }

    /// Takes control of every open page at once; returns how many pages
    /// switched to `version`.
    pub async fn claim(&self, version: &str) -> usize {
        let mut pages = self.pages.write().await;
        let mut claimed = 0;
        for controller in pages.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Registers the proxy for `page` unless something already controls it.
    pub async fn register(&self, page: PageId, scope: &str) -> Result<Registration, ProxyError> {
        if scope != SITE_ROOT_SCOPE {
            return Err(ProxyError::Scope(scope.to_string()));
        }
        let mut pages = self.pages.write().await;
        let controller = pages.entry(page).or_insert(None);
        if let Some(version) = controller.clone() {
            debug!(page = page.0, %version, "page already controlled, skipping registration");
            return Ok(Registration::AlreadyControlled { version });
        }
        info!(page = page.0, scope, "registered caching proxy");
        Ok(Registration::Registered {
            scope: scope.to_string(),
        })
    }
}
