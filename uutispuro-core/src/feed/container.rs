use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::RenderedItem;

/// The on-page list the feed client mutates. Index 0 is the top (newest).
pub trait ContainerPort: Send {
    fn contains(&self, id: &str) -> bool;

    fn prepend(&mut self, item: RenderedItem);

    fn evict_oldest(&mut self) -> Option<RenderedItem>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory container; also what a page starts from when it was server
/// rendered with a first batch of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleList {
    items: VecDeque<RenderedItem>,
}

impl VisibleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from items ordered newest first.
    pub fn from_items(items: impl IntoIterator<Item = RenderedItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &RenderedItem> {
        self.items.iter()
    }
}

impl ContainerPort for VisibleList {
    fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    fn prepend(&mut self, item: RenderedItem) {
        self.items.push_front(item);
    }

    fn evict_oldest(&mut self) -> Option<RenderedItem> {
        self.items.pop_back()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Container shared between the feed task and whoever displays it. The feed
/// task holds the lock for a whole merge, so readers never see half a page.
#[derive(Debug, Default)]
pub struct SharedContainer<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> Clone for SharedContainer<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> SharedContainer<C> {
    pub fn new(container: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(container)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
