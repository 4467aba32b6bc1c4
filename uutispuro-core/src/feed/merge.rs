use tracing::debug;

use super::{ContainerPort, FeedPage, Locale, RenderedItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: Vec<String>,
    pub evicted: Vec<String>,
    /// The page's newest id matched the previous page's.
    pub skipped_page: bool,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || !self.evicted.is_empty()
    }
}

/// Merges pushed pages into a bounded container, newest on top, each id at
/// most once.
#[derive(Debug, Clone)]
pub struct FeedMerger {
    locale: Locale,
    capacity: usize,
    last_newest_id: Option<String>,
}

impl FeedMerger {
    pub fn new(locale: Locale, capacity: usize) -> Self {
        Self {
            locale,
            capacity,
            last_newest_id: None,
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_newest_id(&self) -> Option<&str> {
        self.last_newest_id.as_deref()
    }

    pub fn apply<C: ContainerPort + ?Sized>(&mut self, page: &FeedPage, container: &mut C) -> MergeReport {
        let mut report = MergeReport::default();
        self.evict_overflow(container, &mut report);
        let Some(newest) = page.newest_id() else {
            return report;
        };
        if self.last_newest_id.as_deref() == Some(newest) {
            debug!(newest, "page already applied");
            report.skipped_page = true;
            return report;
        }

        // Oldest first, so each prepend lands above the previous one.
        for item in page.news.iter().take(self.capacity).rev() {
            if container.contains(&item.id) {
                continue;
            }
            container.prepend(RenderedItem::new(item, self.locale));
            report.inserted.push(item.id.clone());
            self.evict_overflow(container, &mut report);
        }

        self.last_newest_id = Some(newest.to_string());
        report
    }

    fn evict_overflow<C: ContainerPort + ?Sized>(&self, container: &mut C, report: &mut MergeReport) {
        while container.len() > self.capacity {
            match container.evict_oldest() {
                Some(evicted) => report.evicted.push(evicted.id),
                None => break,
            }
        }
    }
}
