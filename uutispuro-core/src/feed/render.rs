use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use super::{Locale, NewsItem};
use crate::manifest::category_path;

/// What the page shows for one news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub date: String,
    pub category_label: String,
    pub category_href: String,
    /// Freshly pushed items are highlighted until the page reloads.
    pub is_new: bool,
}

impl RenderedItem {
    pub fn new(item: &NewsItem, locale: Locale) -> Self {
        Self::in_zone(item, locale, &Local)
    }

    pub fn in_zone<Tz: TimeZone>(item: &NewsItem, locale: Locale, zone: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            source: item.source_name.clone(),
            date: format_published(&item.published_at, zone),
            category_label: item.category.display_name(locale).to_string(),
            category_href: category_path(locale, &item.category.key),
            is_new: true,
        }
    }
}

pub fn format_published<Tz: TimeZone>(published_at: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    published_at
        .with_timezone(zone)
        .format("%d.%m. %H:%M")
        .to_string()
}
