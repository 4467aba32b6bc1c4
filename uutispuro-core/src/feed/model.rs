use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Locale;
use crate::error::FeedError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Canonical (Finnish) name, also used to build listing links.
    #[serde(rename = "categoryName")]
    pub key: String,
    #[serde(rename = "categoryEnName", default)]
    pub en_name: String,
}

impl Category {
    pub fn display_name(&self, locale: Locale) -> &str {
        match locale {
            Locale::En if !self.en_name.is_empty() => &self.en_name,
            _ => &self.key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub id: String,
    #[serde(rename = "rssTitle")]
    pub title: String,
    #[serde(rename = "rssSource")]
    pub source_name: String,
    #[serde(rename = "pubDate")]
    pub published_at: DateTime<Utc>,
    pub category: Category,
    #[serde(rename = "rssLink")]
    pub link: String,
}

/// One push message: items ordered newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedPage {
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

impl FeedPage {
    pub fn parse(payload: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn newest_id(&self) -> Option<&str> {
        self.news.first().map(|item| item.id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.news.is_empty()
    }
}
