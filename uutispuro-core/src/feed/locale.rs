use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Fi,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Fi];

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Fi => "fi",
            Locale::En => "en",
        }
    }

    pub fn root_path(self) -> &'static str {
        match self {
            Locale::Fi => "/fi",
            Locale::En => "/en",
        }
    }

    /// Only the bare locale roots carry the live feed.
    pub fn from_feed_page(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|locale| locale.root_path() == path)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fi" => Ok(Locale::Fi),
            "en" => Ok(Locale::En),
            other => Err(format!("unknown locale {other}")),
        }
    }
}
