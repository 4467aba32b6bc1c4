use url::Url;

use crate::feed::Locale;

/// Category keys the site publishes listing pages for.
pub const CATEGORIES: &[&str] = &[
    "talous",
    "digi",
    "pelit",
    "terveys",
    "kotimaa",
    "ulkomaat",
    "kulttuuri",
    "urheilu",
    "viihde",
    "elokuvat",
    "tiede",
    "ruoka",
    "matkustus",
    "asuminen",
    "naisetjamuoti",
    "blogs",
];

const STATIC_ASSETS: &[&str] = &[
    "/serviceworker.js",
    "/public/js/socket.io-1.3.7.js",
    "/public/js/moment.2.10.6.js",
    "/public/css/uutispuro-1511114584.min.css",
    "/public/js/uutispuro-1511114584.min.js",
    "/public/img/manifest.json",
    "/socket.io",
    "/socket.io/",
];

/// Ordered, duplicate-free set of paths fetched into the bucket at install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    paths: Vec<String>,
}

impl PrecacheManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self { paths: unique }
    }

    /// Locale roots, every category listing per locale, then static assets.
    pub fn standard() -> Self {
        let roots = Locale::ALL.iter().map(|locale| locale.root_path().to_string());
        let categories = CATEGORIES.iter().flat_map(|category| {
            Locale::ALL
                .iter()
                .map(move |locale| category_path(*locale, category))
        });
        let assets = STATIC_ASSETS.iter().map(|path| path.to_string());
        Self::new(roots.chain(categories).chain(assets))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, url::ParseError> {
        self.paths.iter().map(|path| origin.join(path)).collect()
    }
}

/// Listing page of a category: the key is lower-cased, nothing else changes.
pub fn category_path(locale: Locale, category_key: &str) -> String {
    format!(
        "/{}/category/{}/0",
        locale.as_str(),
        category_key.to_lowercase()
    )
}
