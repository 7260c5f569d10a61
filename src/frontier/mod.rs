//! URL frontier: the work discovered in one pass
//!
//! Discovery happens in two steps. Listing pages are enumerated from the
//! configured categories ([`listing_urls`]); each fetched listing page then
//! contributes the advert links it contains. Both steps feed a [`Frontier`],
//! which keeps every URL at most once.

mod listing;

pub use listing::{listing_page_count, listing_urls};

use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::url::resolve_link;

/// One fetchable page, identified by its absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WorkItem {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl From<&str> for WorkItem {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

impl From<Url> for WorkItem {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

impl AsRef<str> for WorkItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicated set of work items, iterated in first-seen order
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    items: Vec<WorkItem>,
    seen: HashSet<WorkItem>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item; returns false if it was already present
    pub fn insert(&mut self, item: WorkItem) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    /// Resolves a raw href against `base` and adds it
    ///
    /// Returns `Ok(true)` for a new URL, `Ok(false)` for a duplicate, and an
    /// error when the href cannot be turned into an absolute HTTP(S) URL.
    pub fn insert_link(&mut self, href: &str, base: &Url) -> crate::UrlResult<bool> {
        let url = resolve_link(href, base)?;
        Ok(self.insert(WorkItem::from(url)))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(&WorkItem::from(url))
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}

impl FromIterator<WorkItem> for Frontier {
    fn from_iter<I: IntoIterator<Item = WorkItem>>(iter: I) -> Self {
        let mut frontier = Frontier::new();
        frontier.extend(iter);
        frontier
    }
}

impl Extend<WorkItem> for Frontier {
    fn extend<I: IntoIterator<Item = WorkItem>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}
