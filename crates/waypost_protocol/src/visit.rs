//! Queued visit records.

use serde::{Deserialize, Serialize};

/// A page visit as it sits in the persisted queue.
///
/// `Visit` carries a local `timestamp` (epoch milliseconds, set when the
/// visit was recorded) that exists purely for local bookkeeping. It is
/// stripped before transmission; the collector never sees it.
///
/// # Fields
///
/// - `url`: the visited page URL
/// - `title`: page title, if one was available
/// - `description`: meta description, if one was available
/// - `link_count` / `word_count` / `image_count`: page content counters
/// - `timestamp`: local recording time, never transmitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Visited page URL.
    pub url: String,
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
    /// Meta description.
    #[serde(default)]
    pub description: Option<String>,
    /// Number of links on the page.
    #[serde(default)]
    pub link_count: u32,
    /// Number of words on the page.
    #[serde(default)]
    pub word_count: u32,
    /// Number of images on the page.
    #[serde(default)]
    pub image_count: u32,
    /// Local recording time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

impl Visit {
    /// Creates a visit with the given URL and recording time.
    pub fn new(url: impl Into<String>, timestamp: u64) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            link_count: 0,
            word_count: 0,
            image_count: 0,
            timestamp,
        }
    }

    /// Sets the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the meta description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the page content counters.
    pub fn with_counts(mut self, links: u32, words: u32, images: u32) -> Self {
        self.link_count = links;
        self.word_count = words;
        self.image_count = images;
        self
    }

    /// Returns the wire form of this visit, with the local timestamp
    /// stripped.
    pub fn to_record(&self) -> VisitRecord {
        VisitRecord {
            url: self.url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            link_count: self.link_count,
            word_count: self.word_count,
            image_count: self.image_count,
        }
    }
}

/// The wire form of a visit, as submitted to the collector.
///
/// Identical to [`Visit`] minus the local `timestamp` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Visited page URL.
    pub url: String,
    /// Page title.
    pub title: Option<String>,
    /// Meta description.
    pub description: Option<String>,
    /// Number of links on the page.
    pub link_count: u32,
    /// Number of words on the page.
    pub word_count: u32,
    /// Number of images on the page.
    pub image_count: u32,
}

impl From<&Visit> for VisitRecord {
    fn from(visit: &Visit) -> Self {
        visit.to_record()
    }
}
