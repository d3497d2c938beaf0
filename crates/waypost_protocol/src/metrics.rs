//! Live page metrics reports.

use serde::{Deserialize, Serialize};

/// A metrics report measured by a peer process for its current page.
///
/// Reports are transient: they are relayed to whoever is listening on
/// the runtime channel and cached under a glue storage key, but never
/// enter the sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// URL of the measured page.
    pub url: String,
    /// Page title, if one was available.
    #[serde(default)]
    pub title: Option<String>,
    /// Number of words on the page.
    #[serde(default)]
    pub word_count: u32,
    /// Number of links on the page.
    #[serde(default)]
    pub link_count: u32,
    /// Number of images on the page.
    #[serde(default)]
    pub image_count: u32,
}

impl PageMetrics {
    /// Creates a report for the given URL with zeroed counters.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            word_count: 0,
            link_count: 0,
            image_count: 0,
        }
    }

    /// Sets the counters.
    pub fn with_counts(mut self, words: u32, links: u32, images: u32) -> Self {
        self.word_count = words;
        self.link_count = links;
        self.image_count = images;
        self
    }
}
