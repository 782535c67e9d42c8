use std::collections::HashSet;

use tracing::trace;

use super::types::{ResourceCategory, ResourceSizeMap};
use super::url_norm::is_archive_static_asset;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body_len: Option<u64>,
}

impl ObservedResponse {
    pub fn new(url: impl Into<String>, status: u16, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: content_type.into(),
            content_length: None,
            body_len: None,
        }
    }

    pub fn with_content_length(mut self, bytes: u64) -> Self {
        self.content_length = Some(bytes);
        self
    }

    pub fn with_body_len(mut self, bytes: u64) -> Self {
        self.body_len = Some(bytes);
        self
    }

    fn size(&self) -> Option<u64> {
        self.content_length.or(self.body_len)
    }
}

pub fn classify_mime(content_type: &str) -> ResourceCategory {
    let mime = content_type.to_ascii_lowercase();
    if mime.contains("text/html") {
        ResourceCategory::Document
    } else if mime.contains("application/javascript") || mime.contains("application/x-javascript")
    {
        ResourceCategory::Script
    } else if mime.contains("text/css") {
        ResourceCategory::Stylesheet
    } else if mime.contains("image") {
        ResourceCategory::Image
    } else if mime.contains("font") {
        ResourceCategory::Font
    } else {
        ResourceCategory::Other
    }
}

#[derive(Debug, Default)]
pub struct ResourceCollector {
    seen: HashSet<String>,
    sizes: ResourceSizeMap,
}

impl ResourceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `response` toward the page unless it is a failure, a repeat of
    /// an already counted URL, archive chrome, or has no known size.
    pub fn record(&mut self, response: &ObservedResponse) -> Option<(ResourceCategory, u64)> {
        if !(200..300).contains(&response.status) {
            return None;
        }
        if !self.seen.insert(response.url.clone()) {
            return None;
        }
        if is_archive_static_asset(&response.url) {
            trace!(url = %response.url, "skipping archive static asset");
            return None;
        }
        let Some(size) = response.size() else {
            trace!(url = %response.url, "skipping response without a measurable size");
            return None;
        };

        let category = classify_mime(&response.content_type);
        self.sizes.add(category, size);
        Some((category, size))
    }

    pub fn sizes(&self) -> &ResourceSizeMap {
        &self.sizes
    }

    pub fn seen_urls(&self) -> usize {
        self.seen.len()
    }

    pub fn into_sizes(self) -> ResourceSizeMap {
        self.sizes
    }
}
