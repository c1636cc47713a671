//! Open Graph link preview proxy.
//!
//! Fetches a target page, extracts its preview metadata and remembers the
//! outcome, successful or not, in a bounded LRU cache with a fixed TTL.

use serde::{Deserialize, Serialize};
use url::Url;

mod cache;
mod deadline;
mod error;
mod extractor;
mod fetcher;
mod logging;
mod origin;
mod preview_service;
#[cfg(feature = "server")]
pub mod server;
mod utils;

pub use cache::{Cache, CacheConfig, CacheEntry, CacheStats};
pub use deadline::Deadline;
pub use error::{FetchError, PreviewError, METADATA_NOT_FOUND};
pub use extractor::{ExtractMetadata, MetadataExtractor};
pub use fetcher::{FetchedPage, Fetcher, FetcherConfig, UpstreamFetcher};
pub use logging::{
    log_error_card, log_preview_card, setup_logging, LogConfig, LogLevelGuard, LogSetupError,
};
pub use origin::{caller_origin, same_origin, OriginGuard, Verdict};
pub use preview_service::{
    Preview, PreviewService, PreviewServiceConfig, PreviewSource, UpstreamStatusPolicy,
    DEFAULT_CACHE_CONTROL, MAX_CONCURRENT_FETCHES,
};
pub use utils::{split_list, truncate_str};

/// Social preview fields of a page. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub image_alt: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.image_alt.is_none()
    }

    /// Makes a relative or protocol-relative image URL absolute against the
    /// page it was found on.
    pub fn resolve_image(&mut self, base: &Url) {
        let Some(image) = self.image.as_deref() else {
            return;
        };
        if Url::parse(image).is_ok() {
            return;
        }
        if let Ok(absolute) = base.join(image) {
            self.image = Some(absolute.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_absent_fields_as_null() {
        let metadata = Metadata {
            title: Some("Hello".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Hello",
                "description": null,
                "image": null,
                "imageAlt": null
            })
        );
    }

    #[test]
    fn resolves_relative_images() {
        let base = Url::parse("https://example.com/blog/post").unwrap();

        let mut metadata = Metadata {
            image: Some("/img/cover.png".into()),
            ..Default::default()
        };
        metadata.resolve_image(&base);
        assert_eq!(metadata.image.as_deref(), Some("https://example.com/img/cover.png"));

        let mut metadata = Metadata {
            image: Some("//cdn.example.net/a.png".into()),
            ..Default::default()
        };
        metadata.resolve_image(&base);
        assert_eq!(metadata.image.as_deref(), Some("https://cdn.example.net/a.png"));

        let mut metadata = Metadata {
            image: Some("https://other.example/b.png".into()),
            ..Default::default()
        };
        metadata.resolve_image(&base);
        assert_eq!(metadata.image.as_deref(), Some("https://other.example/b.png"));
    }
}
