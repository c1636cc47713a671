use crate::Metadata;
use scraper::{Html, Selector};
use tracing::debug;

/// Turns fetched markup into [`Metadata`]. Missing tags yield missing
/// fields, never an error.
pub trait ExtractMetadata: Send + Sync {
    fn extract(&self, html: &str) -> Metadata;
}

/// Open Graph extractor backed by `scraper`.
#[derive(Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        // Fall back to the regular <title> when there is no Open Graph title
        meta_content(document, "meta[property='og:title']").or_else(|| {
            let selector = Selector::parse("title").ok()?;
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>())
                .and_then(non_blank)
        })
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:description']")
            .or_else(|| meta_content(document, "meta[name='description']"))
    }

    fn extract_image(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:image']")
            .or_else(|| meta_content(document, "meta[name='twitter:image']"))
    }

    fn extract_image_alt(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:image:alt']")
            .or_else(|| meta_content(document, "meta[name='twitter:image:alt']"))
    }
}

impl ExtractMetadata for MetadataExtractor {
    fn extract(&self, html: &str) -> Metadata {
        let document = Html::parse_document(html);

        let metadata = Metadata {
            title: self.extract_title(&document),
            description: self.extract_description(&document),
            image: self.extract_image(&document),
            image_alt: self.extract_image_alt(&document),
        };

        debug!(
            title = ?metadata.title,
            description = ?metadata.description,
            image = ?metadata.image,
            "Metadata extraction results"
        );
        metadata
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(|s| non_blank(s.to_string()))
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
