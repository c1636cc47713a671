use thiserror::Error;
use tracing::{error, warn};

pub const METADATA_NOT_FOUND: &str = "OpenGraph metadata not found";

/// Failure reported by an [`UpstreamFetcher`](crate::UpstreamFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream responded with status {0}")]
    Status(u16),

    #[error("upstream returned an empty body")]
    EmptyBody,

    #[error("upstream request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status(_) => "status",
            FetchError::EmptyBody => "empty_body",
            FetchError::Timeout => "timeout",
            FetchError::Transport(_) => "transport",
        }
    }
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("URL parameter is required")]
    MissingUrl,

    #[error("Only HTTPS URLs are supported")]
    UnsupportedProtocol,

    #[error("Previews of internal links are not supported")]
    SameOrigin,

    #[error("Failed to parse URL for origin check: {0}")]
    OriginParse(#[from] url::ParseError),

    #[error("OpenGraph metadata not found")]
    NotFound,

    #[error("Upstream responded with status {0}")]
    UpstreamStatus(u16),

    #[error("Error getting OpenGraph metadata for {url}: {message}")]
    Upstream { url: String, message: String },
}

impl PreviewError {
    /// HTTP status the error is surfaced with.
    pub fn status_code(&self) -> u16 {
        match self {
            PreviewError::MissingUrl
            | PreviewError::UnsupportedProtocol
            | PreviewError::OriginParse(_) => 400,
            PreviewError::SameOrigin | PreviewError::NotFound => 404,
            PreviewError::UpstreamStatus(status) if (400..=599).contains(status) => *status,
            PreviewError::UpstreamStatus(_) => 404,
            PreviewError::Upstream { .. } => 500,
        }
    }

    /// Message placed in the `error` field of the JSON response body.
    pub fn message(&self) -> String {
        match self {
            PreviewError::OriginParse(_) => "Failed to parse URL for origin check".to_string(),
            PreviewError::UpstreamStatus(_) => METADATA_NOT_FOUND.to_string(),
            PreviewError::Upstream { url, .. } => {
                format!("Error getting OpenGraph metadata for {url}")
            }
            other => other.to_string(),
        }
    }

    /// Whether the failure describes the target itself and may be
    /// remembered as a negative cache entry. Same-origin rejections depend
    /// on the caller and never are.
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            PreviewError::NotFound
                | PreviewError::UpstreamStatus(_)
                | PreviewError::Upstream { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PreviewError::MissingUrl => "missing_url",
            PreviewError::UnsupportedProtocol => "unsupported_protocol",
            PreviewError::SameOrigin => "same_origin",
            PreviewError::OriginParse(_) => "origin_parse",
            PreviewError::NotFound => "not_found",
            PreviewError::UpstreamStatus(_) => "upstream_status",
            PreviewError::Upstream { .. } => "upstream",
        }
    }

    pub fn log(&self, url: &str) {
        match self {
            PreviewError::MissingUrl | PreviewError::UnsupportedProtocol => {
                warn!(url = %url, kind = self.kind(), "Rejected preview request");
            }
            PreviewError::SameOrigin => {
                warn!(url = %url, kind = self.kind(), "Refusing to preview an internal link");
            }
            PreviewError::OriginParse(e) => {
                warn!(url = %url, kind = self.kind(), error = %e, "URL parsing failed");
            }
            PreviewError::NotFound => {
                warn!(url = %url, kind = self.kind(), "OpenGraph metadata not found");
            }
            PreviewError::UpstreamStatus(status) => {
                warn!(url = %url, kind = self.kind(), status = *status, "Upstream returned an error status");
            }
            PreviewError::Upstream { message, .. } => {
                error!(url = %url, kind = self.kind(), error = %message, "Error getting OpenGraph metadata");
            }
        }
    }
}
