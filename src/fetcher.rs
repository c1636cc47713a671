use crate::{Deadline, FetchError};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Raw page returned by the upstream, with its own caching hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: String,
    pub cache_control: Option<String>,
}

/// Retrieves a target page. Implementations must give up once `deadline`
/// has passed.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, deadline: &Deadline) -> Result<FetchedPage, FetchError>;
}

/// Creates a fetcher with custom configuration.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     user_agent: "my-custom-agent/1.0".to_string(),
///     timeout: Duration::from_secs(3),
///     ..Default::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Bytes of body kept for extraction; the remainder is discarded.
    pub max_body_bytes: usize,
    pub redirect_limit: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("link-preview-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            redirect_limit: 10,
        }
    }
}

/// `reqwest` backed [`UpstreamFetcher`].
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new() -> Result<Self, FetchError> {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                FetchError::Transport(e.to_string())
            })?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<String, FetchError> {
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = self.max_body_bytes, "Body truncated at size limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl UpstreamFetcher for Fetcher {
    #[instrument(level = "debug", skip(self, url, deadline), fields(url = %url))]
    async fn fetch(&self, url: &Url, deadline: &Deadline) -> Result<FetchedPage, FetchError> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(FetchError::Timeout);
        }

        let response = self
            .client
            .get(url.clone())
            .timeout(remaining)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %url, "Failed to send request");
                classify(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Upstream returned non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let body = self.read_body(response).await.map_err(|e| {
            warn!(error = %e, url = %url, "Failed to read response body");
            e
        })?;

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        debug!(url = %url, content_length = body.len(), "Successfully fetched webpage");
        Ok(FetchedPage {
            body,
            cache_control,
        })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}
