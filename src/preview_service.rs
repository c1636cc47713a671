use crate::logging::{log_error_card, log_preview_card};
use crate::{
    Cache, CacheEntry, Deadline, ExtractMetadata, FetchError, FetchedPage, Fetcher,
    Metadata, MetadataExtractor, OriginGuard, PreviewError, UpstreamFetcher,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};
use url::Url;

/// Cache directive sent with cache hits and with upstream pages that carry
/// none of their own.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600";

// Max concurrent upstream fetches
pub const MAX_CONCURRENT_FETCHES: usize = 500;

/// What to answer when the upstream itself responded with an error status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamStatusPolicy {
    /// Respond 404 regardless of the upstream status.
    #[default]
    Flatten,
    /// Respond with the upstream's own status code.
    Propagate,
}

#[derive(Debug, Clone)]
pub struct PreviewServiceConfig {
    pub fetch_timeout: Duration,
    pub status_policy: UpstreamStatusPolicy,
    pub max_concurrent_fetches: usize,
}

impl Default for PreviewServiceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: crate::fetcher::DEFAULT_FETCH_TIMEOUT,
            status_policy: UpstreamStatusPolicy::default(),
            max_concurrent_fetches: MAX_CONCURRENT_FETCHES,
        }
    }
}

impl PreviewServiceConfig {
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_status_policy(mut self, status_policy: UpstreamStatusPolicy) -> Self {
        self.status_policy = status_policy;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max_concurrent_fetches: usize) -> Self {
        self.max_concurrent_fetches = max_concurrent_fetches.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSource {
    Cache,
    Upstream,
}

/// A served preview and the `Cache-Control` directive to answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub metadata: Metadata,
    pub cache_control: String,
    pub source: PreviewSource,
}

/// Origin check, cache lookup, upstream fetch and extraction for one
/// preview request.
///
/// Every request that gets past the origin check either returns a cache hit
/// or writes exactly one cache entry, positive or negative.
#[derive(Clone)]
pub struct PreviewService {
    cache: Arc<Cache>,
    fetcher: Arc<dyn UpstreamFetcher>,
    extractor: Arc<dyn ExtractMetadata>,
    config: PreviewServiceConfig,
    semaphore: Arc<Semaphore>,
}

impl PreviewService {
    pub fn new(
        cache: Arc<Cache>,
        fetcher: Arc<dyn UpstreamFetcher>,
        extractor: Arc<dyn ExtractMetadata>,
        config: PreviewServiceConfig,
    ) -> Self {
        debug!(
            max_concurrent_fetches = config.max_concurrent_fetches,
            fetch_timeout = ?config.fetch_timeout,
            "Initializing PreviewService"
        );
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        Self {
            cache,
            fetcher,
            extractor,
            config,
            semaphore,
        }
    }

    /// Service with the `reqwest` fetcher and the Open Graph extractor.
    pub fn with_cache(cache: Arc<Cache>, config: PreviewServiceConfig) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new()?;
        Ok(Self::new(
            cache,
            Arc::new(fetcher),
            Arc::new(MetadataExtractor::new()),
            config,
        ))
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn handle_preview(
        &self,
        target: Option<&str>,
        caller: Option<&str>,
    ) -> Result<Preview, PreviewError> {
        let Some(target) = target.filter(|t| !t.trim().is_empty()) else {
            let e = PreviewError::MissingUrl;
            e.log("");
            return Err(e);
        };

        let result = self.resolve(target, caller).await;
        if let Err(e) = &result {
            e.log(target);
        }
        result
    }

    /// Previews several targets concurrently on behalf of one caller.
    pub async fn preview_batch(
        &self,
        targets: &[&str],
        caller: Option<&str>,
    ) -> Vec<Result<Preview, PreviewError>> {
        let futures = targets
            .iter()
            .map(|target| self.handle_preview(Some(target), caller));
        futures::future::join_all(futures).await
    }

    async fn resolve(&self, target: &str, caller: Option<&str>) -> Result<Preview, PreviewError> {
        // Rejections here depend on the caller and must not reach the cache
        let url = OriginGuard::evaluate(target, caller).into_result()?;

        match self.cache.get(target) {
            Some(CacheEntry::Negative) => {
                debug!(url = %target, "Negative cache hit");
                return Err(PreviewError::NotFound);
            }
            Some(CacheEntry::Metadata(metadata)) => {
                debug!(url = %target, "Returning OpenGraph metadata from cache");
                return Ok(Preview {
                    metadata,
                    cache_control: DEFAULT_CACHE_CONTROL.to_string(),
                    source: PreviewSource::Cache,
                });
            }
            None => {}
        }

        match self.fetch_metadata(target, &url).await {
            Ok((metadata, cache_control)) => {
                self.cache
                    .set(target, CacheEntry::Metadata(metadata.clone()));
                log_preview_card(&metadata, target);
                Ok(Preview {
                    metadata,
                    cache_control,
                    source: PreviewSource::Upstream,
                })
            }
            Err(e) => {
                if e.is_cacheable() {
                    self.cache.set(target, CacheEntry::Negative);
                }
                log_error_card(target, &e);
                Err(e)
            }
        }
    }

    async fn fetch_metadata(
        &self,
        target: &str,
        url: &Url,
    ) -> Result<(Metadata, String), PreviewError> {
        // Waiting for a fetch slot counts against the same deadline
        let deadline = Deadline::after(self.config.fetch_timeout);
        let page = deadline
            .run(async {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                self.fetcher.fetch(url, &deadline).await
            })
            .await
            .map_err(|e| self.map_fetch_error(target, e))?;

        let FetchedPage {
            body,
            cache_control,
        } = page;

        let extractor = self.extractor.clone();
        let mut metadata = tokio::task::spawn_blocking(move || extractor.extract(&body))
            .await
            .map_err(|e| upstream_error(target, format!("metadata extraction failed: {e}")))?;

        if metadata.is_empty() {
            return Err(PreviewError::NotFound);
        }
        metadata.resolve_image(url);

        let cache_control = cache_control.unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string());
        Ok((metadata, cache_control))
    }

    fn map_fetch_error(&self, target: &str, e: FetchError) -> PreviewError {
        debug!(url = %target, kind = e.kind(), error = %e, "Upstream fetch failed");
        match e {
            FetchError::Status(status) => match self.config.status_policy {
                UpstreamStatusPolicy::Flatten => PreviewError::NotFound,
                UpstreamStatusPolicy::Propagate => PreviewError::UpstreamStatus(status),
            },
            FetchError::EmptyBody | FetchError::Timeout => PreviewError::NotFound,
            FetchError::Transport(message) => upstream_error(target, message),
        }
    }
}

fn upstream_error(target: &str, message: impl ToString) -> PreviewError {
    PreviewError::Upstream {
        url: target.to_string(),
        message: message.to_string(),
    }
}
