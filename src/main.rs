use clap::Parser;
use link_preview_proxy::server::{self, AppState, DEFAULT_ALLOWED_ORIGINS};
use link_preview_proxy::{
    setup_logging, split_list, Cache, CacheConfig, Fetcher, FetcherConfig, LogConfig,
    MetadataExtractor, PreviewService, PreviewServiceConfig, UpstreamStatusPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "link-preview-proxy")]
#[command(version)]
#[command(about = "Open Graph link preview proxy")]
struct Cli {
    /// Address to listen on
    #[arg(short = 'b', long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Comma separated origins allowed to call the service
    #[arg(long, env = "ALLOWED_ORIGINS")]
    allowed_origins: Option<String>,

    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value_t = 1000)]
    cache_max_entries: usize,

    /// Byte budget for cached keys and serialized values
    #[arg(long, env = "CACHE_MAX_BYTES", default_value_t = 8 * 1024 * 1024)]
    cache_max_bytes: usize,

    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 3600)]
    cache_ttl_secs: u64,

    /// Hard timeout for upstream fetches
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 5)]
    fetch_timeout_secs: u64,

    /// Answer with the upstream's own status code instead of 404
    #[arg(long, env = "PROPAGATE_UPSTREAM_STATUS")]
    propagate_upstream_status: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files here (requires the `logging` feature)
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig {
        file_output: cli.log_dir.is_some(),
        log_dir: cli.log_dir.clone().unwrap_or_else(|| "logs".into()),
        log_level: cli.log_level.clone(),
        ..LogConfig::default()
    };
    if let Err(e) = setup_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "Server terminated with an error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let fetch_timeout = Duration::from_secs(cli.fetch_timeout_secs);
    let cache_config = CacheConfig {
        max_entries: cli.cache_max_entries,
        max_bytes: cli.cache_max_bytes,
        ttl: Duration::from_secs(cli.cache_ttl_secs),
    };
    let cache = Arc::new(Cache::new(cache_config));

    let fetcher = Fetcher::new_with_config(FetcherConfig {
        timeout: fetch_timeout,
        ..FetcherConfig::default()
    })?;

    let status_policy = if cli.propagate_upstream_status {
        UpstreamStatusPolicy::Propagate
    } else {
        UpstreamStatusPolicy::Flatten
    };

    let service = PreviewService::new(
        cache.clone(),
        Arc::new(fetcher),
        Arc::new(MetadataExtractor::new()),
        PreviewServiceConfig::default()
            .with_fetch_timeout(fetch_timeout)
            .with_status_policy(status_policy),
    );

    let allowed_origins = match cli.allowed_origins.as_deref() {
        Some(raw) => split_list(raw),
        None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
    };
    info!(origins = ?allowed_origins, "CORS allow-list configured");
    info!(
        max_entries = cache.config().max_entries,
        max_bytes = cache.config().max_bytes,
        ttl = ?cache.config().ttl,
        "Cache configured"
    );

    let janitor = server::spawn_cache_janitor(cache, Duration::from_secs(60));

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    server::serve(listener, AppState::new(service, allowed_origins)).await?;

    janitor.abort();
    info!("Server stopped");
    Ok(())
}
