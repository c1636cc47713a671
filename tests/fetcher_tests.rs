#![cfg(feature = "server")]

use axum::{http::header, response::IntoResponse, routing::get, Router};
use link_preview_proxy::{Deadline, FetchError, Fetcher, FetcherConfig, UpstreamFetcher};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

const PAGE: &str = r#"<html><head><meta property="og:title" content="Local"></head></html>"#;

/// Serves a handful of canned upstream behaviours on an ephemeral port.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/page", get(|| async { ([(header::CONTENT_TYPE, "text/html")], PAGE) }))
        .route(
            "/cached",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "text/html"),
                        (header::CACHE_CONTROL, "public, max-age=120"),
                    ],
                    PAGE,
                )
            }),
        )
        .route(
            "/missing",
            get(|| async { axum::http::StatusCode::NOT_FOUND.into_response() }),
        )
        .route("/empty", get(|| async { "   " }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                PAGE
            }),
        )
        .route("/large", get(|| async { "a".repeat(64 * 1024) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).unwrap()
}

/// Direct connections only, whatever proxy the environment configures.
fn local_fetcher() -> Fetcher {
    Fetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetches_body_without_cache_hint() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher();

    let page = fetcher.fetch(&url(addr, "/page"), &deadline()).await.unwrap();
    assert_eq!(page.body, PAGE);
    assert_eq!(page.cache_control, None);
}

#[tokio::test]
async fn test_captures_upstream_cache_control() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher();

    let page = fetcher
        .fetch(&url(addr, "/cached"), &deadline())
        .await
        .unwrap();
    assert_eq!(page.cache_control.as_deref(), Some("public, max-age=120"));
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher();

    let result = fetcher.fetch(&url(addr, "/missing"), &deadline()).await;
    assert_eq!(result, Err(FetchError::Status(404)));
}

#[tokio::test]
async fn test_blank_body_is_reported() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher();

    let result = fetcher.fetch(&url(addr, "/empty"), &deadline()).await;
    assert_eq!(result, Err(FetchError::EmptyBody));
}

#[tokio::test]
async fn test_deadline_bounds_slow_upstream() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher();

    let started = std::time::Instant::now();
    let deadline = Deadline::after(Duration::from_millis(300));
    let result = fetcher.fetch(&url(addr, "/slow"), &deadline).await;

    assert_eq!(result, Err(FetchError::Timeout));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_body_is_truncated_at_limit() {
    let addr = spawn_upstream().await;
    let fetcher = local_fetcher().with_max_body_bytes(1024);

    let page = fetcher.fetch(&url(addr, "/large"), &deadline()).await.unwrap();
    assert_eq!(page.body.len(), 1024);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port with nothing listening
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let fetcher = local_fetcher();

    let result = fetcher.fetch(&url(addr, "/page"), &deadline()).await;
    assert!(matches!(result, Err(FetchError::Transport(_))));
}

#[tokio::test]
async fn test_configured_fetcher_builds() {
    let fetcher = Fetcher::new_with_config(FetcherConfig {
        user_agent: "preview-test/1.0".to_string(),
        timeout: Duration::from_secs(1),
        ..FetcherConfig::default()
    });
    assert!(fetcher.is_ok());
}
