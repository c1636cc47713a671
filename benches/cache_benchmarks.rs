use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use link_preview_proxy::{Cache, CacheConfig, CacheEntry, Metadata};
use std::sync::Arc;
use std::time::Duration;

const MOCK_URLS: &[&str] = &[
    "https://example1.com/page1",
    "https://example2.com/page2",
    "https://example3.com/page3",
    "https://example4.com/page4",
    "https://example5.com/page5",
];

fn create_mock_entry(url: &str) -> CacheEntry {
    CacheEntry::Metadata(Metadata {
        title: Some(format!("Title for {}", url)),
        description: Some(format!("Description for {}", url)),
        image: Some("https://example.com/image.jpg".to_string()),
        image_alt: Some("Example image".to_string()),
    })
}

fn bench_cache_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_performance");
    group
        .sample_size(100)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));

    let cache_sizes = [100, 500, 1000];

    for &cache_size in &cache_sizes {
        group.bench_with_input(
            BenchmarkId::new("cache_hit", cache_size),
            &cache_size,
            |b, &size| {
                let cache = Arc::new(Cache::new(CacheConfig {
                    max_entries: size,
                    ..CacheConfig::default()
                }));
                for url in MOCK_URLS {
                    cache.set(url.to_string(), create_mock_entry(url));
                }

                b.iter(|| {
                    for url in MOCK_URLS {
                        black_box(cache.get(url));
                    }
                });
            },
        );

        // Every insert past capacity evicts the least recently used entry
        group.bench_with_input(
            BenchmarkId::new("insert_with_eviction", cache_size),
            &cache_size,
            |b, &size| {
                let cache = Cache::new(CacheConfig {
                    max_entries: size,
                    ..CacheConfig::default()
                });
                let mut counter = 0usize;

                b.iter(|| {
                    counter += 1;
                    let url = format!("https://example.com/page/{counter}");
                    cache.set(url, CacheEntry::Negative);
                    black_box(cache.len());
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_access(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = Arc::new(Cache::default());

    c.bench_function("concurrent_get_set", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tasks: Vec<_> = (0..16)
                    .map(|i| {
                        let cache = cache.clone();
                        tokio::spawn(async move {
                            let url = MOCK_URLS[i % MOCK_URLS.len()];
                            cache.set(url.to_string(), create_mock_entry(url));
                            black_box(cache.get(url));
                        })
                    })
                    .collect();
                futures::future::join_all(tasks).await;
            });
        });
    });
}

criterion_group!(benches, bench_cache_scenarios, bench_concurrent_access);
criterion_main!(benches);
