//! Integration tests for the scraper
//!
//! These tests use wiremock to create mock HTTP servers and exercise fetch
//! retries, link collection, detail collection and the CSV sink end-to-end.

use listing_scraper::config::{parse_config, ConcurrencyMode, Config, FetchConfig};
use listing_scraper::crawler::{collect_links, collect_records, FailureKind, FetchResult, PageFetcher};
use listing_scraper::output::{write_records, WriteOutcome};
use listing_scraper::FieldValue;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Pads a page past the minimum body size
fn padded(html: &str) -> String {
    format!("{}<!-- {} -->", html, "padding ".repeat(80))
}

fn listing_page(counter: Option<&str>, hrefs: &[&str]) -> String {
    let counter = counter
        .map(|text| format!("<span>{}</span>", text))
        .unwrap_or_default();
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">car</a>"#, href))
        .collect();
    padded(&format!(
        "<html><body><header>{}</header><main>{}</main></body></html>",
        counter, links
    ))
}

fn detail_page(brand: &str, date: &str, views: &str, price: &str) -> String {
    padded(&format!(
        r#"<html><body>
            <h1 class="CardHead__title">{}</h1>
            <div class="CardHead__infoItem CardHead__creationDate">{}</div>
            <div class="CardHead__infoItem CardHead__views">{}</div>
            <span class="OfferPriceCaption__price">{}</span>
        </body></html>"#,
        brand, date, views, price
    ))
}

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, output_path: &str) -> Config {
    let toml = format!(
        r#"
[listing]
base-url = "{base_url}/cars/all/"
max-price = 1000000
link-pattern = "/cars/used/sale/"
results-count-selector = "span"
results-count-contains = "найдено"

[fetch]
timeout-ms = 2000
retry-ceiling = 3
rate-limit-backoff-ms = 1
transient-backoff-ms = 1

[collect]
concurrency = 4
request-delay-ms = 1

[output]
path = "{output_path}"
date-field = "date_posted"
views-field = "views"
price-field = "price"

[[fields]]
name = "brand"
column = "Марка"
[[fields.rules]]
selector = "h1.CardHead__title"

[[fields]]
name = "date_posted"
column = "Дата объявления"
post = "date"
[[fields.rules]]
selector = "div[class*='CardHead__creationDate']"
min-len = 4

[[fields]]
name = "views"
column = "Количество просмотров"
post = "digits"
[[fields.rules]]
selector = "div[class*='CardHead__views']"

[[fields]]
name = "price"
column = "Цена"
post = "integer"
[[fields.rules]]
selector = "span.OfferPriceCaption__price"
"#
    );
    parse_config(&toml).expect("test config should be valid")
}

fn fast_retry_config() -> FetchConfig {
    FetchConfig {
        timeout_ms: 200,
        retry_ceiling: 3,
        rate_limit_backoff_ms: 1,
        transient_backoff_ms: 1,
        ..FetchConfig::default()
    }
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/cars/all/"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts five detail pages, one of them with a zero price
async fn mount_five_details(server: &MockServer) -> Vec<String> {
    let cars = [
        ("kia", "1 марта 2024", "120 просмотров", "650 000 ₽"),
        ("lada", "15 февраля 2024", "80", "420 000 ₽"),
        ("bmw", "3 марта 2024", "1 200", "990 000 ₽"),
        ("audi", "вчера", "7", "880 000 ₽"),
        ("zaz", "2 января 2024", "3", "0"),
    ];

    let mut urls = Vec::new();
    for (i, (brand, date, views, price)) in cars.iter().enumerate() {
        let page_path = format!("/cars/used/sale/{}/{}/", brand, i);
        mount_page(server, &page_path, detail_page(brand, date, views, price)).await;
        urls.push(format!("{}{}", server.uri(), page_path));
    }
    urls
}

#[tokio::test]
async fn test_always_rate_limited_uses_every_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::from_config(&fast_retry_config());
    let result = fetcher.fetch(&format!("{}/busy", mock_server.uri())).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::RateLimited));
    assert!(matches!(result, FetchResult::Failed { attempts: 4, .. }));
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/flaky", padded("<p>ok</p>")).await;

    let fetcher = PageFetcher::from_config(&fast_retry_config());
    let result = fetcher.fetch(&format!("{}/flaky", mock_server.uri())).await;

    match result {
        FetchResult::Fetched { status_code, body, .. } => {
            assert_eq!(status_code, 200);
            assert!(body.contains("<p>ok</p>"));
        }
        other => panic!("expected a fetched page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_small_body_is_empty_regardless_of_status() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/stub", "<p>tiny</p>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::from_config(&fast_retry_config());

    let stub = fetcher.fetch(&format!("{}/stub", mock_server.uri())).await;
    assert_eq!(stub.failure_kind(), Some(FailureKind::EmptyBody));
    assert!(matches!(stub, FetchResult::Failed { attempts: 1, .. }));

    let missing = fetcher.fetch(&format!("{}/missing", mock_server.uri())).await;
    assert_eq!(missing.failure_kind(), Some(FailureKind::EmptyBody));
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string(padded("<p>oops</p>")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::from_config(&fast_retry_config());
    let result = fetcher.fetch(&format!("{}/broken", mock_server.uri())).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::HttpStatus(500)));
}

#[tokio::test]
async fn test_timeouts_exhaust_retries() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(padded("<p>late</p>"))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::from_config(&fast_retry_config());
    let result = fetcher.fetch(&format!("{}/slow", mock_server.uri())).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert!(matches!(result, FetchResult::Failed { attempts: 4, .. }));
}

#[tokio::test]
async fn test_link_collection_dedups_across_pages() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        1,
        listing_page(
            Some("найдено 100 объявлений"),
            &[
                "/cars/used/sale/kia/rio/1/",
                "/cars/used/sale/lada/vesta/2/?from=listing",
                "/cars/used/sale/bmw/x5/3/?pos=1",
                "/cars/new/group/kia/",
            ],
        ),
    )
    .await;
    mount_listing(
        &mock_server,
        2,
        listing_page(
            None,
            &[
                "/cars/used/sale/bmw/x5/3/?pos=7",
                "/cars/used/sale/audi/a4/4/",
                "/cars/used/sale/ford/focus/5/#photos",
            ],
        ),
    )
    .await;

    let config = create_test_config(&mock_server.uri(), "unused.csv");
    let links = collect_links(&config, &CancellationToken::new()).await;

    assert_eq!(links.total_pages, 2);
    assert_eq!(links.pages_visited, 2);
    assert!(links.failed_pages.is_empty());
    assert_eq!(links.links.len(), 5);
    assert!(links
        .links
        .contains(&format!("{}/cars/used/sale/bmw/x5/3/", mock_server.uri())));
}

#[tokio::test]
async fn test_link_collection_survives_failed_page() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        1,
        listing_page(
            None,
            &[
                "/cars/used/sale/kia/rio/1/",
                "?price_to=1000000&page=2",
                "?price_to=1000000&page=3",
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/cars/all/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503).set_body_string(padded("down")))
        .mount(&mock_server)
        .await;
    mount_listing(
        &mock_server,
        3,
        listing_page(None, &["/cars/used/sale/audi/a4/4/"]),
    )
    .await;

    let config = create_test_config(&mock_server.uri(), "unused.csv");
    let links = collect_links(&config, &CancellationToken::new()).await;

    assert_eq!(links.total_pages, 3);
    assert_eq!(links.failed_pages, vec![2]);
    assert_eq!(links.links.len(), 2);
}

#[tokio::test]
async fn test_zero_price_is_skipped_under_every_policy() {
    let mock_server = MockServer::start().await;
    let urls = mount_five_details(&mock_server).await;

    for mode in [
        ConcurrencyMode::WorkerPool,
        ConcurrencyMode::InFlight,
        ConcurrencyMode::Sequential,
    ] {
        let mut config = create_test_config(&mock_server.uri(), "unused.csv");
        config.collect.mode = mode;

        let collection = collect_records(&config, urls.clone(), &CancellationToken::new()).await;

        assert_eq!(collection.records.len(), 4, "{:?}", mode);
        assert_eq!(collection.stats.processed, 4, "{:?}", mode);
        assert_eq!(collection.stats.skipped, 1, "{:?}", mode);
        assert_eq!(collection.stats.errors, 0, "{:?}", mode);
        assert!(!collection.interrupted);
        assert!(collection
            .records
            .iter()
            .all(|record| record.get("price") != Some(&FieldValue::Integer(0))));
    }
}

#[tokio::test]
async fn test_timed_out_unit_does_not_affect_siblings() {
    let mock_server = MockServer::start().await;
    let mut urls = mount_five_details(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/cars/used/sale/slow/9/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page("slow", "1 марта 2024", "1", "100"))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&mock_server)
        .await;
    urls.push(format!("{}/cars/used/sale/slow/9/", mock_server.uri()));

    let mut config = create_test_config(&mock_server.uri(), "unused.csv");
    config.fetch.timeout_ms = 200;

    let collection = collect_records(&config, urls, &CancellationToken::new()).await;

    assert_eq!(collection.stats.errors, 1);
    assert_eq!(collection.stats.processed, 4);
    assert_eq!(collection.stats.skipped, 1);
    assert!(collection
        .records
        .iter()
        .all(|record| !record.url.contains("/slow/")));
}

#[tokio::test]
async fn test_cancellation_keeps_finished_records() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/cars/used/sale/kia/1/",
        detail_page("kia", "1 марта 2024", "5", "500 000"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/cars/used/sale/lada/2/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page("lada", "2 марта 2024", "5", "400 000"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), "unused.csv");
    config.collect.mode = ConcurrencyMode::Sequential;
    config.fetch.timeout_ms = 30_000;

    let urls = vec![
        format!("{}/cars/used/sale/kia/1/", mock_server.uri()),
        format!("{}/cars/used/sale/lada/2/", mock_server.uri()),
        format!("{}/cars/used/sale/bmw/3/", mock_server.uri()),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let collection = collect_records(&config, urls, &cancel).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(collection.interrupted);
    assert_eq!(collection.records.len(), 1);
    assert_eq!(collection.stats.processed, 1);
}

#[tokio::test]
async fn test_full_scrape_writes_sorted_csv() {
    let mock_server = MockServer::start().await;
    let urls = mount_five_details(&mock_server).await;
    let hrefs: Vec<String> = urls
        .iter()
        .map(|url| url.trim_start_matches(&mock_server.uri()).to_string())
        .collect();
    let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
    mount_listing(&mock_server, 1, listing_page(Some("найдено 5"), &hrefs)).await;

    let dir = tempfile::TempDir::new().unwrap();
    let output = dir.path().join("cars.csv");
    let config = create_test_config(&mock_server.uri(), output.to_str().unwrap());
    let cancel = CancellationToken::new();

    let links = collect_links(&config, &cancel).await;
    assert_eq!(links.links.len(), 5);

    let collection = collect_records(&config, links.links.into_iter().collect(), &cancel).await;
    let outcome = write_records(&collection.records, &config.fields, &config.output).unwrap();
    assert_eq!(
        outcome,
        WriteOutcome::Written {
            path: output.clone(),
            rows: 4
        }
    );

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Марка,Дата объявления,Количество просмотров,Цена",
            "bmw,03.03.2024,1200,990000",
            "kia,01.03.2024,120,650000",
            "lada,15.02.2024,80,420000",
            "audi,вчера,7,880000",
        ]
    );
}

#[tokio::test]
async fn test_nothing_collected_writes_nothing() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_page(Some("найдено 0"), &[])).await;

    let dir = tempfile::TempDir::new().unwrap();
    let output = dir.path().join("cars.csv");
    let config = create_test_config(&mock_server.uri(), output.to_str().unwrap());
    let cancel = CancellationToken::new();

    let links = collect_links(&config, &cancel).await;
    let collection = collect_records(&config, links.links.into_iter().collect(), &cancel).await;
    let outcome = write_records(&collection.records, &config.fields, &config.output).unwrap();

    assert_eq!(outcome, WriteOutcome::Empty);
    assert!(!output.exists());
}
