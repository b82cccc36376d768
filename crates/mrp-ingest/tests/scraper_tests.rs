//! Sol scraping tests against mocked upstream feeds

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mrp_ingest::config::IngestConfig;
use mrp_ingest::models::{CompletenessStatus, Source};
use mrp_ingest::scraper::SolScraper;
use mrp_ingest::store::{CompletenessStore, MemoryStore};

fn test_config(server: &MockServer, per_page: u32) -> Arc<IngestConfig> {
    Arc::new(IngestConfig {
        msl_feed_url: server.uri(),
        mars2020_feed_url: server.uri(),
        per_page,
        request_timeout_secs: 5,
        inter_sol_delay_ms: 0,
        full_start_sol: 0,
        max_pages_per_sol: 50,
    })
}

fn scraper(config: Arc<IngestConfig>, store: Arc<MemoryStore>) -> SolScraper {
    SolScraper::new(config, store.clone(), store).unwrap()
}

fn msl_item(id: &str, sample_type: &str) -> Value {
    json!({
        "imageid": id,
        "sol": 1000,
        "instrument": "MAST_LEFT",
        "sample_type": sample_type,
        "date_taken_utc": "2015-05-30T16:46:33Z",
        "https_url": format!("https://example.com/{}.JPG", id),
        "subframe_rect": "(1,1,1648,1200)"
    })
}

fn m20_item(id: &str, sample_type: &str) -> Value {
    json!({
        "imageid": id,
        "sol": 100,
        "camera": {"instrument": "NAVCAM_LEFT"},
        "sample_type": sample_type,
        "date_taken_utc": "2021-06-01T11:22:33Z",
        "image_files": {"full_res": format!("https://example.com/{}.png", id)}
    })
}

async fn mount_msl_page(server: &MockServer, sol: u32, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/msl/sols/{}/photos", sol)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pagination_walks_all_pages() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    mount_msl_page(
        &server,
        1000,
        0,
        json!({"items": [msl_item("a", "full"), msl_item("b", "full")], "total": 3}),
    )
    .await;
    mount_msl_page(&server, 1000, 1, json!({"items": [msl_item("c", "full")], "total": 3})).await;

    let scraper = scraper(test_config(&server, 2), store.clone());
    let outcome = scraper.scrape_sol(Source::Msl, 1000).await.unwrap();

    assert_eq!(outcome.status, CompletenessStatus::Success);
    assert_eq!(outcome.inserted, 3);
    assert_eq!(outcome.photo_count, 3);
    assert_eq!(outcome.expected, Some(3));
    assert_eq!(store.photo_count(), 3);
}

#[tokio::test]
async fn test_msl_not_found_on_page_zero_is_an_empty_sol() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("GET"))
        .and(path("/msl/sols/777/photos"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    let outcome = scraper.scrape_sol(Source::Msl, 777).await.unwrap();

    assert_eq!(outcome.status, CompletenessStatus::Empty);
    assert_eq!(outcome.inserted, 0);
    assert_eq!(store.photo_count(), 0);

    let record = store.get(Source::Msl, 777).await.unwrap().unwrap();
    assert_eq!(record.status, CompletenessStatus::Empty);
    assert!(record.last_error.is_none());
    assert_eq!(record.consecutive_failures, 0);
}

#[tokio::test]
async fn test_mars2020_not_found_is_a_failure() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("GET"))
        .and(path("/mars2020/sols/777/photos"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    assert!(scraper.scrape_sol(Source::Mars2020, 777).await.is_err());

    let record = store.get(Source::Mars2020, 777).await.unwrap().unwrap();
    assert_eq!(record.status, CompletenessStatus::Failed);
    assert_eq!(record.consecutive_failures, 1);
    assert!(record.last_error.is_some());
}

#[tokio::test]
async fn test_mars2020_not_found_mid_pagination_aborts_the_sol() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    // Page 0 is full, so pagination continues; page 1 falls through to 404
    Mock::given(method("GET"))
        .and(path("/mars2020/sols/100/photos"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [m20_item("a", "Full"), m20_item("b", "Full")],
            "total_images": 8
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mars2020/sols/100/photos"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 2), store.clone());
    assert!(scraper.scrape_sol(Source::Mars2020, 100).await.is_err());

    // Nothing from the truncated sol is stored or marked complete
    assert_eq!(store.photo_count(), 0);
    let record = store.get(Source::Mars2020, 100).await.unwrap().unwrap();
    assert_eq!(record.status, CompletenessStatus::Failed);
    assert!(record.last_error.is_some());
}

#[tokio::test]
async fn test_thumbnails_are_skipped_not_stored() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    mount_msl_page(
        &server,
        1000,
        0,
        json!({"items": [msl_item("a", "full"), msl_item("b", "thumbnail")], "total": 2}),
    )
    .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    let outcome = scraper.scrape_sol(Source::Msl, 1000).await.unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.item_errors, 0);
    assert_eq!(store.photo_count(), 1);
}

#[tokio::test]
async fn test_malformed_item_is_counted_and_ingestion_continues() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    // Second item has no usable timestamp
    let mut bad = msl_item("b", "full");
    bad["date_taken_utc"] = json!("Sol-01000M15:10:05");
    mount_msl_page(
        &server,
        1000,
        0,
        json!({"items": [msl_item("a", "full"), bad], "total": 2}),
    )
    .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    let outcome = scraper.scrape_sol(Source::Msl, 1000).await.unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.item_errors, 1);
    assert_eq!(outcome.status, CompletenessStatus::Success);
}

#[tokio::test]
async fn test_transport_failure_lands_in_the_ledger() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("GET"))
        .and(path("/msl/sols/1000/photos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    assert!(scraper.scrape_sol(Source::Msl, 1000).await.is_err());

    let record = store.get(Source::Msl, 1000).await.unwrap().unwrap();
    assert_eq!(record.status, CompletenessStatus::Failed);
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.consecutive_failures, 1);
    assert_eq!(store.photo_count(), 0);
}

#[tokio::test]
async fn test_reingesting_a_sol_inserts_nothing_new() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    mount_msl_page(
        &server,
        1000,
        0,
        json!({"items": [msl_item("a", "full"), msl_item("b", "full")], "total": 2}),
    )
    .await;

    let scraper = scraper(test_config(&server, 100), store.clone());

    let first = scraper.scrape_sol(Source::Msl, 1000).await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.duplicates, 0);

    let second = scraper.scrape_sol(Source::Msl, 1000).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(second.photo_count, 2);
    assert_eq!(store.photo_count(), 2);

    let record = store.get(Source::Msl, 1000).await.unwrap().unwrap();
    assert_eq!(record.attempt_count, 2);
    assert_eq!(record.status, CompletenessStatus::Success);
}

#[tokio::test]
async fn test_mars2020_expected_count_is_halved() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("GET"))
        .and(path("/mars2020/sols/100/photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [m20_item("a", "Full"), m20_item("b", "Thumbnail")],
            "total_images": 5
        })))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 100), store.clone());
    let outcome = scraper.scrape_sol(Source::Mars2020, 100).await.unwrap();

    // total_images counts thumbnail and full variants separately
    assert_eq!(outcome.expected, Some(3));
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 1);

    let record = store.get(Source::Mars2020, 100).await.unwrap().unwrap();
    assert_eq!(record.expected_count, Some(3));
}

#[tokio::test]
async fn test_latest_sol_lookup_per_source() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());

    Mock::given(method("GET"))
        .and(path("/msl/latest_sols"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latest_sols": [{"sol": 4102}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mars2020/latest_sol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"latest_sol": 1500})))
        .mount(&server)
        .await;

    let scraper = scraper(test_config(&server, 100), store);
    assert_eq!(scraper.latest_sol(Source::Msl).await.unwrap(), 4102);
    assert_eq!(scraper.latest_sol(Source::Mars2020).await.unwrap(), 1500);
}
