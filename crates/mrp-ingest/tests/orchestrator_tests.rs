//! Job orchestration tests against mocked upstream feeds

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mrp_ingest::config::IngestConfig;
use mrp_ingest::jobs::JobManager;
use mrp_ingest::models::{JobStatus, Source};
use mrp_ingest::orchestrator::{CurrentSolProvider, JobMode, JobOrchestrator};
use mrp_ingest::scraper::SolScraper;
use mrp_ingest::store::{JobStore, MemoryStore, PhotoStore};

fn test_config(server: &MockServer) -> Arc<IngestConfig> {
    Arc::new(IngestConfig {
        msl_feed_url: server.uri(),
        mars2020_feed_url: server.uri(),
        per_page: 100,
        request_timeout_secs: 5,
        inter_sol_delay_ms: 0,
        full_start_sol: 0,
        max_pages_per_sol: 50,
    })
}

fn msl_item(id: &str, sol: u32) -> Value {
    json!({
        "imageid": id,
        "sol": sol,
        "instrument": "NAV_LEFT_B",
        "sample_type": "full",
        "date_taken_utc": "2015-05-30T16:46:33Z",
        "https_url": format!("https://example.com/{}.JPG", id)
    })
}

async fn mount_msl_sol(server: &MockServer, sol: u32, items: Vec<Value>) {
    let total = items.len();
    Mock::given(method("GET"))
        .and(path(format!("/msl/sols/{}/photos", sol)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": items, "total": total})),
        )
        .mount(server)
        .await;
}

struct Harness {
    orchestrator: JobOrchestrator,
    store: Arc<MemoryStore>,
}

fn harness(config: Arc<IngestConfig>, current: Option<Arc<dyn CurrentSolProvider>>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let scraper = Arc::new(
        SolScraper::new(config.clone(), store.clone(), store.clone()).unwrap(),
    );
    let current: Arc<dyn CurrentSolProvider> = match current {
        Some(provider) => provider,
        None => scraper.clone(),
    };

    Harness {
        orchestrator: JobOrchestrator::new(
            config,
            scraper,
            current,
            store.clone(),
            store.clone(),
        ),
        store,
    }
}

/// Stands in for a feed that cannot answer the current-sol lookup
struct DownFeed;

#[async_trait]
impl CurrentSolProvider for DownFeed {
    async fn current_sol(&self, _source: Source) -> Result<u32> {
        anyhow::bail!("latest-sol endpoint unreachable")
    }
}

#[tokio::test]
async fn test_failing_sol_does_not_stop_the_range() {
    let server = MockServer::start().await;
    mount_msl_sol(&server, 10, vec![msl_item("a", 10)]).await;
    Mock::given(method("GET"))
        .and(path("/msl/sols/11/photos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_msl_sol(&server, 12, vec![msl_item("b", 12)]).await;

    let h = harness(test_config(&server), None);
    let run = h
        .orchestrator
        .run(
            JobMode::Range {
                source: Source::Msl,
                start: 10,
                end: 12,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // A sol failure inside the range never fails the source
    assert_eq!(run.status, JobStatus::Success);
    assert_eq!(run.sols_attempted, 3);
    assert_eq!(run.sols_succeeded, 2);
    assert_eq!(run.sols_failed, 1);
    assert_eq!(run.photos_added, 2);

    let detail = &run.sources[0];
    assert_eq!(detail.status, JobStatus::Success);
    assert_eq!(detail.failed_sols, vec![11]);
    assert!(run.is_finished());
    assert!(run.duration_ms.is_some());

    // The run record is queryable afterwards
    let stored = h.store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Success);
}

#[tokio::test]
async fn test_cancellation_stops_at_the_sol_boundary() {
    let server = MockServer::start().await;
    let h = harness(test_config(&server), None);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = h
        .orchestrator
        .run(
            JobMode::Range {
                source: Source::Msl,
                start: 0,
                end: 100,
            },
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(run.status, JobStatus::Cancelled);
    assert_eq!(run.sols_attempted, 0);
    assert_eq!(run.sources[0].status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_interrupts_a_running_range() {
    let server = MockServer::start().await;
    // No mocks mounted: every sol fetch 404s, which MSL treats as empty

    let config = Arc::new(IngestConfig {
        msl_feed_url: server.uri(),
        mars2020_feed_url: server.uri(),
        per_page: 100,
        request_timeout_secs: 5,
        inter_sol_delay_ms: 25,
        full_start_sol: 0,
        max_pages_per_sol: 50,
    });
    let store = Arc::new(MemoryStore::new());
    let scraper = Arc::new(
        SolScraper::new(config.clone(), store.clone(), store.clone()).unwrap(),
    );
    let orchestrator = Arc::new(JobOrchestrator::new(
        config,
        scraper.clone(),
        scraper,
        store.clone(),
        store.clone(),
    ));
    let manager = JobManager::new(orchestrator, store.clone());

    let job_id = manager.trigger_range(Source::Msl, 0, 500);

    // Let a few sols complete, then request cancellation mid-range
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.cancel(job_id));

    let mut finished = None;
    for _ in 0..200 {
        if let Some(run) = manager.job_status(job_id).await.unwrap() {
            if run.is_finished() {
                finished = Some(run);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The job stopped at a sol boundary, well short of the full range
    let run = finished.expect("job never finished after cancellation");
    assert_eq!(run.status, JobStatus::Cancelled);
    assert_eq!(run.sources[0].status, JobStatus::Cancelled);
    assert!(run.sols_attempted >= 1);
    assert!(run.sols_attempted < 501);
    assert!(manager.running_jobs().is_empty());
}

#[tokio::test]
async fn test_full_run_fails_only_without_any_starting_signal() {
    let server = MockServer::start().await;
    let h = harness(test_config(&server), Some(Arc::new(DownFeed)));

    let run = h
        .orchestrator
        .run(JobMode::Full, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, JobStatus::Failed);
    assert_eq!(run.sources.len(), 2);
    for detail in &run.sources {
        assert_eq!(detail.status, JobStatus::Failed);
        assert!(detail.error.is_some());
        assert_eq!(detail.sols_attempted, 0);
    }
}

#[tokio::test]
async fn test_full_run_falls_back_to_highest_stored_sol() {
    let server = MockServer::start().await;
    mount_msl_sol(&server, 0, vec![msl_item("a", 0)]).await;
    mount_msl_sol(&server, 1, vec![msl_item("b", 1)]).await;

    let h = harness(test_config(&server), Some(Arc::new(DownFeed)));

    // Prior data ends at sol 1; that is enough to start MSL
    let mut seed = msl_parse_seed();
    seed.sol = 1;
    h.store.insert_photos(&[seed]).await.unwrap();

    let run = h
        .orchestrator
        .run(JobMode::Full, CancellationToken::new())
        .await
        .unwrap();

    // One source could not start at all, so the run as a whole is failed
    assert_eq!(run.status, JobStatus::Failed);

    let msl = run
        .sources
        .iter()
        .find(|d| d.source == Source::Msl)
        .unwrap();
    assert_eq!(msl.status, JobStatus::Success);
    assert_eq!(msl.sols_attempted, 2);

    // Mars2020 has neither a feed signal nor stored data
    let m20 = run
        .sources
        .iter()
        .find(|d| d.source == Source::Mars2020)
        .unwrap();
    assert_eq!(m20.status, JobStatus::Failed);
}

fn msl_parse_seed() -> mrp_ingest::models::CanonicalPhoto {
    mrp_ingest::models::CanonicalPhoto {
        source: Source::Msl,
        source_id: "seed".to_string(),
        sol: 0,
        captured_at_utc: chrono::Utc::now(),
        captured_at_local: None,
        image_urls: Default::default(),
        width: None,
        height: None,
        sample_type: Default::default(),
        site: None,
        drive: None,
        position: None,
        azimuth: None,
        elevation: None,
        camera_id: "NAVCAM".to_string(),
        source_ref: json!({}),
    }
}

#[tokio::test]
async fn test_job_manager_runs_and_reports_a_job() {
    let server = MockServer::start().await;
    mount_msl_sol(&server, 42, vec![msl_item("a", 42)]).await;

    let config = test_config(&server);
    let store = Arc::new(MemoryStore::new());
    let scraper = Arc::new(
        SolScraper::new(config.clone(), store.clone(), store.clone()).unwrap(),
    );
    let orchestrator = Arc::new(JobOrchestrator::new(
        config,
        scraper.clone(),
        scraper,
        store.clone(),
        store.clone(),
    ));
    let manager = JobManager::new(orchestrator, store.clone());

    let job_id = manager.trigger_sol(Source::Msl, 42);

    // Poll until the background task finishes
    let mut finished = None;
    for _ in 0..100 {
        if let Some(run) = manager.job_status(job_id).await.unwrap() {
            if run.is_finished() {
                finished = Some(run);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let run = finished.expect("job never finished");
    assert_eq!(run.status, JobStatus::Success);
    assert_eq!(run.photos_added, 1);
    assert!(manager.running_jobs().is_empty());

    // Finished and unknown jobs cannot be cancelled
    assert!(!manager.cancel(job_id));
    assert!(!manager.cancel(uuid::Uuid::new_v4()));
}

#[tokio::test]
async fn test_full_scrape_requires_confirmation() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let store = Arc::new(MemoryStore::new());
    let scraper = Arc::new(
        SolScraper::new(config.clone(), store.clone(), store.clone()).unwrap(),
    );
    let orchestrator = Arc::new(JobOrchestrator::new(
        config,
        scraper.clone(),
        scraper,
        store.clone(),
        store.clone(),
    ));
    let manager = JobManager::new(orchestrator, store);

    assert!(manager.trigger_full(false).is_err());
}
