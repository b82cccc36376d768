//! Job orchestration across sols and sources
//!
//! Runs a scrape job sol by sol, sequentially and throttled. Sol failures
//! inside a range are recorded and skipped past, never fatal; a source only
//! fails outright when its starting sol cannot be determined at all.
//! Cancellation is cooperative and sol-granular: the token is checked at
//! the top of each iteration, and in-flight sol work always completes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::models::{JobRun, JobSourceDetail, JobStatus, Source};
use crate::scraper::SolScraper;
use crate::store::{JobStore, PhotoStore};

/// What a job run should scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMode {
    /// One sol of one source
    Sol { source: Source, sol: u32 },
    /// An inclusive sol range of one source
    Range { source: Source, start: u32, end: u32 },
    /// Every source from the configured start sol through its current sol
    Full,
}

impl JobMode {
    pub fn label(&self) -> &'static str {
        match self {
            JobMode::Sol { .. } => "sol",
            JobMode::Range { .. } => "range",
            JobMode::Full => "full",
        }
    }

    fn sources(&self) -> Vec<Source> {
        match self {
            JobMode::Sol { source, .. } | JobMode::Range { source, .. } => vec![*source],
            JobMode::Full => Source::ALL.to_vec(),
        }
    }
}

/// Where a source currently is in time
///
/// The live implementation asks the feed; jobs fall back to the highest
/// stored sol when the feed cannot answer.
#[async_trait]
pub trait CurrentSolProvider: Send + Sync {
    async fn current_sol(&self, source: Source) -> Result<u32>;
}

#[async_trait]
impl CurrentSolProvider for SolScraper {
    async fn current_sol(&self, source: Source) -> Result<u32> {
        Ok(self.latest_sol(source).await?)
    }
}

/// Drives scrape jobs and persists their run records
pub struct JobOrchestrator {
    config: Arc<IngestConfig>,
    scraper: Arc<SolScraper>,
    current: Arc<dyn CurrentSolProvider>,
    photos: Arc<dyn PhotoStore>,
    jobs: Arc<dyn JobStore>,
}

impl JobOrchestrator {
    pub fn new(
        config: Arc<IngestConfig>,
        scraper: Arc<SolScraper>,
        current: Arc<dyn CurrentSolProvider>,
        photos: Arc<dyn PhotoStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            config,
            scraper,
            current,
            photos,
            jobs,
        }
    }

    /// Run a job to completion, creating its run record
    pub async fn run(&self, mode: JobMode, cancel: CancellationToken) -> Result<JobRun> {
        self.execute(JobRun::new(mode.label()), mode, cancel).await
    }

    /// Current sol of a source, as the full-scrape mode would determine it
    pub async fn current_sol(&self, source: Source) -> Result<u32> {
        self.current.current_sol(source).await
    }

    /// Run a job to completion under a pre-allocated run record
    ///
    /// The record is persisted as running before any scraping starts, so
    /// its id is queryable while the job is in flight.
    pub async fn execute(
        &self,
        mut run: JobRun,
        mode: JobMode,
        cancel: CancellationToken,
    ) -> Result<JobRun> {
        self.jobs.insert_run(&run).await?;
        info!(job_id = %run.id, mode = mode.label(), "Starting ingestion job");

        let mut cancelled = false;

        for source in mode.sources() {
            let mut detail = JobSourceDetail::new(source);

            match self.resolve_range(&mode, source).await {
                Ok((start, end)) => {
                    cancelled = self
                        .scrape_range(source, start, end, &cancel, &mut detail)
                        .await;
                    detail.status = if cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Success
                    };
                },
                Err(err) => {
                    // The one source-level hard failure: no starting sol
                    error!(job_id = %run.id, source = %source, error = %err, "Source could not start");
                    detail.status = JobStatus::Failed;
                    detail.error = Some(err.to_string());
                },
            }

            detail.completed_at = Some(Utc::now());
            run.sols_attempted += detail.sols_attempted;
            run.sols_succeeded += detail.sols_succeeded;
            run.sols_failed += detail.sols_failed;
            run.photos_added += detail.photos_added;
            run.sources.push(detail);

            if cancelled {
                break;
            }
        }

        // The run is a success only when every source completed; sol-level
        // failures inside a completed source do not count against it.
        run.status = if cancelled {
            JobStatus::Cancelled
        } else if run.sources.iter().any(|d| d.status == JobStatus::Failed) {
            JobStatus::Failed
        } else {
            JobStatus::Success
        };

        let completed_at = Utc::now();
        run.duration_ms = Some((completed_at - run.started_at).num_milliseconds());
        run.completed_at = Some(completed_at);
        self.jobs.complete_run(&run).await?;

        info!(
            job_id = %run.id,
            status = %run.status,
            sols_attempted = run.sols_attempted,
            sols_failed = run.sols_failed,
            photos_added = run.photos_added,
            "Ingestion job finished"
        );
        Ok(run)
    }

    /// Inclusive sol range for one source under the given mode
    async fn resolve_range(&self, mode: &JobMode, source: Source) -> Result<(u32, u32)> {
        match mode {
            JobMode::Sol { sol, .. } => Ok((*sol, *sol)),
            JobMode::Range { start, end, .. } => Ok((*start, *end)),
            JobMode::Full => {
                let start = self.config.full_start_sol;
                match self.current.current_sol(source).await {
                    Ok(current) => Ok((start, current)),
                    Err(feed_err) => {
                        // Feed is down; the highest stored sol still lets us run
                        match self.photos.max_sol(source).await? {
                            Some(max) => {
                                warn!(
                                    source = %source,
                                    fallback_sol = max,
                                    error = %feed_err,
                                    "Using highest stored sol as current"
                                );
                                Ok((start, max as u32))
                            },
                            None => Err(feed_err.context("no current sol and no stored data")),
                        }
                    },
                }
            },
        }
    }

    /// Scrape `start..=end`; returns whether cancellation was observed
    async fn scrape_range(
        &self,
        source: Source,
        start: u32,
        end: u32,
        cancel: &CancellationToken,
        detail: &mut JobSourceDetail,
    ) -> bool {
        for sol in start..=end {
            if cancel.is_cancelled() {
                info!(source = %source, sol, "Cancellation observed at sol boundary");
                return true;
            }

            detail.sols_attempted += 1;
            match self.scraper.scrape_sol(source, sol).await {
                Ok(outcome) => {
                    detail.sols_succeeded += 1;
                    detail.photos_added += outcome.inserted as i64;
                },
                Err(err) => {
                    // Already in the completeness ledger; keep going
                    warn!(source = %source, sol, error = %err, "Sol failed, continuing");
                    detail.sols_failed += 1;
                    detail.failed_sols.push(sol as i32);
                },
            }

            if sol < end && self.config.inter_sol_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.config.inter_sol_delay_ms,
                ))
                .await;
            }
        }

        false
    }
}
