//! Background job management
//!
//! Thin layer over the orchestrator that runs jobs as background tasks,
//! hands callers the job id immediately, and tracks cancellation tokens
//! for the runs still in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{JobRun, Source};
use crate::orchestrator::{JobMode, JobOrchestrator};
use crate::store::JobStore;

/// Launches and tracks background ingestion jobs
pub struct JobManager {
    orchestrator: Arc<JobOrchestrator>,
    jobs: Arc<dyn JobStore>,
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobManager {
    pub fn new(orchestrator: Arc<JobOrchestrator>, jobs: Arc<dyn JobStore>) -> Self {
        Self {
            orchestrator,
            jobs,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ingest one sol in the background; returns the job id
    pub fn trigger_sol(&self, source: Source, sol: u32) -> Uuid {
        self.spawn(JobMode::Sol { source, sol })
    }

    /// Ingest an inclusive sol range in the background; returns the job id
    pub fn trigger_range(&self, source: Source, start: u32, end: u32) -> Uuid {
        self.spawn(JobMode::Range { source, start, end })
    }

    /// Ingest every source from the configured start sol to its current sol
    ///
    /// A full scrape takes days against the live feeds, so it requires an
    /// explicit confirmation flag.
    pub fn trigger_full(&self, confirm: bool) -> Result<Uuid> {
        if !confirm {
            anyhow::bail!("a full scrape must be explicitly confirmed");
        }
        Ok(self.spawn(JobMode::Full))
    }

    fn spawn(&self, mode: JobMode) -> Uuid {
        let run = JobRun::new(mode.label());
        let job_id = run.id;
        let cancel = CancellationToken::new();

        lock(&self.running).insert(job_id, cancel.clone());

        let orchestrator = self.orchestrator.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            if let Err(err) = orchestrator.execute(run, mode, cancel).await {
                error!(job_id = %job_id, error = %err, "Ingestion job crashed");
            }
            lock(&running).remove(&job_id);
        });

        info!(job_id = %job_id, "Launched ingestion job");
        job_id
    }

    /// Persisted state of a job run, whether running or finished
    pub async fn job_status(&self, job_id: Uuid) -> Result<Option<JobRun>> {
        Ok(self.jobs.get_run(job_id).await?)
    }

    /// Request cancellation of a running job
    ///
    /// Takes effect at the next sol boundary. Returns false when the job is
    /// unknown or already finished.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match lock(&self.running).get(&job_id) {
            Some(token) => {
                token.cancel();
                info!(job_id = %job_id, "Cancellation requested");
                true
            },
            None => false,
        }
    }

    /// Current sol reported for a source
    pub async fn current_sol(&self, source: Source) -> Result<u32> {
        self.orchestrator.current_sol(source).await
    }

    /// Job ids currently in flight
    pub fn running_jobs(&self) -> Vec<Uuid> {
        lock(&self.running).keys().copied().collect()
    }
}
