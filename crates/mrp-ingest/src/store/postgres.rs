//! Postgres store
//!
//! Canonical store backed by sqlx. Queries are bound at runtime so the
//! workspace builds without a live database; the schema lives in
//! `migrations/`.
//!
//! Idempotence is enforced here, not in the caller: `photos` carries a
//! unique constraint on `(source, source_id)` and inserts use
//! `ON CONFLICT DO NOTHING`, so overlapping ingestion runs can race
//! without double-inserting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{
    CanonicalPhoto, CompletenessRecord, CompletenessStatus, JobRun, JobSourceDetail, JobStatus,
    Source,
};

use super::{CompletenessStore, JobStore, PhotoStore, StoreError, StoreResult};

/// Photos inserted per bulk statement.
const INSERT_CHUNK_SIZE: usize = 100;

/// Postgres implementation of all store traits
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }
}

fn parse_source(value: &str) -> StoreResult<Source> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown source in row: {}", value)))
}

fn parse_completeness_status(value: &str) -> StoreResult<CompletenessStatus> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown completeness status: {}", value)))
}

fn parse_job_status(value: &str) -> StoreResult<JobStatus> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown job status: {}", value)))
}

#[async_trait]
impl PhotoStore for PgStore {
    async fn existing_ids(&self, source: Source, ids: &[String]) -> StoreResult<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT source_id
            FROM photos
            WHERE source = $1 AND source_id = ANY($2)
            "#,
        )
        .bind(source.as_str())
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("source_id").map_err(StoreError::from))
            .collect()
    }

    async fn insert_photos(&self, photos: &[CanonicalPhoto]) -> StoreResult<u64> {
        let mut inserted = 0u64;

        for chunk in photos.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO photos (
                    source, source_id, sol, captured_at_utc, captured_at_local,
                    img_small, img_medium, img_large, img_full,
                    width, height, sample_type, site, drive,
                    pos_x, pos_y, pos_z, azimuth, elevation,
                    camera_id, source_ref
                ) ",
            );

            builder.push_values(chunk, |mut b, photo| {
                b.push_bind(photo.source.as_str())
                    .push_bind(&photo.source_id)
                    .push_bind(photo.sol)
                    .push_bind(photo.captured_at_utc)
                    .push_bind(&photo.captured_at_local)
                    .push_bind(&photo.image_urls.small)
                    .push_bind(&photo.image_urls.medium)
                    .push_bind(&photo.image_urls.large)
                    .push_bind(&photo.image_urls.full)
                    .push_bind(photo.width)
                    .push_bind(photo.height)
                    .push_bind(photo.sample_type.as_str())
                    .push_bind(photo.site)
                    .push_bind(photo.drive)
                    .push_bind(photo.position.map(|p| p.x))
                    .push_bind(photo.position.map(|p| p.y))
                    .push_bind(photo.position.map(|p| p.z))
                    .push_bind(photo.azimuth)
                    .push_bind(photo.elevation)
                    .push_bind(&photo.camera_id)
                    .push_bind(&photo.source_ref);
            });

            builder.push(" ON CONFLICT (source, source_id) DO NOTHING");

            let result = builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn count_for_sol(&self, source: Source, sol: i32) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE source = $1 AND sol = $2")
                .bind(source.as_str())
                .bind(sol)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn sol_counts(&self, source: Source) -> StoreResult<Vec<(i32, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT sol, COUNT(*) AS photo_count
            FROM photos
            WHERE source = $1
            GROUP BY sol
            ORDER BY sol
            "#,
        )
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<i32, _>("sol")?,
                    row.try_get::<i64, _>("photo_count")?,
                ))
            })
            .collect()
    }

    async fn max_sol(&self, source: Source) -> StoreResult<Option<i32>> {
        let max: Option<i32> = sqlx::query_scalar("SELECT MAX(sol) FROM photos WHERE source = $1")
            .bind(source.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(max)
    }
}

fn completeness_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<CompletenessRecord> {
    Ok(CompletenessRecord {
        source: parse_source(&row.try_get::<String, _>("source")?)?,
        sol: row.try_get("sol")?,
        photo_count: row.try_get("photo_count")?,
        expected_count: row.try_get("expected_count")?,
        status: parse_completeness_status(&row.try_get::<String, _>("status")?)?,
        last_attempt_at: row.try_get("last_attempt_at")?,
        last_success_at: row.try_get("last_success_at")?,
        attempt_count: row.try_get("attempt_count")?,
        consecutive_failures: row.try_get("consecutive_failures")?,
        last_error: row.try_get("last_error")?,
    })
}

#[async_trait]
impl CompletenessStore for PgStore {
    async fn get(&self, source: Source, sol: i32) -> StoreResult<Option<CompletenessRecord>> {
        let row = sqlx::query(
            r#"
            SELECT source, sol, photo_count, expected_count, status,
                   last_attempt_at, last_success_at, attempt_count,
                   consecutive_failures, last_error
            FROM ingestion_completeness
            WHERE source = $1 AND sol = $2
            "#,
        )
        .bind(source.as_str())
        .bind(sol)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(completeness_from_row).transpose()
    }

    async fn upsert(&self, record: &CompletenessRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_completeness (
                source, sol, photo_count, expected_count, status,
                last_attempt_at, last_success_at, attempt_count,
                consecutive_failures, last_error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source, sol)
            DO UPDATE SET
                photo_count = EXCLUDED.photo_count,
                expected_count = EXCLUDED.expected_count,
                status = EXCLUDED.status,
                last_attempt_at = EXCLUDED.last_attempt_at,
                last_success_at = EXCLUDED.last_success_at,
                attempt_count = EXCLUDED.attempt_count,
                consecutive_failures = EXCLUDED.consecutive_failures,
                last_error = EXCLUDED.last_error
            "#,
        )
        .bind(record.source.as_str())
        .bind(record.sol)
        .bind(record.photo_count)
        .bind(record.expected_count)
        .bind(record.status.as_str())
        .bind(record.last_attempt_at)
        .bind(record.last_success_at)
        .bind(record.attempt_count)
        .bind(record.consecutive_failures)
        .bind(&record.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, source: Source) -> StoreResult<Vec<CompletenessRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT source, sol, photo_count, expected_count, status,
                   last_attempt_at, last_success_at, attempt_count,
                   consecutive_failures, last_error
            FROM ingestion_completeness
            WHERE source = $1
            ORDER BY sol
            "#,
        )
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(completeness_from_row).collect()
    }
}

fn detail_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<JobSourceDetail> {
    Ok(JobSourceDetail {
        source: parse_source(&row.try_get::<String, _>("source")?)?,
        status: parse_job_status(&row.try_get::<String, _>("status")?)?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        sols_attempted: row.try_get("sols_attempted")?,
        sols_succeeded: row.try_get("sols_succeeded")?,
        sols_failed: row.try_get("sols_failed")?,
        photos_added: row.try_get("photos_added")?,
        failed_sols: row.try_get("failed_sols")?,
        error: row.try_get("error")?,
    })
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_run(&self, run: &JobRun) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (
                id, mode, status, started_at, completed_at,
                sols_attempted, sols_succeeded, sols_failed,
                photos_added, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(run.id)
        .bind(&run.mode)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.sols_attempted)
        .bind(run.sols_succeeded)
        .bind(run.sols_failed)
        .bind(run.photos_added)
        .bind(run.duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_run(&self, run: &JobRun) -> StoreResult<()> {
        // Completion fields are set exactly once; a finished run never changes
        let updated = sqlx::query(
            r#"
            UPDATE job_runs
            SET status = $2,
                completed_at = $3,
                sols_attempted = $4,
                sols_succeeded = $5,
                sols_failed = $6,
                photos_added = $7,
                duration_ms = $8
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.completed_at)
        .bind(run.sols_attempted)
        .bind(run.sols_succeeded)
        .bind(run.sols_failed)
        .bind(run.photos_added)
        .bind(run.duration_ms)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(());
        }

        for detail in &run.sources {
            sqlx::query(
                r#"
                INSERT INTO job_source_details (
                    job_id, source, status, started_at, completed_at,
                    sols_attempted, sols_succeeded, sols_failed,
                    photos_added, failed_sols, error
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(run.id)
            .bind(detail.source.as_str())
            .bind(detail.status.as_str())
            .bind(detail.started_at)
            .bind(detail.completed_at)
            .bind(detail.sols_attempted)
            .bind(detail.sols_succeeded)
            .bind(detail.sols_failed)
            .bind(detail.photos_added)
            .bind(&detail.failed_sols)
            .bind(&detail.error)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> StoreResult<Option<JobRun>> {
        let row = sqlx::query(
            r#"
            SELECT id, mode, status, started_at, completed_at,
                   sols_attempted, sols_succeeded, sols_failed,
                   photos_added, duration_ms
            FROM job_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let detail_rows = sqlx::query(
            r#"
            SELECT source, status, started_at, completed_at,
                   sols_attempted, sols_succeeded, sols_failed,
                   photos_added, failed_sols, error
            FROM job_source_details
            WHERE job_id = $1
            ORDER BY source
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let sources = detail_rows
            .iter()
            .map(detail_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(JobRun {
            id: row.try_get("id")?,
            mode: row.try_get("mode")?,
            status: parse_job_status(&row.try_get::<String, _>("status")?)?,
            started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
            completed_at: row.try_get("completed_at")?,
            sols_attempted: row.try_get("sols_attempted")?,
            sols_succeeded: row.try_get("sols_succeeded")?,
            sols_failed: row.try_get("sols_failed")?,
            photos_added: row.try_get("photos_added")?,
            duration_ms: row.try_get("duration_ms")?,
            sources,
        }))
    }
}
