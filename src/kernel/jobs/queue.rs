//! Thin trait boundary around the claim primitive, so the worker loop can be
//! driven against a fake queue in tests without a real Postgres instance.

use async_trait::async_trait;
use sqlx::PgPool;

use super::job::Job;

/// The claim primitive: select up to `batch_size` due, scheduled jobs and
/// atomically flip them to `claimed`, returning the selected rows. Two
/// concurrent calls never return overlapping rows (see `Job::claim_jobs`).
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn claim(&self, batch_size: i64) -> Result<Vec<Job>, sqlx::Error>;
}

pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn claim(&self, batch_size: i64) -> Result<Vec<Job>, sqlx::Error> {
        Job::claim_jobs(batch_size, &self.pool).await
    }
}
