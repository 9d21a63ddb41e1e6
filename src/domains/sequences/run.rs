//! Run: the per-(sequence, recipient) progression through ordered steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::{RunId, SequenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Active,
    Stopped,
    Completed,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub sequence_id: SequenceId,
    pub owner_id: String,
    pub recipient_email: String,
    pub status: RunStatus,
    pub current_step: i32,
    pub thread_id: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, sequence_id, owner_id, recipient_email, status, \
     current_step, thread_id, last_sent_at, created_at";

impl Run {
    /// Create a fresh, active run at step 0 — §4.G step 3.
    pub async fn create(
        sequence_id: SequenceId,
        owner_id: &str,
        recipient_email: &str,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO sequence_runs
                (id, sequence_id, owner_id, recipient_email, status, current_step, created_at)
            VALUES ($1, $2, $3, $4, 'active', 0, NOW())
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(RunId::new())
        .bind(sequence_id)
        .bind(owner_id)
        .bind(recipient_email)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(id: RunId, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {RUN_COLUMNS} FROM sequence_runs WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// §4.F step 3: advance `current_step`, stamp `last_sent_at`, and set
    /// `thread_id` iff it is not already set (first-write-wins — once a run
    /// has a thread id it is append-only, never overwritten).
    pub async fn record_send(
        &self,
        step_order: i32,
        thread_id: Option<&str>,
        sent_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE sequence_runs
            SET current_step = $2,
                last_sent_at = $3,
                thread_id = COALESCE(thread_id, $4)
            WHERE id = $1
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(step_order)
        .bind(sent_at)
        .bind(thread_id)
        .fetch_one(pool)
        .await
    }

    pub async fn mark_stopped(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        self.set_status(RunStatus::Stopped, pool).await
    }

    pub async fn mark_completed(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        self.set_status(RunStatus::Completed, pool).await
    }

    async fn set_status(&self, status: RunStatus, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE sequence_runs SET status = $2 WHERE id = $1 RETURNING {RUN_COLUMNS}"
        ))
        .bind(self.id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Active
    }
}
