//! Email event: an append-only audit row per send attempt, bound to a run
//! and step. Never updated after insertion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::{EmailEventId, RunId, StepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_event_status", rename_all = "snake_case")]
pub enum EmailEventStatus {
    Sent,
    Failed,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct EmailEvent {
    pub id: EmailEventId,
    pub sequence_run_id: RunId,
    pub step_id: Option<StepId>,
    pub status: EmailEventStatus,
    pub message_id: Option<String>,
    pub last_error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl EmailEvent {
    pub async fn record_sent(
        run_id: RunId,
        step_id: StepId,
        message_id: Option<&str>,
        sent_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO email_events
                (id, sequence_run_id, step_id, status, message_id, last_error, sent_at)
            VALUES ($1, $2, $3, 'sent', $4, NULL, $5)
            RETURNING id, sequence_run_id, step_id, status, message_id, last_error, sent_at
            "#,
        )
        .bind(EmailEventId::new())
        .bind(run_id)
        .bind(step_id)
        .bind(message_id)
        .bind(sent_at)
        .fetch_one(pool)
        .await
    }

    /// Records a post-send failure (e.g. the sequence state machine's own
    /// bookkeeping failed after the job was already marked `sent`). The job
    /// itself is not reverted — see §4.E/§7.
    pub async fn record_failed(
        run_id: RunId,
        step_id: Option<StepId>,
        last_error: &str,
        sent_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO email_events
                (id, sequence_run_id, step_id, status, message_id, last_error, sent_at)
            VALUES ($1, $2, $3, 'failed', NULL, $4, $5)
            RETURNING id, sequence_run_id, step_id, status, message_id, last_error, sent_at
            "#,
        )
        .bind(EmailEventId::new())
        .bind(run_id)
        .bind(step_id)
        .bind(last_error)
        .bind(sent_at)
        .fetch_one(pool)
        .await
    }
}
