//! Sequence: an ordered list of templates, owned by a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::SequenceId;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Sequence {
    pub async fn find_by_id(id: SequenceId, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT id, owner_id, created_at FROM sequences WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The recipient list stored against a sequence, used by the starter
    /// (§4.G) when the caller does not supply recipients inline.
    pub async fn recipient_list(
        id: SequenceId,
        pool: &PgPool,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT email FROM sequence_recipients WHERE sequence_id = $1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }
}
