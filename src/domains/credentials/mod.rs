//! Credential store (component A): one refresh token per tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::CredentialId;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub owner_id: String,
    pub email: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_connected(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub async fn find_by_owner(
        owner_id: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, owner_id, email, refresh_token, created_at, last_used_at
            FROM credentials
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(pool)
        .await
    }

    /// Upsert keyed on `owner_id` — at most one credential row per tenant.
    pub async fn upsert(
        owner_id: &str,
        email: Option<&str>,
        refresh_token: &str,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO credentials (id, owner_id, email, refresh_token, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (owner_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, credentials.email),
                refresh_token = EXCLUDED.refresh_token
            RETURNING id, owner_id, email, refresh_token, created_at, last_used_at
            "#,
        )
        .bind(CredentialId::new())
        .bind(owner_id)
        .bind(email)
        .bind(refresh_token)
        .fetch_one(pool)
        .await
    }

    pub async fn touch_last_used(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE credentials SET last_used_at = NOW() WHERE id = $1")
            .bind(self.id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
