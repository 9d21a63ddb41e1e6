//! OAuth state ticket: binds a nonce to a (tenant, return URL, expiry),
//! single-use, persisted rather than kept in memory because the callback
//! may land on a different process instance than the one that issued it.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::OAuthStateId;

const STATE_TTL_MINUTES: i64 = 15;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub id: OAuthStateId,
    pub nonce: String,
    pub owner_id: String,
    pub return_url: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OAuthState {
    pub async fn create(
        owner_id: &str,
        return_url: &str,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        let nonce = random_nonce();
        let expires_at = Utc::now() + Duration::minutes(STATE_TTL_MINUTES);
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO oauth_states (id, nonce, owner_id, return_url, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, nonce, owner_id, return_url, expires_at, consumed_at
            "#,
        )
        .bind(OAuthStateId::new())
        .bind(&nonce)
        .bind(owner_id)
        .bind(return_url)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Consume the state for `nonce`, single-use. Returns `None` if the nonce
    /// is unknown, already consumed, or expired — all three are the same
    /// "invalid or expired state" failure mode to the caller.
    pub async fn consume(nonce: &str, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE oauth_states
            SET consumed_at = NOW()
            WHERE nonce = $1 AND consumed_at IS NULL AND expires_at > NOW()
            RETURNING id, nonce, owner_id, return_url, expires_at, consumed_at
            "#,
        )
        .bind(nonce)
        .fetch_optional(pool)
        .await
    }
}

fn random_nonce() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 24] = rng.gen();
    crate::common::base64url_encode(bytes)
}
