//! `GET /status?owner_id=` — connection check.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domains::credentials::Credential;
use crate::kernel::{AppError, ServerKernel};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn status(
    State(kernel): State<ServerKernel>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let credential = Credential::find_by_owner(&query.owner_id, &kernel.db_pool).await?;

    Ok(Json(match credential {
        Some(cred) if cred.is_connected() => StatusResponse {
            ok: true,
            connected: true,
            email: cred.email,
            created_at: Some(cred.created_at),
        },
        _ => StatusResponse {
            ok: true,
            connected: false,
            email: None,
            created_at: None,
        },
    }))
}
