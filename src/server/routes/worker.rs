//! `GET /api/run_scheduled_jobs` — the worker tick, triggered periodically
//! by an external scheduler. Authenticated by its own secret, constant-time
//! compared, accepted either as a header or a query parameter (§6).

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::common::constant_time_eq;
use crate::kernel::jobs::{run_once, WorkerSummary};
use crate::kernel::{AppError, ServerKernel};

const WORKER_SECRET_HEADER: &str = "x-worker-secret";

#[derive(Debug, Deserialize)]
pub struct WorkerQuery {
    secret: Option<String>,
}

pub async fn run_scheduled_jobs(
    State(kernel): State<ServerKernel>,
    Query(query): Query<WorkerQuery>,
    headers: axum::http::HeaderMap,
) -> Result<Json<WorkerSummary>, AppError> {
    let presented = headers
        .get(WORKER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.secret);

    match presented {
        Some(secret) if constant_time_eq(&secret, &kernel.config.worker_secret) => {}
        _ => return Err(AppError::Auth),
    }

    let summary = run_once(&kernel, kernel.config.job_batch_size).await?;
    Ok(Json(summary))
}
