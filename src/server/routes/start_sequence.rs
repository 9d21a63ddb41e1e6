//! `POST /api/start_sequence` — materializes a run per recipient (§4.G).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::domains::sequences::run::Run;
use crate::domains::sequences::starter::{start_sequence, StartSequenceRequest};
use crate::kernel::jobs::Job;
use crate::kernel::{AppError, ServerKernel};

#[derive(Debug, Serialize)]
pub struct StartSequenceResponse {
    pub ok: bool,
    pub runs: Vec<Run>,
    pub jobs: Vec<Job>,
}

pub async fn start(
    State(kernel): State<ServerKernel>,
    Json(body): Json<StartSequenceRequest>,
) -> Result<(StatusCode, Json<StartSequenceResponse>), AppError> {
    let outcome = start_sequence(body, &kernel.db_pool).await?;

    Ok((
        StatusCode::CREATED,
        Json(StartSequenceResponse {
            ok: true,
            runs: outcome.runs,
            jobs: outcome.jobs,
        }),
    ))
}
