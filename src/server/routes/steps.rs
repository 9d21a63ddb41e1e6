//! `POST /api/steps` (bulk create) and `POST /api/sequence_step_upsert`
//! (insert-or-update one step). Both work directly on the `Step` model —
//! a thin wrapper over the data model, not business logic.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::common::entity_ids::{SequenceId, StepId};
use crate::domains::sequences::step::{NewStep, Step};
use crate::kernel::{AppError, ServerKernel};

#[derive(Debug, Deserialize)]
pub struct BulkStepsRequest {
    pub sequence_id: SequenceId,
    #[serde(default)]
    pub steps: Option<Vec<NewStep>>,
    // A single-step shorthand, flattened alongside `steps`.
    #[serde(default)]
    pub step_order: Option<i32>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub delay_days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BulkStepsResponse {
    pub ok: bool,
    pub inserted: usize,
    pub rows: Vec<Step>,
}

pub async fn bulk_create_steps(
    State(kernel): State<ServerKernel>,
    Json(body): Json<BulkStepsRequest>,
) -> Result<Json<BulkStepsResponse>, AppError> {
    let inputs = match body.steps {
        Some(steps) if !steps.is_empty() => steps,
        _ => {
            let step_order = body
                .step_order
                .ok_or_else(|| AppError::Validation("steps[] or step_order is required".into()))?;
            vec![NewStep {
                step_order,
                subject: body.subject,
                body_text: body.body_text,
                delay_days: body.delay_days.unwrap_or(0),
            }]
        }
    };

    let mut rows = Vec::with_capacity(inputs.len());
    for input in &inputs {
        rows.push(Step::insert(body.sequence_id, input, &kernel.db_pool).await?);
    }

    Ok(Json(BulkStepsResponse {
        ok: true,
        inserted: rows.len(),
        rows,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpsertStepRequest {
    pub sequence_id: SequenceId,
    pub subject: String,
    pub body_text: String,
    pub id: Option<StepId>,
    pub step_order: Option<i32>,
    pub delay_days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UpsertStepResponse {
    pub ok: bool,
    pub step: Step,
}

pub async fn upsert_step(
    State(kernel): State<ServerKernel>,
    Json(body): Json<UpsertStepRequest>,
) -> Result<Json<UpsertStepResponse>, AppError> {
    let step = Step::upsert(
        body.sequence_id,
        body.id,
        body.step_order,
        &body.subject,
        &body.body_text,
        body.delay_days,
        &kernel.db_pool,
    )
    .await?;

    Ok(Json(UpsertStepResponse { ok: true, step }))
}
