//! `POST /send_email` — a one-shot send, outside any sequence. Bypasses the
//! job queue entirely: this is a synchronous dispatch, not a scheduled one.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domains::credentials::Credential;
use crate::domains::mail::OutgoingMessage;
use crate::kernel::{AppError, ServerKernel};

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub owner_id: String,
    pub to: String,
    pub subject: Option<String>,
    pub body_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub ok: bool,
    pub message_id: Option<String>,
}

pub async fn send_email(
    State(kernel): State<ServerKernel>,
    Json(body): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, AppError> {
    if body.owner_id.trim().is_empty() || body.to.trim().is_empty() {
        return Err(AppError::Validation("owner_id and to are required".into()));
    }

    let credential = Credential::find_by_owner(&body.owner_id, &kernel.db_pool).await?;
    let refresh_token = credential
        .as_ref()
        .and_then(|c| c.refresh_token.as_deref())
        .ok_or(AppError::NoRefreshToken)?;

    let message = OutgoingMessage {
        from: &kernel.config.email_from,
        to: &body.to,
        subject: body.subject.as_deref(),
        body_text: body.body_text.as_deref(),
    };

    let outcome = kernel.mail_sender.send(refresh_token, message).await?;
    Ok(Json(SendEmailResponse {
        ok: true,
        message_id: outcome.message_id,
    }))
}
