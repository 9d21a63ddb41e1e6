//! `POST /oauth/start` and `GET /oauth2/callback` — the two unauthenticated
//! legs of the OAuth grant exchanger (component H). The callback carries its
//! own security: a single-use, time-boxed state nonce.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use serde::Deserialize;

use crate::domains::oauth;
use crate::kernel::{AppError, ServerKernel};

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub owner_id: String,
    pub return_url: Option<String>,
}

pub async fn start(
    State(kernel): State<ServerKernel>,
    Json(body): Json<StartRequest>,
) -> Result<Json<oauth::AuthorizationUrl>, AppError> {
    if body.owner_id.trim().is_empty() {
        return Err(AppError::Validation("owner_id is required".into()));
    }
    let return_url = body
        .return_url
        .unwrap_or_else(|| kernel.config.frontend_return.clone());

    let result = oauth::start(&body.owner_id, &return_url, &kernel.config, &kernel.db_pool).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub async fn callback(
    State(kernel): State<ServerKernel>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let client = reqwest::Client::new();
    let outcome = oauth::callback(
        &query.code,
        &query.state,
        &client,
        &kernel.config,
        &kernel.db_pool,
    )
    .await?;

    let redirect_url = format!(
        "{}?status=success&owner_id={}",
        outcome.return_url,
        urlencoding::encode(&outcome.owner_id)
    );
    Ok(Redirect::to(&redirect_url))
}
