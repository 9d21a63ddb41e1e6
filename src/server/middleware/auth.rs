//! API-key auth middleware: protects every route except the OAuth callback
//! and the worker route, which carry their own secrets (see
//! `server::routes::worker`).
//!
//! Accepts either `Authorization: Bearer <KAPTIV_API_KEY>` or a bare
//! `kaptiv_api_key` header, matching the two forms the HTTP surface
//! documents across different routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::common::constant_time_eq;
use crate::kernel::{AppError, ServerKernel};

pub async fn require_api_key(
    State(kernel): State<ServerKernel>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = bearer_token(&request).or_else(|| header_value(&request, "kaptiv_api_key"));

    match presented {
        Some(token) if constant_time_eq(&token, &kernel.config.kaptiv_api_key) => {
            Ok(next.run(request).await)
        }
        _ => Err(AppError::Auth),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
