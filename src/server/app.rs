//! Application router assembly.

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerKernel;
use crate::server::middleware::require_api_key;
use crate::server::routes::{health, oauth, send_email, start_sequence, status, steps, worker};

/// Build the Axum router. Routes split into three auth tiers:
/// - unauthenticated: health, the OAuth callback (its own nonce is the
///   security boundary)
/// - `KAPTIV_API_KEY`-gated: the tenant-facing endpoints and the `/api`
///   CRUD surface
/// - its own secret: the worker tick, checked inside the handler itself
///   because it accepts the secret via either a header or a query param
pub fn build_app(kernel: ServerKernel) -> Router {
    let protected = Router::new()
        .route("/oauth/start", post(oauth::start))
        .route("/status", get(status::status))
        .route("/send_email", post(send_email::send_email))
        .route("/api/steps", post(steps::bulk_create_steps))
        .route("/api/sequence_step_upsert", post(steps::upsert_step))
        .route("/api/start_sequence", post(start_sequence::start))
        .layer(middleware::from_fn_with_state(
            kernel.clone(),
            require_api_key,
        ));

    let unauthenticated = Router::new()
        .route("/health", get(health::health_handler))
        .route("/oauth2/callback", get(oauth::callback))
        .route("/api/run_scheduled_jobs", get(worker::run_scheduled_jobs));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .merge(protected)
        .merge(unauthenticated)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(kernel)
}
