pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::telemetry::TelemetryService;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: TelemetryService,
    /// Bearer token required on ingest. `None` disables the check.
    pub ingest_token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/v1/telemetry", post(handlers::create_reading))
        .route(
            "/api/v1/devices/{device_id}/latest",
            get(handlers::get_device_latest),
        )
        .route(
            "/api/v1/sites/{site_id}/summary",
            get(handlers::get_site_summary),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
