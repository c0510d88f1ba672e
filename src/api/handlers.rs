use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{CreateReadingRequest, MetricsInput, ReadingDto, SummaryParams},
    errors::AppError,
    AppState,
};
use crate::{
    db::models::{Metrics, NewReading, SiteSummary},
    error::{FieldError, ValidationError},
};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Ingest one telemetry reading.
///
/// Persists the reading, refreshes the device's latest value and dispatches
/// threshold alerts. When an ingest token is configured the request must carry
/// `Authorization: Bearer <token>`.
#[utoipa::path(
    post,
    path = "/api/v1/telemetry",
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading stored", body = ReadingDto),
        (status = 400, description = "Invalid reading"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "telemetry"
)]
pub async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReadingDto>), AppError> {
    authorize(&headers, state.ingest_token.as_deref())?;

    let Json(req) =
        body.map_err(|e| ValidationError::single("body", e.body_text()))?;
    let reading = NewReading::try_from(req)?;

    let saved = state.service.ingest(reading).await?;
    Ok((StatusCode::CREATED, Json(saved.into())))
}

/// Fetch the latest reading for a device, or `null` if it has never reported.
#[utoipa::path(
    get,
    path = "/api/v1/devices/{device_id}/latest",
    params(
        ("device_id" = String, Path, description = "Device ID"),
    ),
    responses(
        (status = 200, description = "Latest reading, or null", body = ReadingDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "telemetry"
)]
pub async fn get_device_latest(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Option<ReadingDto>>, AppError> {
    let reading = state.service.latest(&device_id).await?;
    Ok(Json(reading.map(Into::into)))
}

/// Aggregate a site's readings over `[from, to]` (ISO-8601, inclusive).
#[utoipa::path(
    get,
    path = "/api/v1/sites/{site_id}/summary",
    params(
        ("site_id" = String, Path, description = "Site ID"),
        ("from" = String, Query, description = "Start of window (ISO-8601, inclusive)"),
        ("to"   = String, Query, description = "End of window (ISO-8601, inclusive)"),
    ),
    responses(
        (status = 200, description = "Site summary", body = SiteSummary),
        (status = 400, description = "Missing or invalid time range"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "telemetry"
)]
pub async fn get_site_summary(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    params: Result<Query<SummaryParams>, QueryRejection>,
) -> Result<Json<SiteSummary>, AppError> {
    let Query(params) = params.map_err(|e| ValidationError::single("query", e.body_text()))?;
    let (from, to) = params.window()?;
    let summary = state.service.site_summary(&site_id, from, to).await?;
    Ok(Json(summary))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Checks `Authorization: Bearer <token>` against `expected`, if configured.
/// The scheme name is case-insensitive.
fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim());

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(create_reading, get_device_latest, get_site_summary, health),
    components(schemas(
        CreateReadingRequest,
        MetricsInput,
        ReadingDto,
        Metrics,
        SiteSummary,
        FieldError
    )),
    tags(
        (name = "telemetry", description = "Telemetry ingestion and queries"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Telemetry Service API",
        version = "0.1.0",
        description = "Ingests sensor readings, raises threshold alerts and serves latest values and site summaries"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
