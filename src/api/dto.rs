use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::models::{Metrics, NewReading, Reading},
    error::{FieldError, ValidationError},
};

/// Request body for `POST /api/v1/telemetry`.
///
/// Every field is optional at the serde level so that missing fields are
/// reported together as field errors rather than as a single parse failure.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingRequest {
    #[schema(example = "dev-001")]
    pub device_id: Option<String>,
    #[schema(example = "site-A")]
    pub site_id: Option<String>,
    /// ISO-8601 timestamp. Values without an offset are read as UTC.
    /// Stored with microsecond precision.
    #[schema(example = "2024-01-01T12:00:00Z")]
    pub ts: Option<String>,
    pub metrics: Option<MetricsInput>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MetricsInput {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl TryFrom<CreateReadingRequest> for NewReading {
    type Error = ValidationError;

    fn try_from(req: CreateReadingRequest) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let device_id = required_text(req.device_id, "deviceId", &mut errors);
        let site_id = required_text(req.site_id, "siteId", &mut errors);

        let ts = required_timestamp(req.ts.as_deref(), "ts", &mut errors);

        let (temperature, humidity) = match req.metrics {
            Some(m) => (
                required_number(m.temperature, "metrics.temperature", &mut errors),
                required_number(m.humidity, "metrics.humidity", &mut errors),
            ),
            None => {
                errors.push(FieldError::new("metrics", "is required"));
                (None, None)
            }
        };

        match (device_id, site_id, ts, temperature, humidity) {
            (Some(device_id), Some(site_id), Some(ts), Some(temperature), Some(humidity))
                if errors.is_empty() =>
            {
                let reading = NewReading {
                    device_id,
                    site_id,
                    ts,
                    metrics: Metrics { temperature, humidity },
                };
                reading.validate()?;
                Ok(reading)
            }
            _ => Err(ValidationError::new(errors)),
        }
    }
}

fn required_text(value: Option<String>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        Some(_) => {
            errors.push(FieldError::new(field, "must not be empty"));
            None
        }
        None => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
    }
}

fn required_timestamp(
    value: Option<&str>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<DateTime<Utc>> {
    let Some(raw) = value else {
        errors.push(FieldError::new(field, "is required"));
        return None;
    };
    let ts = parse_timestamp(raw);
    if ts.is_none() {
        errors.push(FieldError::new(field, "must be an ISO-8601 timestamp"));
    }
    ts
}

/// Parses the ISO-8601 forms accepted at the API boundary.
///
/// RFC 3339 first, then extended or basic date-times with an optional offset,
/// then date-times without an offset (UTC), then bare dates (midnight UTC).
/// The result is truncated to microseconds, the store's precision.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y%m%dT%H%M%S%.f%z",
        "%Y%m%dT%H%M%z",
    ];
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y%m%dT%H%M%S%.f",
        "%Y%m%dT%H%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

    let raw = raw.trim();

    let parsed = DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|f| DateTime::parse_from_str(raw, f).ok())
        })
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            // A trailing `Z` is UTC, same as no offset.
            let naive = raw.strip_suffix(|c| c == 'Z' || c == 'z').unwrap_or(raw);
            NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(naive, f).ok())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|f| NaiveDate::parse_from_str(naive, f).ok())
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|ts| ts.and_utc())
        })?;

    Some(parsed.trunc_subsecs(6))
}

fn required_number(value: Option<f64>, field: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(_) => {
            errors.push(FieldError::new(field, "must be a finite number"));
            None
        }
        None => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
    }
}

/// A persisted reading as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    pub id: Uuid,
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    pub metrics: Metrics,
    pub created_at: DateTime<Utc>,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            device_id: r.device_id,
            site_id: r.site_id,
            ts: r.ts,
            metrics: r.metrics,
            created_at: r.created_at,
        }
    }
}

/// Query string for the site summary endpoint. Both bounds are inclusive
/// ISO-8601 timestamps.
#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl SummaryParams {
    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
        let mut errors = Vec::new();
        let from = required_timestamp(self.from.as_deref(), "from", &mut errors);
        let to = required_timestamp(self.to.as_deref(), "to", &mut errors);

        match (from, to) {
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(ValidationError::new(errors)),
        }
    }
}
