use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{FieldError, ValidationError};

/// Numeric metrics carried by every reading. No unit or range enforcement.
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Metrics {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
}

/// A reading that passed boundary validation but has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    pub metrics: Metrics,
}

impl NewReading {
    /// Checks the data-model invariants: non-empty identifiers and finite metrics.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.device_id.trim().is_empty() {
            errors.push(FieldError::new("deviceId", "must not be empty"));
        }
        if self.site_id.trim().is_empty() {
            errors.push(FieldError::new("siteId", "must not be empty"));
        }
        if !self.metrics.temperature.is_finite() {
            errors.push(FieldError::new("metrics.temperature", "must be a finite number"));
        }
        if !self.metrics.humidity.is_finite() {
            errors.push(FieldError::new("metrics.humidity", "must be a finite number"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }
}

/// A persisted reading. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Reading {
    pub id: Uuid,
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    #[sqlx(flatten)]
    pub metrics: Metrics,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics for one site over a time window.
///
/// An empty window yields `count == 0`, `unique_devices == 0` and `None`
/// for every numeric field.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    pub count: i64,
    pub avg_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
    pub unique_devices: i64,
}
