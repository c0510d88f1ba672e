use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::Reading;

/// Why an alert fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReason {
    HighTemperature,
    HighHumidity,
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertReason::HighTemperature => "HIGH_TEMPERATURE",
            AlertReason::HighHumidity => "HIGH_HUMIDITY",
        };
        f.write_str(s)
    }
}

/// Webhook payload for a single threshold breach. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub device_id: String,
    pub site_id: String,
    pub ts: DateTime<Utc>,
    pub reason: AlertReason,
    pub value: f64,
}

/// Upper limits; a metric strictly above its limit raises an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temperature_max: f64,
    pub humidity_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_max: 50.0,
            humidity_max: 90.0,
        }
    }
}

impl Thresholds {
    /// Rules are independent: a reading yields zero, one or two alerts.
    pub fn evaluate(&self, reading: &Reading) -> Vec<Alert> {
        let rules = [
            (
                AlertReason::HighTemperature,
                reading.metrics.temperature,
                self.temperature_max,
            ),
            (
                AlertReason::HighHumidity,
                reading.metrics.humidity,
                self.humidity_max,
            ),
        ];

        rules
            .into_iter()
            .filter(|(_, value, limit)| value > limit)
            .map(|(reason, value, _)| Alert {
                device_id: reading.device_id.clone(),
                site_id: reading.site_id.clone(),
                ts: reading.ts,
                reason,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::db::models::Metrics;

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            device_id: "dev-001".to_owned(),
            site_id: "site-A".to_owned(),
            ts: Utc::now(),
            metrics: Metrics { temperature, humidity },
            created_at: Utc::now(),
        }
    }

    fn reasons(alerts: &[Alert]) -> Vec<AlertReason> {
        alerts.iter().map(|a| a.reason).collect()
    }

    #[test]
    fn normal_reading_raises_nothing() {
        assert!(Thresholds::default().evaluate(&reading(25.0, 50.0)).is_empty());
    }

    #[test]
    fn limits_are_exclusive() {
        assert!(Thresholds::default().evaluate(&reading(50.0, 90.0)).is_empty());
    }

    #[test]
    fn high_temperature_alone() {
        let alerts = Thresholds::default().evaluate(&reading(100.0, 40.0));
        assert_eq!(reasons(&alerts), vec![AlertReason::HighTemperature]);
        assert_eq!(alerts[0].value, 100.0);
    }

    #[test]
    fn high_humidity_alone() {
        let alerts = Thresholds::default().evaluate(&reading(30.0, 95.0));
        assert_eq!(reasons(&alerts), vec![AlertReason::HighHumidity]);
        assert_eq!(alerts[0].value, 95.0);
    }

    #[test]
    fn both_rules_fire_independently() {
        let alerts = Thresholds::default().evaluate(&reading(60.0, 95.0));
        assert_eq!(
            reasons(&alerts),
            vec![AlertReason::HighTemperature, AlertReason::HighHumidity]
        );
    }

    #[test]
    fn custom_limits_are_honoured() {
        let thresholds = Thresholds {
            temperature_max: 20.0,
            humidity_max: 100.0,
        };
        let alerts = thresholds.evaluate(&reading(25.0, 95.0));
        assert_eq!(reasons(&alerts), vec![AlertReason::HighTemperature]);
    }

    #[test]
    fn alert_payload_shape() {
        let alert = &Thresholds::default().evaluate(&reading(60.0, 40.0))[0];
        let json = serde_json::to_value(alert).unwrap();
        assert_eq!(json["deviceId"], "dev-001");
        assert_eq!(json["siteId"], "site-A");
        assert_eq!(json["reason"], "HIGH_TEMPERATURE");
        assert_eq!(json["value"], 60.0);
        assert!(json["ts"].is_string());
    }
}
