//! In-memory collaborators for exercising `TelemetryService` and the router
//! without Postgres or a live webhook.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::{
        models::{Metrics, NewReading, Reading, SiteSummary},
        store::ReadingStore,
    },
    error::{CacheError, NotifierError, StoreError},
    notifier::AlertNotifier,
    reading_cache::LatestCache,
    telemetry::alerts::Alert,
};

pub fn new_reading(device_id: &str, site_id: &str, temperature: f64, humidity: f64) -> NewReading {
    NewReading {
        device_id: device_id.to_owned(),
        site_id: site_id.to_owned(),
        ts: Utc::now(),
        metrics: Metrics { temperature, humidity },
    }
}

/// Store that keeps readings in a `Vec` and counts every call.
#[derive(Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<Reading>>,
    accesses: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().unwrap().clone()
    }

    /// Insert without counting as an access, for fixtures.
    pub fn seed(&self, reading: NewReading) -> Reading {
        let saved = persisted(reading);
        self.readings.lock().unwrap().push(saved.clone());
        saved
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".to_owned()));
        }
        Ok(())
    }
}

fn persisted(reading: NewReading) -> Reading {
    Reading {
        id: Uuid::new_v4(),
        device_id: reading.device_id,
        site_id: reading.site_id,
        ts: reading.ts,
        metrics: reading.metrics,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StoreError> {
        self.enter()?;
        let saved = persisted(reading.clone());
        self.readings.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn latest_for_device(&self, device_id: &str) -> Result<Option<Reading>, StoreError> {
        self.enter()?;
        Ok(self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.device_id == device_id)
            .max_by_key(|r| r.ts)
            .cloned())
    }

    async fn site_summary(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SiteSummary, StoreError> {
        self.enter()?;
        let readings = self.readings.lock().unwrap();

        let mut summary = SiteSummary::default();
        let mut temperature_sum = 0.0;
        let mut humidity_sum = 0.0;
        let mut devices = HashSet::new();

        for r in readings
            .iter()
            .filter(|r| r.site_id == site_id && r.ts >= from && r.ts <= to)
        {
            summary.count += 1;
            temperature_sum += r.metrics.temperature;
            humidity_sum += r.metrics.humidity;
            summary.max_temperature = Some(
                summary
                    .max_temperature
                    .map_or(r.metrics.temperature, |m| m.max(r.metrics.temperature)),
            );
            summary.max_humidity = Some(
                summary
                    .max_humidity
                    .map_or(r.metrics.humidity, |m| m.max(r.metrics.humidity)),
            );
            devices.insert(r.device_id.as_str());
        }

        if summary.count > 0 {
            summary.avg_temperature = Some(temperature_sum / summary.count as f64);
            summary.avg_humidity = Some(humidity_sum / summary.count as f64);
        }
        summary.unique_devices = devices.len() as i64;

        Ok(summary)
    }
}

/// Cache whose every call fails.
pub struct FailingCache;

#[async_trait]
impl LatestCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Backend("cache is down".to_owned()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache is down".to_owned()))
    }
}

/// Notifier that records every attempted alert.
#[derive(Default)]
pub struct RecordingNotifier {
    attempts: Mutex<Vec<Alert>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        Arc::new(notifier)
    }

    pub fn attempts(&self) -> Vec<Alert> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError> {
        self.attempts.lock().unwrap().push(alert.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::Rejected("webhook returned 503".to_owned()));
        }
        Ok(())
    }
}
