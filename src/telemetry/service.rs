use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, warn};

use super::alerts::{Alert, Thresholds};
use crate::{
    db::{
        models::{NewReading, Reading, SiteSummary},
        store::ReadingStore,
    },
    error::{CacheError, TelemetryError},
    notifier::AlertNotifier,
    reading_cache::{latest_key, LatestCache},
};

/// Ingestion pipeline and query service over the store, cache and notifier.
///
/// Cheap to clone; holds no mutable state of its own.
#[derive(Clone)]
pub struct TelemetryService {
    store: Arc<dyn ReadingStore>,
    cache: Arc<dyn LatestCache>,
    notifier: Arc<dyn AlertNotifier>,
    thresholds: Thresholds,
}

impl TelemetryService {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        cache: Arc<dyn LatestCache>,
        notifier: Arc<dyn AlertNotifier>,
        thresholds: Thresholds,
    ) -> Self {
        Self { store, cache, notifier, thresholds }
    }

    /// Persists `reading`, refreshes the latest-value cache, then evaluates
    /// thresholds and dispatches any alerts.
    ///
    /// Only the store write decides success. Cache and notifier failures are
    /// logged and swallowed. Every alert dispatch has been attempted by the
    /// time this returns.
    pub async fn ingest(&self, reading: NewReading) -> Result<Reading, TelemetryError> {
        reading.validate()?;

        let saved = self.store.insert(&reading).await.map_err(|e| {
            error!(device_id = %reading.device_id, error = %e, "Failed to persist reading");
            e
        })?;

        info!(
            device_id = %saved.device_id,
            site_id = %saved.site_id,
            id = %saved.id,
            "Reading persisted"
        );

        if let Err(e) = self.cache_latest(&saved).await {
            warn!(device_id = %saved.device_id, error = %e, "Failed to update latest-value cache");
        }

        let alerts = self.thresholds.evaluate(&saved);
        if !alerts.is_empty() {
            join_all(alerts.iter().map(|alert| self.dispatch(alert))).await;
        }

        Ok(saved)
    }

    /// Latest reading for `device_id`: cache first, store on miss.
    ///
    /// A store hit repopulates the cache. An unknown device yields `None`.
    pub async fn latest(&self, device_id: &str) -> Result<Option<Reading>, TelemetryError> {
        match self.cached_latest(device_id).await {
            Ok(Some(reading)) => return Ok(Some(reading)),
            Ok(None) => {}
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Latest-value cache read failed; using store");
            }
        }

        let Some(reading) = self.store.latest_for_device(device_id).await? else {
            return Ok(None);
        };

        if let Err(e) = self.cache_latest(&reading).await {
            warn!(device_id = %device_id, error = %e, "Failed to repopulate latest-value cache");
        }

        Ok(Some(reading))
    }

    /// Aggregates a site's readings with `from <= ts <= to`. Never touches
    /// the cache. An inverted range yields the empty summary.
    pub async fn site_summary(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SiteSummary, TelemetryError> {
        Ok(self.store.site_summary(site_id, from, to).await?)
    }

    async fn cached_latest(&self, device_id: &str) -> Result<Option<Reading>, CacheError> {
        match self.cache.get(&latest_key(device_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn cache_latest(&self, reading: &Reading) -> Result<(), CacheError> {
        let raw = serde_json::to_string(reading)?;
        self.cache.set(&latest_key(&reading.device_id), raw).await
    }

    async fn dispatch(&self, alert: &Alert) {
        match self.notifier.notify(alert).await {
            Ok(()) => info!(
                device_id = %alert.device_id,
                reason = %alert.reason,
                value = alert.value,
                "Alert dispatched"
            ),
            Err(e) => error!(
                device_id = %alert.device_id,
                reason = %alert.reason,
                error = %e,
                "Alert failed"
            ),
        }
    }
}
