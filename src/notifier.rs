use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{error::NotifierError, telemetry::alerts::Alert};

/// Outbound dispatcher for threshold-breach alerts. Best-effort, one attempt.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError>;
}

/// Posts alerts as JSON to a configured webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                url: url.into(),
            }),
        })
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError> {
        debug!(
            device_id = %alert.device_id,
            reason = %alert.reason,
            url = %self.inner.url,
            "Posting alert to webhook"
        );

        let status = self
            .inner
            .http
            .post(&self.inner.url)
            .json(alert)
            .send()
            .await?
            .status();

        if !status.is_success() {
            return Err(NotifierError::Rejected(format!("webhook returned {status}")));
        }

        Ok(())
    }
}
