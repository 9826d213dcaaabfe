//! # Host Data Bus
//!
//! Access to the Signal K server the bridge runs alongside. The bus offers a
//! point-read accessor (current value plus host timestamp for a named path)
//! and a status sink for human-readable health lines. Subscription is
//! realized by the scheduler polling the same accessor once a second and
//! forwarding a delta whenever a path's timestamp advances.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected host response for {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// A current value and the host-supplied timestamp it was produced at.
#[derive(Debug, Clone, Deserialize)]
pub struct PathValue {
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PathValue {
    /// Age-based validity gate. A reading is usable only while its host
    /// timestamp is at most `max_age` old.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.timestamp <= max_age
    }
}

/// A single path/value/timestamp update delivered to the delta handler.
#[derive(Debug, Clone)]
pub struct Delta {
    pub path: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Host-bus operations, as a trait so the bridge can be driven by an
/// in-memory bus in tests.
#[allow(async_fn_in_trait)]
pub trait HostBus {
    /// Fetch the current value and timestamp for a named path, `None` when
    /// the host has never seen the path.
    async fn read(&self, path: &str) -> Result<Option<PathValue>, BusError>;

    /// Report a human-readable health line.
    fn set_status(&self, message: &str);
}

/// Signal K REST implementation of the host bus.
///
/// Paths use the dotted Signal K notation (`navigation.position`) and map
/// onto `/signalk/v1/api/vessels/self/navigation/position`.
#[derive(Debug, Clone)]
pub struct SignalKBus {
    http: reqwest::Client,
    base_url: String,
}

impl SignalKBus {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/signalk/v1/api/vessels/self/{}",
            self.base_url,
            path.replace('.', "/")
        )
    }
}

impl HostBus for SignalKBus {
    async fn read(&self, path: &str) -> Result<Option<PathValue>, BusError> {
        let resp = self.http.get(self.url_for(path)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(BusError::Decode {
                path: path.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }
        let value: PathValue = resp.json().await.map_err(|e| BusError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    fn set_status(&self, message: &str) {
        info!("{message}");
    }
}
