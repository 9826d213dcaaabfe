//! # Bridge Instance and Scheduler
//!
//! The [`Bridge`] struct owns every piece of mutable state for one bridge
//! instance: session token, resolved station identity, the sample window,
//! and the last-success timestamp. Nothing is global, so independent
//! instances can coexist and tests construct isolated ones.
//!
//! ## Task model
//!
//! All periodic work runs in a single cooperative `select!` loop over
//! `tokio::time` intervals: a 1 s host poll that feeds the delta handler, a
//! 60 s status report, a 90 min station-position update, and the
//! user-configured submission task. One tick body runs at a time and awaits
//! its remote calls inline, so a submission can never observe a token that a
//! concurrent re-login is halfway through replacing.
//!
//! ## Failure policy
//!
//! No tick ever propagates an error. Remote failures are logged; a failed
//! submission additionally re-runs the login step (only the login; station
//! identity is resolved once and kept) and leaves the window intact so the
//! pending samples carry into the next cycle.

use crate::aggregator::SampleWindow;
use crate::bus::{Delta, HostBus};
use crate::config::StationConfig;
use crate::convert;
use crate::pws::{ReportQuery, Station, WeatherService};
use crate::Position;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use std::collections::HashMap;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// How often the host bus is polled for fresh deltas.
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
/// How often the human-readable status line is refreshed.
const STATUS_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);
/// How often the station position is pushed upstream.
const UPDATE_POSITION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(90 * 60);
/// Maximum age for a point-read position to count as current.
const POSITION_MAX_AGE_SECONDS: i64 = 60;

/// The fixed set of Signal K paths the bridge watches.
pub const SUBSCRIBED_PATHS: [&str; 7] = [
    "navigation.position",
    "environment.wind.directionGround",
    "environment.wind.speedOverGround",
    "environment.water.temperature",
    "environment.outside.temperature",
    "environment.outside.pressure",
    "environment.outside.humidity",
];

/// A single bridge instance: all state plus the bus and service handles.
pub struct Bridge<B, W> {
    config: StationConfig,
    bus: B,
    service: W,
    token: Option<String>,
    station: Option<Station>,
    window: SampleWindow,
    last_success: Option<DateTime<Utc>>,
    /// Host timestamp of the last delta folded in, per path. A poll tick
    /// only forwards a reading when this advances, which turns the 1 s poll
    /// into the push subscription the host side describes.
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl<B: HostBus, W: WeatherService> Bridge<B, W> {
    pub fn new(config: StationConfig, bus: B, service: W) -> Self {
        Self {
            config,
            bus,
            service,
            token: None,
            station: None,
            window: SampleWindow::new(),
            last_success: None,
            last_seen: HashMap::new(),
        }
    }

    /// Resolved station identity, if bootstrap found a match.
    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    /// Timestamp of the last confirmed submission.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Run the bridge until the surrounding task is dropped.
    ///
    /// Bootstraps once, then services the four periodic tasks. Intervals
    /// fire first after one full period, and the position task stays dormant
    /// until the station identity is resolved.
    pub async fn run(mut self) {
        self.bootstrap().await;
        self.bus.set_status(&format!(
            "Submitting weather report every {} minutes",
            self.config.submit_interval_minutes
        ));
        debug!(
            "starting submission task every {} minutes",
            self.config.submit_interval_minutes
        );

        let submit_period = std::time::Duration::from_secs(self.config.submit_interval_minutes * 60);
        let mut poll = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status = interval_at(Instant::now() + STATUS_INTERVAL, STATUS_INTERVAL);
        let mut position = interval_at(
            Instant::now() + UPDATE_POSITION_INTERVAL,
            UPDATE_POSITION_INTERVAL,
        );
        let mut submit = interval_at(Instant::now() + submit_period, submit_period);

        loop {
            tokio::select! {
                _ = poll.tick() => self.poll_tick().await,
                _ = status.tick() => self.status_tick(),
                _ = position.tick(), if self.station.is_some() => self.position_tick().await,
                _ = submit.tick() => self.submit_tick().await,
            }
        }
    }

    /// One-shot startup chain: login, resolve the configured station from
    /// the account's station list, push an initial position update.
    ///
    /// Every failure leaves the bridge in a degraded but running state: with
    /// no token the first submission fails and re-logs-in, and with no
    /// resolved station reports go out without a station key.
    pub async fn bootstrap(&mut self) {
        if !self.login().await {
            return;
        }
        let token = self.token.clone().unwrap_or_default();
        let stations = match self.service.list_stations(&token).await {
            Ok(stations) => stations,
            Err(e) => {
                error!("station list retrieve error: {e}");
                return;
            }
        };
        // Exact match on the configured station ID, first match wins.
        match stations
            .into_iter()
            .find(|s| s.station_id == self.config.id)
        {
            Some(station) => {
                debug!("station details obtained for {}", station.station_id);
                self.station = Some(station);
                self.position_tick().await;
            }
            None => error!("could not obtain station details for {}", self.config.id),
        }
    }

    /// Login step shared by bootstrap and the post-failure re-login. Returns
    /// whether a token is now held; failure only logs.
    async fn login(&mut self) -> bool {
        match self
            .service
            .login(&self.config.email, &self.config.password)
            .await
        {
            Ok(token) => {
                self.token = Some(token);
                true
            }
            Err(e) => {
                error!("login error: {e}");
                false
            }
        }
    }

    /// Poll every subscribed path and fold readings whose host timestamp
    /// advanced since the last tick into the sample window.
    pub async fn poll_tick(&mut self) {
        for path in SUBSCRIBED_PATHS {
            let reading = match self.bus.read(path).await {
                Ok(Some(reading)) => reading,
                Ok(None) => continue,
                Err(e) => {
                    debug!("host read failed for {path}: {e}");
                    continue;
                }
            };
            if self
                .last_seen
                .get(path)
                .is_some_and(|seen| *seen >= reading.timestamp)
            {
                continue;
            }
            self.last_seen.insert(path.to_string(), reading.timestamp);
            self.handle_delta(&Delta {
                path: path.to_string(),
                value: reading.value,
                timestamp: reading.timestamp,
            });
        }
    }

    /// Route one delta to the matching window mutator, converting units on
    /// the way in. Unknown paths and non-numeric values are ignored.
    pub fn handle_delta(&mut self, delta: &Delta) {
        match delta.path.as_str() {
            "navigation.position" => {
                if let Some(position) = position_from_value(&delta.value) {
                    self.window.record_position(position);
                }
            }
            "environment.wind.speedOverGround" => {
                if let Some(ms) = delta.value.as_f64() {
                    let mph = convert::round_to(convert::ms_to_mph(ms), 2);
                    self.window.record_wind_speed(mph);
                }
            }
            "environment.wind.directionGround" => {
                if let Some(rad) = delta.value.as_f64() {
                    self.window
                        .record_wind_direction(convert::radians_to_degrees(rad));
                }
            }
            "environment.water.temperature" => {
                if let Some(k) = delta.value.as_f64() {
                    self.window
                        .record_water_temperature(convert::kelvin_to_fahrenheit(k));
                }
            }
            "environment.outside.temperature" => {
                if let Some(k) = delta.value.as_f64() {
                    self.window
                        .record_temperature(convert::kelvin_to_fahrenheit(k));
                }
            }
            "environment.outside.pressure" => {
                if let Some(pa) = delta.value.as_f64() {
                    self.window.record_pressure(convert::pascal_to_inhg(pa));
                }
            }
            "environment.outside.humidity" => {
                if let Some(frac) = delta.value.as_f64() {
                    self.window
                        .record_humidity(convert::fraction_to_percent(frac));
                }
            }
            other => debug!("unknown path: {other}"),
        }
    }

    /// Report elapsed time since the last confirmed submission. Silent until
    /// the first success.
    pub fn status_tick(&self) {
        let Some(last) = self.last_success else {
            return;
        };
        let since = time_since(last, Utc::now());
        self.bus
            .set_status(&format!("Last successful submission was {since} ago"));
    }

    /// Push the current position to the station record upstream. Skipped
    /// when the point-read position is missing or older than 60 s; the
    /// remote outcome is logged and otherwise ignored.
    pub async fn position_tick(&mut self) {
        let (Some(token), Some(station)) = (self.token.as_deref(), self.station.as_ref()) else {
            return;
        };
        debug!("updating station position");
        let position = match self.read_current_position().await {
            Some(position) => position,
            None => {
                debug!("no current position, update skipped");
                return;
            }
        };
        if let Err(e) = self
            .service
            .update_station_position(token, station, position)
            .await
        {
            debug!("station position update failed: {e}");
        }
    }

    /// Staleness-checked point read of the vessel position.
    async fn read_current_position(&self) -> Option<Position> {
        let reading = match self.bus.read("navigation.position").await {
            Ok(reading) => reading?,
            Err(e) => {
                debug!("position read failed: {e}");
                return None;
            }
        };
        if !reading.is_fresh(Duration::seconds(POSITION_MAX_AGE_SECONDS), Utc::now()) {
            return None;
        }
        position_from_value(&reading.value)
    }

    /// Build and submit a report from the current window. On confirmed
    /// success the window resets and the success timestamp is recorded; any
    /// other outcome keeps the window and re-runs the login step.
    pub async fn submit_tick(&mut self) {
        let query = ReportQuery::new(
            &self.config.id,
            self.station.as_ref().map(|s| s.app_key.as_str()),
            &self.window.snapshot(),
            Utc::now(),
        );
        debug!("submitting data: {query:?}");
        match self.service.submit_report(&query).await {
            Ok(true) => {
                debug!("weather report successfully submitted");
                self.last_success = Some(Utc::now());
                self.window.reset();
            }
            Ok(false) => {
                error!("weather service rejected the report, logging in again");
                self.login().await;
            }
            Err(e) => {
                error!("error submitting weather report: {e}, logging in again");
                self.login().await;
            }
        }
    }
}

/// Extract a position from a Signal K position value.
fn position_from_value(value: &serde_json::Value) -> Option<Position> {
    Some(Position {
        latitude: value.get("latitude")?.as_f64()?,
        longitude: value.get("longitude")?.as_f64()?,
    })
}

/// Human-readable elapsed time, coarsest unit only: "3 days", "1 hour",
/// "45 seconds".
pub fn time_since(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - from).num_seconds().max(0);
    if seconds > 31_536_000 {
        format!("{} years", seconds / 31_536_000)
    } else if seconds > 2_592_000 {
        format!("{} months", seconds / 2_592_000)
    } else if seconds > 86_400 {
        format!("{} days", seconds / 86_400)
    } else if seconds > 3_600 {
        let hours = seconds / 3_600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else if seconds > 60 {
        let minutes = seconds / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else {
        format!("{seconds} seconds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_since_picks_coarsest_unit() {
        let now = Utc::now();
        let cases = [
            (45, "45 seconds"),
            (60, "60 seconds"),
            (61, "1 minute"),
            (300, "5 minutes"),
            (3_601, "1 hour"),
            (7_199, "1 hour"),
            (7_200, "2 hours"),
            (172_801, "2 days"),
            (5_184_001, "2 months"),
            (63_072_001, "2 years"),
        ];
        for (secs, expected) in cases {
            assert_eq!(
                time_since(now - Duration::seconds(secs), now),
                expected,
                "for {secs} seconds"
            );
        }
    }

    #[test]
    fn position_value_requires_both_coordinates() {
        let full = serde_json::json!({"latitude": 43.65, "longitude": -70.25});
        assert_eq!(
            position_from_value(&full),
            Some(Position {
                latitude: 43.65,
                longitude: -70.25
            })
        );

        let partial = serde_json::json!({"latitude": 43.65});
        assert_eq!(position_from_value(&partial), None);
        assert_eq!(position_from_value(&serde_json::Value::Null), None);
    }
}
