//! # Bridge Scenario Tests
//!
//! Drives a bridge instance against an in-memory host bus and weather
//! service, covering the bootstrap chain, delta folding, submission
//! success/failure handling, and the position staleness gate.

use crate::bridge::Bridge;
use crate::bus::{BusError, HostBus, PathValue};
use crate::config::StationConfig;
use crate::pws::{PwsError, ReportQuery, Station, WeatherService};
use crate::Position;
use chrono::{DateTime, Duration, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Default)]
struct FakeBus {
    inner: Rc<RefCell<FakeBusState>>,
}

#[derive(Default)]
struct FakeBusState {
    values: HashMap<String, PathValue>,
    statuses: Vec<String>,
}

impl FakeBus {
    fn set(&self, path: &str, value: serde_json::Value, timestamp: DateTime<Utc>) {
        self.inner
            .borrow_mut()
            .values
            .insert(path.to_string(), PathValue { value, timestamp });
    }

    fn last_status(&self) -> Option<String> {
        self.inner.borrow().statuses.last().cloned()
    }
}

impl HostBus for FakeBus {
    async fn read(&self, path: &str) -> Result<Option<PathValue>, BusError> {
        Ok(self.inner.borrow().values.get(path).cloned())
    }

    fn set_status(&self, message: &str) {
        self.inner.borrow_mut().statuses.push(message.to_string());
    }
}

#[derive(Clone, Default)]
struct FakeService {
    inner: Rc<RefCell<FakeServiceState>>,
}

#[derive(Default)]
struct FakeServiceState {
    stations: Vec<Station>,
    accept_reports: bool,
    fail_login: bool,
    login_count: usize,
    submitted: Vec<ReportQuery>,
    position_updates: Vec<(String, Position)>,
}

impl FakeService {
    fn with_station(station: Station) -> Self {
        let service = Self::default();
        service.inner.borrow_mut().stations.push(station);
        service
    }

    fn set_accept_reports(&self, accept: bool) {
        self.inner.borrow_mut().accept_reports = accept;
    }

    fn login_count(&self) -> usize {
        self.inner.borrow().login_count
    }

    fn submitted(&self) -> Vec<ReportQuery> {
        self.inner.borrow().submitted.clone()
    }

    fn position_updates(&self) -> Vec<(String, Position)> {
        self.inner.borrow().position_updates.clone()
    }
}

impl WeatherService for FakeService {
    async fn login(&self, _email: &str, _password: &str) -> Result<String, PwsError> {
        let mut state = self.inner.borrow_mut();
        state.login_count += 1;
        if state.fail_login {
            return Err(PwsError::Auth("invalid credentials".to_string()));
        }
        Ok(format!("token-{}", state.login_count))
    }

    async fn list_stations(&self, _token: &str) -> Result<Vec<Station>, PwsError> {
        Ok(self.inner.borrow().stations.clone())
    }

    async fn update_station_position(
        &self,
        _token: &str,
        station: &Station,
        position: Position,
    ) -> Result<(), PwsError> {
        self.inner
            .borrow_mut()
            .position_updates
            .push((station.id.clone(), position));
        Ok(())
    }

    async fn submit_report(&self, query: &ReportQuery) -> Result<bool, PwsError> {
        let mut state = self.inner.borrow_mut();
        state.submitted.push(query.clone());
        Ok(state.accept_reports)
    }
}

fn test_station() -> Station {
    Station {
        station_id: "KMEPORTL1".to_string(),
        id: "4821".to_string(),
        name: "Casco Bay".to_string(),
        url: "https://example.com/casco".to_string(),
        app_key: "station-key".to_string(),
    }
}

fn test_config() -> StationConfig {
    StationConfig {
        id: "KMEPORTL1".to_string(),
        email: "skipper@example.com".to_string(),
        password: "hunter2".to_string(),
        submit_interval_minutes: 5,
    }
}

fn fresh_position(bus: &FakeBus, now: DateTime<Utc>) {
    bus.set(
        "navigation.position",
        serde_json::json!({"latitude": 43.65, "longitude": -70.25}),
        now,
    );
}

#[tokio::test]
async fn bootstrap_resolves_station_and_pushes_position() {
    let bus = FakeBus::default();
    fresh_position(&bus, Utc::now());
    let service = FakeService::with_station(test_station());
    let mut bridge = Bridge::new(test_config(), bus.clone(), service.clone());

    bridge.bootstrap().await;

    assert_eq!(service.login_count(), 1);
    let station = bridge.station().expect("station should resolve");
    assert_eq!(station.app_key, "station-key");

    let updates = service.position_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "4821");
    assert_eq!(updates[0].1.latitude, 43.65);
}

#[tokio::test]
async fn unmatched_station_leaves_reports_without_key() {
    let mut other = test_station();
    other.station_id = "KSOMEWHERE9".to_string();
    let service = FakeService::with_station(other);
    let bus = FakeBus::default();
    let mut bridge = Bridge::new(test_config(), bus, service.clone());

    bridge.bootstrap().await;
    assert!(bridge.station().is_none());
    assert!(service.position_updates().is_empty());

    // Degraded mode: the report still goes out, with no PASSWORD field.
    bridge.submit_tick().await;
    let submitted = service.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].station_key, None);
    assert_eq!(submitted[0].station_id, "KMEPORTL1");
}

#[tokio::test]
async fn end_to_end_submission_converts_resets_and_reports_status() {
    let now = Utc::now();
    let bus = FakeBus::default();
    fresh_position(&bus, now);
    bus.set(
        "environment.wind.speedOverGround",
        serde_json::json!(10.0),
        now,
    );
    bus.set(
        "environment.outside.temperature",
        serde_json::json!(300.0),
        now,
    );
    let service = FakeService::with_station(test_station());
    service.set_accept_reports(true);
    let mut bridge = Bridge::new(test_config(), bus.clone(), service.clone());

    bridge.bootstrap().await;
    bridge.poll_tick().await;
    bridge.submit_tick().await;

    let submitted = service.submitted();
    assert_eq!(submitted.len(), 1);
    let report = &submitted[0];
    assert_eq!(report.station_key.as_deref(), Some("station-key"));
    assert_eq!(report.windspeedmph, Some(22.37));
    assert_eq!(report.windgustmph, Some(22.37));
    assert_eq!(report.tempf, Some(80.3));
    assert_eq!(report.winddir, None);
    assert_eq!(report.humidity, None);
    assert_eq!(report.baromin, None);

    // Confirmed success records the timestamp and clears the window.
    assert!(bridge.last_success().is_some());
    bridge.status_tick();
    let status = bus.last_status().expect("status should be reported");
    assert!(
        status.contains("seconds ago"),
        "unexpected status: {status}"
    );

    bridge.submit_tick().await;
    let next = &service.submitted()[1];
    assert_eq!(next.windspeedmph, None);
    assert_eq!(next.windgustmph, None);
    assert_eq!(next.tempf, None);
}

#[tokio::test]
async fn rejected_submission_keeps_window_and_relogs() {
    let now = Utc::now();
    let bus = FakeBus::default();
    bus.set(
        "environment.wind.speedOverGround",
        serde_json::json!(10.0),
        now,
    );
    let service = FakeService::with_station(test_station());
    let mut bridge = Bridge::new(test_config(), bus.clone(), service.clone());

    bridge.bootstrap().await;
    bridge.poll_tick().await;

    // Transport succeeded but the body carried no success flag.
    bridge.submit_tick().await;
    assert!(bridge.last_success().is_none());
    assert_eq!(service.login_count(), 2, "failure should re-run login");

    // The pending samples carry into the next cycle.
    service.set_accept_reports(true);
    bridge.submit_tick().await;
    let submitted = service.submitted();
    assert_eq!(submitted[1].windspeedmph, Some(22.37));
    assert!(bridge.last_success().is_some());
}

#[tokio::test]
async fn status_stays_silent_before_first_success() {
    let bus = FakeBus::default();
    let service = FakeService::with_station(test_station());
    let bridge = Bridge::new(test_config(), bus.clone(), service);

    bridge.status_tick();
    assert_eq!(bus.last_status(), None);
}

#[tokio::test]
async fn poll_ignores_readings_whose_timestamp_did_not_advance() {
    let now = Utc::now();
    let bus = FakeBus::default();
    let service = FakeService::with_station(test_station());
    service.set_accept_reports(true);
    let mut bridge = Bridge::new(test_config(), bus.clone(), service.clone());
    bridge.bootstrap().await;

    bus.set(
        "environment.wind.speedOverGround",
        serde_json::json!(10.0),
        now,
    );
    bridge.poll_tick().await;

    // Same host timestamp with a new value is not a new reading.
    bus.set(
        "environment.wind.speedOverGround",
        serde_json::json!(20.0),
        now,
    );
    bridge.poll_tick().await;

    bridge.submit_tick().await;
    let submitted = service.submitted();
    assert_eq!(
        submitted[0].windspeedmph,
        Some(22.37),
        "second reading should have been dropped"
    );
}

#[tokio::test]
async fn stale_position_skips_the_update() {
    let now = Utc::now();
    let bus = FakeBus::default();
    let service = FakeService::with_station(test_station());
    let mut bridge = Bridge::new(test_config(), bus.clone(), service.clone());

    // Bootstrap with no position at all: resolution succeeds, no update.
    bridge.bootstrap().await;
    assert!(bridge.station().is_some());
    assert!(service.position_updates().is_empty());

    // 61 seconds old: treated as absent.
    bus.set(
        "navigation.position",
        serde_json::json!({"latitude": 43.65, "longitude": -70.25}),
        now - Duration::seconds(61),
    );
    bridge.position_tick().await;
    assert!(service.position_updates().is_empty());

    // 59 seconds old: used as-is.
    bus.set(
        "navigation.position",
        serde_json::json!({"latitude": 43.65, "longitude": -70.25}),
        now - Duration::seconds(59),
    );
    bridge.position_tick().await;
    assert_eq!(service.position_updates().len(), 1);
}

#[tokio::test]
async fn failed_login_leaves_bridge_running_degraded() {
    let bus = FakeBus::default();
    let service = FakeService::with_station(test_station());
    service.inner.borrow_mut().fail_login = true;
    let mut bridge = Bridge::new(test_config(), bus, service.clone());

    bridge.bootstrap().await;
    assert!(bridge.station().is_none());

    // Submissions still fire; each failure retries the login.
    bridge.submit_tick().await;
    assert_eq!(service.submitted().len(), 1);
    assert_eq!(service.login_count(), 2);
}

#[tokio::test]
async fn unknown_paths_are_ignored() {
    let bus = FakeBus::default();
    let service = FakeService::with_station(test_station());
    service.set_accept_reports(true);
    let mut bridge = Bridge::new(test_config(), bus, service.clone());

    bridge.handle_delta(&crate::bus::Delta {
        path: "environment.inside.temperature".to_string(),
        value: serde_json::json!(300.0),
        timestamp: Utc::now(),
    });

    bridge.submit_tick().await;
    assert_eq!(service.submitted()[0].tempf, None);
}
