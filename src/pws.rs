//! # PWSWeather Remote Client
//!
//! Stateless request builders for the four PWSWeather operations: login,
//! station list, station position update, and weather report submission.
//!
//! There is no request-level retry. A failed submission is handled by the
//! scheduler, which re-authenticates and tries again on the next interval.
//! The position update is fire-and-forget: the response is logged and never
//! branched on.

use crate::aggregator::Snapshot;
use crate::Position;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const LOGIN_URL: &str = "https://api.pwsweather.com/auth/login/";
const STATION_LIST_URL: &str = "https://api.pwsweather.com/user/stations";
const UPDATE_STATION_URL_BASE: &str = "https://api.pwsweather.com/user/station";
const SUBMIT_URL: &str = "https://pwsupdate.pwsweather.com/api/v1/submitwx";

const SOFTWARE_TYPE: &str = "Signal K PWSWeather Bridge";

/// Errors from the remote weather service.
///
/// Login failures (credentials or transport) are `Auth`; every other remote
/// failure is `Api`. The scheduler logs these and never propagates them out
/// of a timer tick.
#[derive(Error, Debug)]
pub enum PwsError {
    /// Login was rejected or could not be transported.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A non-login request failed (transport error or error status).
    #[error("API request failed: {0}")]
    Api(String),
}

/// Station identity resolved from the station list, immutable once obtained.
#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    /// User-facing station ID, matched against the configured one.
    #[serde(rename = "stationId")]
    pub station_id: String,
    /// Internal API identifier, used in the position-update URL.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Per-station submission key, sent as the report PASSWORD.
    #[serde(rename = "appKey")]
    pub app_key: String,
}

/// The API serves station ids as either a number or a string.
fn id_as_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "station id must be a string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    response: LoginResponse,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct StationListBody {
    response: StationListResponse,
}

#[derive(Debug, Deserialize)]
struct StationListResponse {
    stations: Vec<Station>,
}

/// Submission acknowledgement. A body without a success flag counts as a
/// failed submission even when the transport succeeded.
#[derive(Debug, Deserialize)]
struct SubmitBody {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Serialize)]
struct StationUpdate<'a> {
    name: &'a str,
    url: &'a str,
    #[serde(rename = "pressureType")]
    pressure_type: &'a str,
    location: StationLocation,
}

#[derive(Debug, Serialize)]
struct StationLocation {
    precision: &'static str,
    elev: i32,
    lat: f64,
    long: f64,
}

/// Query string for the report submission endpoint. Readings absent from
/// the current window are omitted from the query entirely.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportQuery {
    #[serde(rename = "ID")]
    pub station_id: String,
    #[serde(rename = "PASSWORD", skip_serializing_if = "Option::is_none")]
    pub station_key: Option<String>,
    pub dateutc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winddir: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windspeedmph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windgustmph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baromin: Option<f64>,
    pub softwaretype: String,
    pub action: String,
}

impl ReportQuery {
    /// Build the outgoing report from a window snapshot.
    ///
    /// `station_key` is `None` while station resolution has not completed;
    /// the request still goes out with the PASSWORD field omitted, matching
    /// the degraded mode described in the scheduler.
    pub fn new(
        station_id: &str,
        station_key: Option<&str>,
        snapshot: &Snapshot,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            station_id: station_id.to_string(),
            station_key: station_key.map(str::to_string),
            dateutc: format_dateutc(timestamp),
            winddir: snapshot.wind_direction_deg,
            windspeedmph: snapshot.wind_speed_mph,
            windgustmph: snapshot.wind_gust_mph,
            tempf: snapshot.temperature_f,
            humidity: snapshot.humidity_pct,
            baromin: snapshot.pressure_inhg,
            softwaretype: SOFTWARE_TYPE.to_string(),
            action: "updateraw".to_string(),
        }
    }
}

/// UTC timestamp for the `dateutc` field, second granularity with the
/// seconds digit pinned to `:01`. The upstream service expects this exact
/// shape; the pinned seconds are a formatting artifact kept for
/// compatibility, not wall-clock seconds.
pub fn format_dateutc(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:01").to_string()
}

/// Remote weather-service operations, as a trait so the scheduler can be
/// exercised against an in-memory fake.
#[allow(async_fn_in_trait)]
pub trait WeatherService {
    /// Exchange credentials for an opaque session token.
    async fn login(&self, email: &str, password: &str) -> Result<String, PwsError>;

    /// Fetch the full station list for the authenticated account.
    async fn list_stations(&self, token: &str) -> Result<Vec<Station>, PwsError>;

    /// Push the station's position. Best effort: the outcome is logged by
    /// the implementation and must not influence scheduler state.
    async fn update_station_position(
        &self,
        token: &str,
        station: &Station,
        position: Position,
    ) -> Result<(), PwsError>;

    /// Submit a weather report. `Ok(true)` only when the transport succeeded
    /// and the body carried `success == true`.
    async fn submit_report(&self, query: &ReportQuery) -> Result<bool, PwsError>;
}

/// HTTP client against the live PWSWeather API.
#[derive(Debug, Clone, Default)]
pub struct PwsClient {
    http: reqwest::Client,
}

impl PwsClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl WeatherService for PwsClient {
    async fn login(&self, email: &str, password: &str) -> Result<String, PwsError> {
        debug!("logging into PWSWeather");
        let resp = self
            .http
            .post(LOGIN_URL)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| PwsError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PwsError::Auth(format!("login status {}", resp.status())));
        }
        let body: LoginBody = resp
            .json()
            .await
            .map_err(|e| PwsError::Auth(format!("malformed login response: {e}")))?;
        debug!("login successful");
        Ok(body.response.token)
    }

    async fn list_stations(&self, token: &str) -> Result<Vec<Station>, PwsError> {
        debug!("fetching station list");
        let resp = self
            .http
            .get(STATION_LIST_URL)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PwsError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PwsError::Api(format!(
                "station list status {}",
                resp.status()
            )));
        }
        let body: StationListBody = resp
            .json()
            .await
            .map_err(|e| PwsError::Api(format!("malformed station list: {e}")))?;
        Ok(body.response.stations)
    }

    async fn update_station_position(
        &self,
        token: &str,
        station: &Station,
        position: Position,
    ) -> Result<(), PwsError> {
        let update = StationUpdate {
            name: &station.name,
            url: &station.url,
            pressure_type: "mslp",
            location: StationLocation {
                precision: "6",
                elev: 1,
                lat: position.latitude,
                long: position.longitude,
            },
        };
        let resp = self
            .http
            .put(format!("{UPDATE_STATION_URL_BASE}/{}", station.id))
            .bearer_auth(token)
            .json(&update)
            .send()
            .await
            .map_err(|e| PwsError::Api(e.to_string()))?;

        // Fire and forget: log whatever came back, do not branch on it.
        let text = resp.text().await.unwrap_or_default();
        debug!("station position update response: {text}");
        Ok(())
    }

    async fn submit_report(&self, query: &ReportQuery) -> Result<bool, PwsError> {
        let resp = self
            .http
            .get(SUBMIT_URL)
            .query(query)
            .send()
            .await
            .map_err(|e| PwsError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PwsError::Api(format!("submit status {}", resp.status())));
        }
        let body: SubmitBody = resp
            .json()
            .await
            .map_err(|e| PwsError::Api(format!("malformed submit response: {e}")))?;
        Ok(body.success)
    }
}
