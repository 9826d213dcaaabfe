//! # Sample Window Aggregation
//!
//! In-memory accumulation of sensor readings between two successful
//! submissions. Wind speed is the only field with history: every reading is
//! appended and the report carries the window median, with a running maximum
//! kept as the gust. Everything else is latest-value-wins.
//!
//! The window is cleared wholesale after a confirmed submission. That clear
//! includes wind direction, so the next report only carries a direction if a
//! fresh delta arrives before the next submission fires. This mirrors the
//! reference plugin; it is deliberate, not an oversight.

use crate::Position;

/// Aggregated values read at submission time. Fields never recorded during
/// the current window are `None` and are omitted from the outgoing report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub wind_direction_deg: Option<i64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub temperature_f: Option<f64>,
    pub humidity_pct: Option<i64>,
    pub pressure_inhg: Option<f64>,
}

/// Mutable sample window owned by a single bridge instance.
///
/// Water temperature is collected and cleared like the other fields but is
/// not part of the snapshot; the upstream API has no field for it.
#[derive(Debug, Default)]
pub struct SampleWindow {
    position: Option<Position>,
    wind_speed_mph: Vec<f64>,
    wind_gust_mph: Option<f64>,
    wind_direction_deg: Option<i64>,
    water_temperature_f: Option<f64>,
    temperature_f: Option<f64>,
    pressure_inhg: Option<f64>,
    humidity_pct: Option<i64>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the latest known position.
    pub fn record_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    /// Append a wind-speed sample and raise the gust if this one exceeds it.
    pub fn record_wind_speed(&mut self, mph: f64) {
        match self.wind_gust_mph {
            Some(gust) if mph <= gust => {}
            _ => self.wind_gust_mph = Some(mph),
        }
        self.wind_speed_mph.push(mph);
    }

    pub fn record_wind_direction(&mut self, degrees: i64) {
        self.wind_direction_deg = Some(degrees);
    }

    pub fn record_temperature(&mut self, fahrenheit: f64) {
        self.temperature_f = Some(fahrenheit);
    }

    pub fn record_water_temperature(&mut self, fahrenheit: f64) {
        self.water_temperature_f = Some(fahrenheit);
    }

    pub fn record_pressure(&mut self, inhg: f64) {
        self.pressure_inhg = Some(inhg);
    }

    pub fn record_humidity(&mut self, percent: i64) {
        self.humidity_pct = Some(percent);
    }

    /// Current aggregate values. Wind speed is the median of every sample in
    /// the window; with no samples it is `None` and submission proceeds
    /// without it.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            wind_direction_deg: self.wind_direction_deg,
            wind_speed_mph: median(&self.wind_speed_mph),
            wind_gust_mph: self.wind_gust_mph,
            temperature_f: self.temperature_f,
            humidity_pct: self.humidity_pct,
            pressure_inhg: self.pressure_inhg,
        }
    }

    /// Clear the window after a confirmed submission. Clears every field,
    /// wind direction included (see module docs).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Median of an unsorted sequence: middle element for odd length, mean of
/// the two middle elements for even length, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}
