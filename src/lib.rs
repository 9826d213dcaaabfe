//! # PWS Bridge Core Library
//!
//! This library implements a reporting bridge between a Signal K server and
//! PWSWeather.com. It samples a small set of live sensor readings (position,
//! wind, temperature, pressure, humidity) from the Signal K data bus,
//! converts them to the units the PWSWeather API expects, aggregates them
//! over a sampling window, and submits a compact weather report on a fixed
//! interval.
//!
//! ## Data Flow
//!
//! 1. **Bootstrap**: log in, resolve the configured station from the
//!    account's station list, push an initial position update
//! 2. **Sample**: poll the Signal K REST API once a second and fold fresh
//!    readings into the current sample window
//! 3. **Submit**: on the configured interval, snapshot the window (median
//!    wind speed, max gust, latest everything else) and submit it
//! 4. **Recover**: a failed submission re-runs the login step and keeps the
//!    window, so pending samples carry into the next cycle
//!
//! ## Module Map
//!
//! - [`convert`]: pure unit conversions (m/s → mph, K → °F, Pa → inHg, ...)
//! - [`aggregator`]: the bounded in-memory sample window
//! - [`pws`]: request builders for the four PWSWeather operations
//! - [`bus`]: Signal K point-read accessor and status sink
//! - [`bridge`]: instance state, delta routing, and the scheduler loop
//! - [`config`]: TOML configuration

use serde::Deserialize;

pub mod aggregator;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod convert;
pub mod pws;

#[cfg(test)]
mod tests;

/// A geographic position as carried on the Signal K bus.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}
