//! # Sensor Unit Conversion
//!
//! Pure conversion functions from the SI units carried on the Signal K bus
//! (m/s, radians, kelvin, pascals, fractional humidity) to the units the
//! PWSWeather API expects (mph, degrees, fahrenheit, inches of mercury,
//! percent).
//!
//! All rounding is half-away-from-zero (`f64::round`), matching the
//! reference outputs: 300 K rounds to 80.3 °F, 101325 Pa to 29.9 inHg.

/// Meters per second to miles per hour.
pub fn ms_to_mph(ms: f64) -> f64 {
    ms * 2.237
}

/// Radians to whole degrees.
pub fn radians_to_degrees(rad: f64) -> i64 {
    (rad * 57.2958).round() as i64
}

/// Kelvin to fahrenheit, one decimal place.
pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    round_to((k - 273.15) * 9.0 / 5.0 + 32.0, 1)
}

/// Pascals to inches of mercury, one decimal place.
pub fn pascal_to_inhg(pa: f64) -> f64 {
    round_to(pa / 3386.388, 1)
}

/// Fractional humidity (0.0 to 1.0) to whole percent.
pub fn fraction_to_percent(frac: f64) -> i64 {
    (frac * 100.0).round() as i64
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
