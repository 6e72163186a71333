//! Unit conversions backing the virtual fields of a record.
//!
//! Every function is pure and total over `f64`. Nothing here rounds; rounding
//! happens only when values are written out for presentation.

/// Miles per hour in one kilometre per hour.
pub const MPH_PER_KPH: f64 = 0.621_371_192_2;

/// Inches of mercury in one millibar.
pub const INHG_PER_MBAR: f64 = 0.029_529_983_071_4;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn kph_to_mph(kph: f64) -> f64 {
    kph * MPH_PER_KPH
}

pub fn mph_to_kph(mph: f64) -> f64 {
    mph / MPH_PER_KPH
}

pub fn mbar_to_inhg(mbar: f64) -> f64 {
    mbar * INHG_PER_MBAR
}

pub fn inhg_to_mbar(inhg: f64) -> f64 {
    inhg / INHG_PER_MBAR
}
