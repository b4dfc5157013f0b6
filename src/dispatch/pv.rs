//! PV production shape.
//!
//! A [`PvShape`] is a normalized hourly yield profile: 8760 fractions summing
//! to 1.0. Production for an hour is `nameplate_kw * effective_yield *
//! fraction`, which keeps annual production exactly `nameplate * yield` by
//! construction and makes production strictly linear in nameplate size.

use std::f64::consts::PI;

use crate::error::AnalysisError;
use crate::profile::HOURS_PER_YEAR;

/// Hour at which the diurnal curve peaks (solar noon, civil time).
const SOLAR_NOON_HR: f64 = 12.5;
/// Day-of-year of the summer solstice.
const SOLSTICE_DAY: f64 = 172.0;

/// Normalized hourly yield fractions for the representative year.
#[derive(Debug, Clone, PartialEq)]
pub struct PvShape {
    fractions: Vec<f64>,
}

impl PvShape {
    /// Builds the built-in representative shape: a half-sine diurnal curve
    /// whose daylight window and amplitude both swing with the season
    /// (northern hemisphere, long summer days).
    pub fn representative() -> Self {
        let mut fractions = Vec::with_capacity(HOURS_PER_YEAR);
        for day in 0..365usize {
            let season = (2.0 * PI * (day as f64 - SOLSTICE_DAY) / 365.0).cos();
            let day_len = 12.0 + 3.5 * season;
            let amplitude = 1.0 + 0.35 * season;
            let sunrise = SOLAR_NOON_HR - day_len / 2.0;
            let sunset = SOLAR_NOON_HR + day_len / 2.0;
            for hour in 0..24usize {
                let mid = hour as f64 + 0.5;
                let frac = if mid > sunrise && mid < sunset {
                    amplitude * (PI * (mid - sunrise) / day_len).sin()
                } else {
                    0.0
                };
                fractions.push(frac);
            }
        }
        Self::normalized(fractions)
    }

    /// Builds a shape from caller-supplied hourly fractions (e.g. a measured
    /// irradiance profile).
    ///
    /// Negative entries are clamped to zero with a warning; the result is
    /// re-normalized to sum to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] if the length is not 8760 or
    /// the fractions sum to zero.
    pub fn from_fractions(fractions: Vec<f64>) -> Result<Self, AnalysisError> {
        if fractions.len() != HOURS_PER_YEAR {
            return Err(AnalysisError::invalid_input(
                "pv_shape",
                format!("expected {HOURS_PER_YEAR} fractions, got {}", fractions.len()),
            ));
        }
        let negatives = fractions.iter().filter(|&&f| f < 0.0).count();
        if negatives > 0 {
            log::warn!("clamped {negatives} negative PV shape fraction(s) to zero");
        }
        let cleaned: Vec<f64> = fractions.into_iter().map(|f| f.max(0.0)).collect();
        if cleaned.iter().sum::<f64>() <= 0.0 {
            return Err(AnalysisError::invalid_input(
                "pv_shape",
                "fractions sum to zero",
            ));
        }
        Ok(Self::normalized(cleaned))
    }

    fn normalized(fractions: Vec<f64>) -> Self {
        let sum: f64 = fractions.iter().sum();
        Self {
            fractions: fractions.into_iter().map(|f| f / sum).collect(),
        }
    }

    /// Yield fraction for an hour-of-year index.
    pub fn fraction(&self, hour: usize) -> f64 {
        self.fractions[hour]
    }

    /// Hourly production (kWh) for a system of `pv_kw` nameplate at the given
    /// effective annual yield (kWh per kWp).
    pub fn production(&self, pv_kw: f64, effective_yield_kwh_per_kwp: f64) -> Vec<f64> {
        let annual = pv_kw * effective_yield_kwh_per_kwp;
        self.fractions.iter().map(|f| f * annual).collect()
    }
}
