//! Hourly profile builder.
//!
//! Normalizes raw interval meter readings into one canonical representative
//! year: exactly [`HOURS_PER_YEAR`] slots, each with a consumption (kWh) and a
//! demand (kW) value. Readings are expected to cover a single representative
//! year; the calendar year component of a timestamp is ignored when mapping
//! to a slot.
//!
//! The representative year is non-leap. Feb 29 readings fold into Feb 28's
//! slots; a leap day adds nothing to a representative year.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::ProfileAssumptions;
use crate::error::AnalysisError;

/// Slots in the canonical representative year.
pub const HOURS_PER_YEAR: usize = 8760;

/// Days in each month of the representative (non-leap) year.
const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Reading interval length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    QuarterHour,
}

/// One raw interval reading from the utility meter.
///
/// Immutable input. Either metric may be absent: demand meters and energy
/// meters are often separate channels on the same service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Interval start.
    pub timestamp: NaiveDateTime,
    /// Energy delivered during the interval (kWh).
    pub energy_kwh: Option<f64>,
    /// Average or registered demand during the interval (kW).
    pub demand_kw: Option<f64>,
    /// Interval length tag.
    pub granularity: Granularity,
}

impl MeterReading {
    /// Convenience constructor for an hourly energy+demand reading.
    pub fn hourly(timestamp: NaiveDateTime, energy_kwh: f64, demand_kw: f64) -> Self {
        Self {
            timestamp,
            energy_kwh: Some(energy_kwh),
            demand_kw: Some(demand_kw),
            granularity: Granularity::Hourly,
        }
    }
}

/// Canonical hourly profile for the representative year.
///
/// Derived data: recomputed end-to-end whenever source readings or
/// interpolation rules change, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyProfile {
    /// Consumption per slot (kWh), indexed by hour-of-year.
    pub consumption_kwh: Vec<f64>,
    /// Demand per slot (kW), indexed by hour-of-year.
    pub demand_kw: Vec<f64>,
    /// 1-based indices of months synthesized entirely from neighbors.
    /// Empty when all twelve months had real readings.
    pub interpolated_months: Vec<u32>,
    /// Distinct calendar days that had at least one real reading.
    pub coverage_days: usize,
}

impl HourlyProfile {
    /// Total consumption over the representative year (kWh).
    pub fn annual_consumption_kwh(&self) -> f64 {
        self.consumption_kwh.iter().sum()
    }

    /// Peak demand over the representative year (kW).
    pub fn peak_demand_kw(&self) -> f64 {
        self.demand_kw.iter().cloned().fold(0.0, f64::max)
    }

    /// Whether the given 1-based month was synthesized from neighbors.
    pub fn is_interpolated(&self, month: u32) -> bool {
        self.interpolated_months.contains(&month)
    }
}

/// Maps a timestamp to its hour-of-year slot in the representative year.
///
/// Ignores the year; folds Feb 29 into Feb 28.
fn slot_index(ts: &NaiveDateTime) -> usize {
    let month = ts.month();
    let day = if month == 2 && ts.day() == 29 {
        28
    } else {
        ts.day()
    };
    let days_before: u32 = MONTH_DAYS[..(month as usize - 1)].iter().sum();
    ((days_before + day - 1) * 24 + ts.hour()) as usize
}

/// First slot index of a 1-based month.
fn month_start_slot(month: u32) -> usize {
    let days_before: u32 = MONTH_DAYS[..(month as usize - 1)].iter().sum();
    (days_before * 24) as usize
}

/// Per-slot accumulation state before gap filling.
#[derive(Debug, Clone, Copy, Default)]
struct SlotAccum {
    energy_sum: f64,
    has_energy: bool,
    demand_max: f64,
    has_demand: bool,
}

/// Builds the canonical profile from raw readings.
///
/// Aggregation semantics per clock-hour: energy values are **summed** (four
/// quarter-hour intervals, or split meter channels, add up), demand values
/// take the **max** (the within-hour peak is what demand charges bill).
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientData`] when fewer than
/// `assumptions.min_coverage_days` distinct days carry real readings, and
/// [`AnalysisError::InvalidInput`] when no reading carries any metric at all.
pub fn build_profile(
    readings: &[MeterReading],
    assumptions: &ProfileAssumptions,
) -> Result<HourlyProfile, AnalysisError> {
    let mut slots = vec![SlotAccum::default(); HOURS_PER_YEAR];
    let mut covered_days: BTreeSet<(u32, u32)> = BTreeSet::new();
    let mut clamped = 0usize;

    for r in readings {
        let slot = slot_index(&r.timestamp);
        let accum = &mut slots[slot];
        let mut any_metric = false;

        if let Some(e) = r.energy_kwh {
            let e = if e < 0.0 {
                clamped += 1;
                0.0
            } else {
                e
            };
            accum.energy_sum += e;
            accum.has_energy = true;
            any_metric = true;
        }
        if let Some(d) = r.demand_kw {
            let d = if d < 0.0 {
                clamped += 1;
                0.0
            } else {
                d
            };
            accum.demand_max = accum.demand_max.max(d);
            accum.has_demand = true;
            any_metric = true;
        }
        if any_metric {
            let month = r.timestamp.month();
            let day = if month == 2 && r.timestamp.day() == 29 {
                28
            } else {
                r.timestamp.day()
            };
            covered_days.insert((month, day));
        }
    }

    if clamped > 0 {
        log::warn!("clamped {clamped} negative meter reading value(s) to zero");
    }

    let coverage_days = covered_days.len();
    if coverage_days < assumptions.min_coverage_days {
        return Err(AnalysisError::InsufficientData {
            coverage_days,
            required_days: assumptions.min_coverage_days,
        });
    }
    if !slots.iter().any(|s| s.has_energy) {
        return Err(AnalysisError::invalid_input(
            "readings",
            "no reading carries an energy value",
        ));
    }

    let mut consumption: Vec<Option<f64>> = slots
        .iter()
        .map(|s| s.has_energy.then_some(s.energy_sum))
        .collect();
    let mut demand: Vec<Option<f64>> = slots
        .iter()
        .map(|s| s.has_demand.then_some(s.demand_max))
        .collect();

    // A slot with energy but no demand channel: the hourly average kW equals
    // the hourly kWh numerically.
    for i in 0..HOURS_PER_YEAR {
        if demand[i].is_none() {
            demand[i] = consumption[i];
        }
    }

    let populated: Vec<bool> = (1..=12u32)
        .map(|m| month_has_data(&consumption, m))
        .collect();

    // Intra-month gaps: fill from the month's own mean hour-of-day shape.
    for month in 1..=12u32 {
        if populated[month as usize - 1] {
            fill_month_gaps(&mut consumption, month);
            fill_month_gaps(&mut demand, month);
        }
    }

    // Empty months: distance-weighted blend of nearest populated neighbors.
    let mut interpolated_months = Vec::new();
    for month in 1..=12u32 {
        if !populated[month as usize - 1] {
            synthesize_month(&mut consumption, &populated, month);
            synthesize_month(&mut demand, &populated, month);
            interpolated_months.push(month);
        }
    }

    Ok(HourlyProfile {
        consumption_kwh: consumption.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        demand_kw: demand.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        interpolated_months,
        coverage_days,
    })
}

fn month_has_data(values: &[Option<f64>], month: u32) -> bool {
    let start = month_start_slot(month);
    let end = start + (MONTH_DAYS[month as usize - 1] * 24) as usize;
    values[start..end].iter().any(Option::is_some)
}

/// Fills empty slots in a populated month with that month's mean value for
/// the same hour-of-day, computed over populated days.
fn fill_month_gaps(values: &mut [Option<f64>], month: u32) {
    let start = month_start_slot(month);
    let days = MONTH_DAYS[month as usize - 1] as usize;

    let mut hod_sum = [0.0f64; 24];
    let mut hod_count = [0usize; 24];
    for d in 0..days {
        for h in 0..24 {
            if let Some(v) = values[start + d * 24 + h] {
                hod_sum[h] += v;
                hod_count[h] += 1;
            }
        }
    }

    for d in 0..days {
        for h in 0..24 {
            let slot = start + d * 24 + h;
            if values[slot].is_none() {
                values[slot] = Some(if hod_count[h] > 0 {
                    hod_sum[h] / hod_count[h] as f64
                } else {
                    // Hour-of-day never observed this month; fall back to the
                    // month-wide mean.
                    month_mean(values, start, days)
                });
            }
        }
    }
}

fn month_mean(values: &[Option<f64>], start: usize, days: usize) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values[start..start + days * 24].iter().flatten() {
        sum += v;
        n += 1;
    }
    if n > 0 { sum / n as f64 } else { 0.0 }
}

/// Synthesizes an entirely empty month from the nearest populated month on
/// each side (wrapping across the year boundary), blended by inverse month
/// distance. Day indexes are clamped to the source month length.
fn synthesize_month(values: &mut [Option<f64>], populated: &[bool], month: u32) {
    let Some((prev, prev_dist)) = nearest_populated(populated, month, -1) else {
        return;
    };
    let Some((next, next_dist)) = nearest_populated(populated, month, 1) else {
        return;
    };

    // Inverse-distance weights; a single populated month serves both sides.
    let total = (prev_dist + next_dist) as f64;
    let w_prev = (next_dist as f64) / total;
    let w_next = (prev_dist as f64) / total;

    let start = month_start_slot(month);
    let days = MONTH_DAYS[month as usize - 1] as usize;
    let prev_start = month_start_slot(prev);
    let prev_days = MONTH_DAYS[prev as usize - 1] as usize;
    let next_start = month_start_slot(next);
    let next_days = MONTH_DAYS[next as usize - 1] as usize;

    for d in 0..days {
        for h in 0..24 {
            let pv = values[prev_start + d.min(prev_days - 1) * 24 + h].unwrap_or(0.0);
            let nv = values[next_start + d.min(next_days - 1) * 24 + h].unwrap_or(0.0);
            values[start + d * 24 + h] = Some(w_prev * pv + w_next * nv);
        }
    }
}

/// Nearest populated month in the given direction, with its distance in
/// months (1..=11), wrapping across the year boundary.
fn nearest_populated(populated: &[bool], month: u32, direction: i32) -> Option<(u32, u32)> {
    for dist in 1..12u32 {
        let m = ((month as i32 - 1 + direction * dist as i32).rem_euclid(12)) as usize;
        if populated[m] {
            return Some((m as u32 + 1, dist));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn full_year_readings(kwh: f64, kw: f64) -> Vec<MeterReading> {
        let mut readings = Vec::with_capacity(HOURS_PER_YEAR);
        for month in 1..=12u32 {
            for day in 1..=MONTH_DAYS[month as usize - 1] {
                for hour in 0..24 {
                    readings.push(MeterReading::hourly(ts(month, day, hour), kwh, kw));
                }
            }
        }
        readings
    }

    fn default_profile_cfg() -> ProfileAssumptions {
        ProfileAssumptions::default()
    }

    #[test]
    fn slot_index_covers_full_year() {
        assert_eq!(slot_index(&ts(1, 1, 0)), 0);
        assert_eq!(slot_index(&ts(12, 31, 23)), HOURS_PER_YEAR - 1);
        assert_eq!(slot_index(&ts(2, 1, 0)), 31 * 24);
    }

    #[test]
    fn leap_day_folds_into_feb_28() {
        let leap = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(slot_index(&leap), slot_index(&ts(2, 28, 10)));
    }

    #[test]
    fn full_year_builds_without_interpolation() {
        let readings = full_year_readings(10.0, 10.0);
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        assert_eq!(profile.consumption_kwh.len(), HOURS_PER_YEAR);
        assert!(profile.interpolated_months.is_empty());
        assert_eq!(profile.coverage_days, 365);
        assert!((profile.annual_consumption_kwh() - 10.0 * 8760.0).abs() < 1e-6);
        assert_eq!(profile.peak_demand_kw(), 10.0);
    }

    #[test]
    fn duplicate_hour_energy_sums_demand_maxes() {
        let mut readings = full_year_readings(10.0, 10.0);
        // Second channel on the same clock-hour.
        readings.push(MeterReading::hourly(ts(6, 15, 12), 5.0, 7.0));
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        let slot = slot_index(&ts(6, 15, 12));
        assert!((profile.consumption_kwh[slot] - 15.0).abs() < 1e-9);
        // 7.0 < 10.0, max keeps 10.0
        assert_eq!(profile.demand_kw[slot], 10.0);
    }

    #[test]
    fn quarter_hour_readings_aggregate_into_hour() {
        let mut readings = full_year_readings(10.0, 10.0);
        let base = NaiveDate::from_ymd_opt(2023, 3, 10).unwrap();
        for quarter in 0..4 {
            readings.push(MeterReading {
                timestamp: base.and_hms_opt(14, quarter * 15, 0).unwrap(),
                energy_kwh: Some(2.0),
                demand_kw: Some(20.0),
                granularity: Granularity::QuarterHour,
            });
        }
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        let slot = slot_index(&ts(3, 10, 14));
        assert!((profile.consumption_kwh[slot] - 18.0).abs() < 1e-9); // 10 + 4x2
        assert_eq!(profile.demand_kw[slot], 20.0);
    }

    #[test]
    fn missing_month_is_interpolated_and_disclosed() {
        let readings: Vec<MeterReading> = full_year_readings(10.0, 10.0)
            .into_iter()
            .filter(|r| r.timestamp.month() != 7)
            .collect();
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        assert_eq!(profile.interpolated_months, vec![7]);
        assert!(profile.is_interpolated(7));
        // Neighbors are flat 10.0, so the synthesized month must be too.
        let start = month_start_slot(7);
        for slot in start..start + 31 * 24 {
            assert!((profile.consumption_kwh[slot] - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn interpolated_month_blends_unequal_neighbors() {
        // June = 6.0, August = 18.0, July empty: equidistant neighbors blend
        // to the midpoint.
        let readings: Vec<MeterReading> = full_year_readings(10.0, 10.0)
            .into_iter()
            .filter(|r| r.timestamp.month() != 7)
            .map(|mut r| {
                match r.timestamp.month() {
                    6 => r.energy_kwh = Some(6.0),
                    8 => r.energy_kwh = Some(18.0),
                    _ => {}
                }
                r
            })
            .collect();
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        let slot = month_start_slot(7) + 24 * 10;
        assert!((profile.consumption_kwh[slot] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn all_months_present_means_empty_disclosure_list() {
        let readings = full_year_readings(10.0, 10.0);
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        assert!(profile.interpolated_months.is_empty());
    }

    #[test]
    fn too_few_days_reports_insufficiency() {
        // 10 days of data, threshold 30.
        let mut readings = Vec::new();
        for day in 1..=10u32 {
            for hour in 0..24 {
                readings.push(MeterReading::hourly(ts(1, day, hour), 10.0, 10.0));
            }
        }
        let err = build_profile(&readings, &default_profile_cfg()).unwrap_err();
        match err {
            AnalysisError::InsufficientData {
                coverage_days,
                required_days,
            } => {
                assert_eq!(coverage_days, 10);
                assert_eq!(required_days, 30);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn negative_energy_is_clamped_not_propagated() {
        let mut readings = full_year_readings(10.0, 10.0);
        readings.push(MeterReading::hourly(ts(4, 2, 3), -50.0, 10.0));
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        let slot = slot_index(&ts(4, 2, 3));
        // -50 clamps to 0 and sums with the existing 10.
        assert!((profile.consumption_kwh[slot] - 10.0).abs() < 1e-9);
        assert!(profile.consumption_kwh.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn energy_only_readings_derive_demand() {
        let readings: Vec<MeterReading> = full_year_readings(12.0, 0.0)
            .into_iter()
            .map(|mut r| {
                r.demand_kw = None;
                r
            })
            .collect();
        let profile = build_profile(&readings, &default_profile_cfg()).expect("should build");
        assert_eq!(profile.peak_demand_kw(), 12.0);
    }

    #[test]
    fn rebuilding_from_same_readings_is_identical() {
        let readings = full_year_readings(10.0, 10.0);
        let a = build_profile(&readings, &default_profile_cfg()).expect("first build");
        let b = build_profile(&readings, &default_profile_cfg()).expect("second build");
        assert_eq!(a, b);
    }
}
