//! Shared fixtures for integration tests.

use chrono::NaiveDate;

use solfin_sim::config::AnalysisAssumptions;
use solfin_sim::profile::MeterReading;

/// One representative year of hourly readings with a flat load.
pub fn flat_year_readings(kwh_per_hour: f64, demand_kw: f64) -> Vec<MeterReading> {
    shaped_year_readings(|_, _| (kwh_per_hour, demand_kw))
}

/// One representative year of readings with a commercial day/night shape:
/// high during business hours, low overnight.
pub fn business_year_readings(day_kwh: f64, night_kwh: f64) -> Vec<MeterReading> {
    shaped_year_readings(|_, hour| {
        let kwh = if (7..19).contains(&hour) {
            day_kwh
        } else {
            night_kwh
        };
        (kwh, kwh * 1.2)
    })
}

/// Builds a year of hourly readings from `(day_of_year, hour) -> (kWh, kW)`.
pub fn shaped_year_readings(f: impl Fn(u32, u32) -> (f64, f64)) -> Vec<MeterReading> {
    let mut readings = Vec::with_capacity(8760);
    let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date");
    let end = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let mut day = 0u32;
    while date < end {
        for hour in 0..24u32 {
            let (kwh, kw) = f(day, hour);
            readings.push(MeterReading::hourly(
                date.and_hms_opt(hour, 0, 0).expect("valid time"),
                kwh,
                kw,
            ));
        }
        date = date.succ_opt().expect("next day");
        day += 1;
    }
    readings
}

/// Assumptions with a grid small enough for fast integration runs.
pub fn fast_assumptions() -> AnalysisAssumptions {
    let mut a = AnalysisAssumptions::default();
    a.sweep.pv_max_kw = 150.0;
    a.sweep.pv_step_kw = 50.0;
    a.sweep.battery_max_kwh = 100.0;
    a.sweep.battery_step_kwh = 50.0;
    a.sweep.hybrid_battery_kwh = 50.0;
    a.sweep.hybrid_pv_kw = 100.0;
    a.monte_carlo.iterations = 100;
    a.monte_carlo.seed = Some(7);
    a
}
