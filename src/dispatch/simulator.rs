//! The hourly dispatch state machine.
//!
//! One pass over the representative year, state = battery state of charge.
//! Pure function of its inputs: identical inputs produce bit-identical
//! results, which is what makes the sweep and Monte Carlo fan-outs safe to
//! run in parallel.

use crate::config::BatteryAssumptions;
use crate::error::AnalysisError;
use crate::profile::{HOURS_PER_YEAR, HourlyProfile};

use super::battery::Battery;
use super::pv::PvShape;
use super::{DispatchResult, DispatchSummary, HourFlow, SystemConfiguration};

/// Immutable inputs shared by every configuration evaluated against one site.
///
/// Built once per analysis; the sweep borrows it from many worker threads.
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    /// Canonical hourly profile for the site.
    pub profile: &'a HourlyProfile,
    /// Normalized PV yield shape.
    pub shape: &'a PvShape,
    /// Effective annual yield after orientation and bifacial gain (kWh/kWp).
    pub effective_yield_kwh_per_kwp: f64,
    /// Battery operating parameters.
    pub battery: &'a BatteryAssumptions,
}

/// Simulates one year of hourly dispatch for a configuration.
///
/// Hour order of operations:
/// 1. Production offsets load directly.
/// 2. With a demand-shaving setpoint, discharge is reserved for hours whose
///    building demand exceeds the setpoint and targets bringing net demand
///    down to it; without one, any deficit triggers discharge (greedy
///    arbitrage).
/// 3. Remaining surplus charges the battery; the loss is taken on the charge
///    leg.
/// 4. Residual deficit imports, residual surplus exports.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for malformed configurations or a
/// profile of the wrong length.
pub fn simulate(
    input: &DispatchInput<'_>,
    config: &SystemConfiguration,
) -> Result<DispatchResult, AnalysisError> {
    config.validate()?;
    if input.profile.consumption_kwh.len() != HOURS_PER_YEAR
        || input.profile.demand_kw.len() != HOURS_PER_YEAR
    {
        return Err(AnalysisError::invalid_input(
            "profile",
            format!(
                "expected {HOURS_PER_YEAR} hourly slots, got {}",
                input.profile.consumption_kwh.len()
            ),
        ));
    }
    if !(input.effective_yield_kwh_per_kwp > 0.0) {
        return Err(AnalysisError::invalid_input(
            "effective_yield_kwh_per_kwp",
            "must be > 0",
        ));
    }
    if input
        .profile
        .consumption_kwh
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(AnalysisError::invalid_input(
            "profile.consumption_kwh",
            "contains negative or non-finite values",
        ));
    }

    let production = input
        .shape
        .production(config.pv_kw, input.effective_yield_kwh_per_kwp);

    let mut battery = Battery::new(
        config.battery_kwh,
        config.battery_kw,
        input.battery.roundtrip_efficiency,
        input.battery.initial_soc_fraction,
    );
    let initial_soc_kwh = battery.soc_kwh();

    let mut hours = Vec::with_capacity(HOURS_PER_YEAR);
    for h in 0..HOURS_PER_YEAR {
        let consumption = input.profile.consumption_kwh[h];
        let prod = production[h];

        let direct = prod.min(consumption);
        let mut surplus = prod - direct;
        let mut deficit = consumption - direct;

        let discharged = match config.demand_setpoint_kw {
            Some(setpoint) => {
                let demand = input.profile.demand_kw[h];
                if demand > setpoint {
                    let request = deficit.min(demand - setpoint);
                    battery.discharge(request, config.battery_kw)
                } else {
                    0.0
                }
            }
            None => battery.discharge(deficit, config.battery_kw),
        };
        deficit -= discharged;

        let charged = battery.charge_from_surplus(surplus);
        surplus -= charged;

        hours.push(HourFlow {
            hour: h,
            production_kwh: prod,
            consumption_kwh: consumption,
            direct_use_kwh: direct,
            battery_charge_kwh: charged,
            battery_discharge_kwh: discharged,
            grid_import_kwh: deficit,
            grid_export_kwh: surplus,
            soc_kwh: battery.soc_kwh(),
        });
    }

    let summary = summarize(
        &hours,
        input.profile,
        initial_soc_kwh,
        battery.soc_kwh(),
        battery.losses_kwh(),
    );

    Ok(DispatchResult {
        configuration: config.clone(),
        hours,
        summary,
    })
}

/// Computes the annual summary post-hoc from the hourly trace.
fn summarize(
    hours: &[HourFlow],
    profile: &HourlyProfile,
    initial_soc_kwh: f64,
    final_soc_kwh: f64,
    battery_losses_kwh: f64,
) -> DispatchSummary {
    let mut production = 0.0;
    let mut consumption = 0.0;
    let mut import = 0.0;
    let mut export = 0.0;
    let mut peak_before: f64 = 0.0;
    let mut peak_after: f64 = 0.0;

    for flow in hours {
        production += flow.production_kwh;
        consumption += flow.consumption_kwh;
        import += flow.grid_import_kwh;
        export += flow.grid_export_kwh;

        let demand = profile.demand_kw[flow.hour];
        peak_before = peak_before.max(demand);
        // Net demand seen by the meter: hourly energy flows read as average
        // kW at this resolution.
        let net_demand = (demand - flow.production_kwh + flow.battery_charge_kwh
            - flow.battery_discharge_kwh)
            .max(0.0);
        peak_after = peak_after.max(net_demand);
    }

    let self_consumption = consumption - import;
    DispatchSummary {
        production_kwh: production,
        consumption_kwh: consumption,
        self_consumption_kwh: self_consumption,
        export_kwh: export,
        import_kwh: import,
        battery_losses_kwh,
        delta_soc_kwh: final_soc_kwh - initial_soc_kwh,
        peak_demand_before_kw: peak_before,
        peak_demand_after_kw: peak_after,
        self_sufficiency: if consumption > 0.0 {
            self_consumption / consumption
        } else {
            0.0
        },
    }
}
