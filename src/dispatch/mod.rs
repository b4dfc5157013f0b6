//! Hourly energy dispatch: system configuration, per-hour flows, and the
//! annual summary derived from them.

pub mod battery;
pub mod pv;
pub mod simulator;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub use battery::Battery;
pub use pv::PvShape;
pub use simulator::{DispatchInput, simulate};

/// A candidate PV + battery system.
///
/// Pure input value object: never mutated after construction. Sweeps generate
/// new configurations rather than editing existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    /// PV nameplate capacity (kW).
    pub pv_kw: f64,
    /// Battery energy capacity (kWh).
    pub battery_kwh: f64,
    /// Battery power rating (kW), applies to both charge and discharge.
    pub battery_kw: f64,
    /// Demand-shaving setpoint (kW). When set, battery discharge is reserved
    /// for hours whose building demand exceeds this level.
    pub demand_setpoint_kw: Option<f64>,
}

impl SystemConfiguration {
    pub fn new(pv_kw: f64, battery_kwh: f64, battery_kw: f64) -> Self {
        Self {
            pv_kw,
            battery_kwh,
            battery_kw,
            demand_setpoint_kw: None,
        }
    }

    /// PV-only configuration.
    pub fn pv_only(pv_kw: f64) -> Self {
        Self::new(pv_kw, 0.0, 0.0)
    }

    /// Battery-only configuration.
    pub fn battery_only(battery_kwh: f64, battery_kw: f64) -> Self {
        Self::new(0.0, battery_kwh, battery_kw)
    }

    pub fn with_demand_setpoint(mut self, setpoint_kw: f64) -> Self {
        self.demand_setpoint_kw = Some(setpoint_kw);
        self
    }

    /// Checks the configuration is physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] on negative or non-finite
    /// sizes. Zero sizes are valid (they degrade to PV-only / load-only).
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (field, value) in [
            ("pv_kw", self.pv_kw),
            ("battery_kwh", self.battery_kwh),
            ("battery_kw", self.battery_kw),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::invalid_input(
                    field,
                    format!("must be finite and >= 0, got {value}"),
                ));
            }
        }
        if let Some(sp) = self.demand_setpoint_kw {
            if !sp.is_finite() || sp < 0.0 {
                return Err(AnalysisError::invalid_input(
                    "demand_setpoint_kw",
                    format!("must be finite and >= 0, got {sp}"),
                ));
            }
        }
        Ok(())
    }

    /// Whether the configuration contains a usable battery.
    pub fn has_battery(&self) -> bool {
        self.battery_kwh > 0.0 && self.battery_kw > 0.0
    }
}

/// Complete record of one simulated hour. All energies in kWh over the hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourFlow {
    /// Hour-of-year index (0..8760).
    pub hour: usize,
    /// PV production.
    pub production_kwh: f64,
    /// Building consumption.
    pub consumption_kwh: f64,
    /// Production consumed directly by the building.
    pub direct_use_kwh: f64,
    /// Energy drawn from surplus into the battery (before charge loss).
    pub battery_charge_kwh: f64,
    /// Energy delivered from the battery to the building.
    pub battery_discharge_kwh: f64,
    /// Residual energy imported from the grid.
    pub grid_import_kwh: f64,
    /// Residual energy exported to the grid.
    pub grid_export_kwh: f64,
    /// Battery state of charge at end of hour (kWh).
    pub soc_kwh: f64,
}

/// Annual aggregates computed post-hoc from the hourly trace, so that step
/// data and reported metrics cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Total PV production (kWh/yr).
    pub production_kwh: f64,
    /// Total building consumption (kWh/yr).
    pub consumption_kwh: f64,
    /// Load met by on-site production, directly or battery-shifted (kWh/yr).
    pub self_consumption_kwh: f64,
    /// Energy exported to the grid (kWh/yr).
    pub export_kwh: f64,
    /// Energy imported from the grid (kWh/yr).
    pub import_kwh: f64,
    /// Battery charge-leg conversion losses (kWh/yr).
    pub battery_losses_kwh: f64,
    /// End-of-year SoC minus start-of-year SoC (kWh).
    pub delta_soc_kwh: f64,
    /// Peak building demand with no system (kW).
    pub peak_demand_before_kw: f64,
    /// Peak net demand after PV and battery (kW).
    pub peak_demand_after_kw: f64,
    /// Fraction of consumption met on-site (0..=1).
    pub self_sufficiency: f64,
}

impl DispatchSummary {
    /// Energy-conservation residual:
    /// `production + import - consumption - export - losses - delta_soc`.
    ///
    /// Zero (within float tolerance) for every valid dispatch.
    pub fn energy_balance_error_kwh(&self) -> f64 {
        self.production_kwh + self.import_kwh
            - self.consumption_kwh
            - self.export_kwh
            - self.battery_losses_kwh
            - self.delta_soc_kwh
    }

    /// Peak demand reduction attributable to the system (kW, >= 0).
    pub fn peak_reduction_kw(&self) -> f64 {
        (self.peak_demand_before_kw - self.peak_demand_after_kw).max(0.0)
    }
}

/// Result of simulating one (profile, configuration) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// The configuration that was simulated.
    pub configuration: SystemConfiguration,
    /// Hour-by-hour flow trace.
    pub hours: Vec<HourFlow>,
    /// Annual aggregates.
    pub summary: DispatchSummary,
}
