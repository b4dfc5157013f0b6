//! TOML-based analysis assumptions and preset definitions.
//!
//! Every field has an explicit default so a partial TOML override is safe:
//! serde fills only *absent* fields, so a value the caller provides is never
//! silently replaced. Units are fixed crate-wide: kW, kWh, CAD, and
//! fractional rates (0.065 means 6.5%).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tariff::{TariffRates, TariffTable};

/// Versioned bag of economic and technical parameters for one analysis run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisAssumptions {
    /// Meter-data coverage requirements.
    pub profile: ProfileAssumptions,
    /// Utility tariff resolution and escalation.
    pub tariff: TariffAssumptions,
    /// PV yield and degradation parameters.
    pub solar: SolarAssumptions,
    /// Battery operating parameters.
    pub battery: BatteryAssumptions,
    /// Hardware, O&M, and inflation cost parameters.
    pub costs: CostAssumptions,
    /// Incentive program rules.
    pub incentives: IncentiveAssumptions,
    /// Discounting and horizon parameters.
    pub finance: FinanceAssumptions,
    /// Sizing sweep grid parameters.
    pub sweep: SweepAssumptions,
    /// Monte Carlo sampling parameters.
    pub monte_carlo: MonteCarloAssumptions,
}

impl Default for AnalysisAssumptions {
    fn default() -> Self {
        Self {
            profile: ProfileAssumptions::default(),
            tariff: TariffAssumptions::default(),
            solar: SolarAssumptions::default(),
            battery: BatteryAssumptions::default(),
            costs: CostAssumptions::default(),
            incentives: IncentiveAssumptions::default(),
            finance: FinanceAssumptions::default(),
            sweep: SweepAssumptions::default(),
            monte_carlo: MonteCarloAssumptions::default(),
        }
    }
}

/// Meter-data coverage requirements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileAssumptions {
    /// Minimum distinct calendar days with real readings before the profile
    /// builder refuses to fabricate a year.
    pub min_coverage_days: usize,
}

impl Default for ProfileAssumptions {
    fn default() -> Self {
        Self {
            min_coverage_days: 30,
        }
    }
}

/// Utility tariff resolution and escalation.
///
/// Rates resolve from `rate_code` via the shared tariff table unless the
/// corresponding explicit override is set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffAssumptions {
    /// Utility rate code (e.g. `"M"` for medium-power business).
    pub rate_code: String,
    /// Explicit energy rate override (CAD/kWh).
    pub energy_cad_per_kwh: Option<f64>,
    /// Explicit demand charge override (CAD/kW/month).
    pub demand_cad_per_kw_month: Option<f64>,
    /// Explicit cost-of-supply override (CAD/kWh), used for exports after
    /// the full-credit net-metering window.
    pub cost_of_supply_cad_per_kwh: Option<f64>,
    /// Annual tariff escalation (fractional).
    pub escalation_rate: f64,
    /// Months during which exports are credited at the full energy rate.
    pub full_credit_months: u32,
}

impl Default for TariffAssumptions {
    fn default() -> Self {
        Self {
            rate_code: "M".to_string(),
            energy_cad_per_kwh: None,
            demand_cad_per_kw_month: None,
            cost_of_supply_cad_per_kwh: None,
            escalation_rate: 0.03,
            full_credit_months: 24,
        }
    }
}

impl TariffAssumptions {
    /// Resolves the effective rates: explicit overrides win, the rate-code
    /// table fills the rest.
    pub fn resolved(&self) -> Result<TariffRates, ConfigError> {
        let base = TariffTable::rates_for_code(&self.rate_code).ok_or_else(|| {
            ConfigError::new(
                "tariff.rate_code",
                format!(
                    "unknown rate code \"{}\", known: {}",
                    self.rate_code,
                    TariffTable::known_codes().join(", ")
                ),
            )
        })?;
        Ok(TariffRates {
            energy_cad_per_kwh: self.energy_cad_per_kwh.unwrap_or(base.energy_cad_per_kwh),
            demand_cad_per_kw_month: self
                .demand_cad_per_kw_month
                .unwrap_or(base.demand_cad_per_kw_month),
            cost_of_supply_cad_per_kwh: self
                .cost_of_supply_cad_per_kwh
                .unwrap_or(base.cost_of_supply_cad_per_kwh),
        })
    }
}

/// PV yield and degradation parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarAssumptions {
    /// Site-specific annual yield (kWh per kWp of nameplate).
    pub specific_yield_kwh_per_kwp: f64,
    /// Orientation/tilt multiplier (1.0 = ideal south-facing).
    pub orientation_factor: f64,
    /// Bifacial gain as a fraction of front-side yield (0.0 = monofacial).
    pub bifacial_boost: f64,
    /// Annual panel output degradation (fractional, e.g. 0.005 = 0.5%/yr).
    pub degradation_rate: f64,
    /// Grid CO2 intensity displaced by on-site production (kg per kWh).
    pub grid_co2_kg_per_kwh: f64,
}

impl Default for SolarAssumptions {
    fn default() -> Self {
        Self {
            specific_yield_kwh_per_kwp: 1150.0,
            orientation_factor: 1.0,
            bifacial_boost: 0.0,
            degradation_rate: 0.005,
            // Hydro-dominated grid default; configurable for other markets.
            grid_co2_kg_per_kwh: 0.0017,
        }
    }
}

impl SolarAssumptions {
    /// Effective first-year yield per kWp after orientation and bifacial gain.
    pub fn effective_yield_kwh_per_kwp(&self) -> f64 {
        self.specific_yield_kwh_per_kwp * self.orientation_factor * (1.0 + self.bifacial_boost)
    }
}

/// Battery operating parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryAssumptions {
    /// Round-trip efficiency (fractional), applied on the charge leg.
    pub roundtrip_efficiency: f64,
    /// State of charge at hour 0 as a fraction of capacity.
    pub initial_soc_fraction: f64,
}

impl Default for BatteryAssumptions {
    fn default() -> Self {
        Self {
            roundtrip_efficiency: 0.90,
            initial_soc_fraction: 0.0,
        }
    }
}

/// Hardware, O&M, and inflation cost parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostAssumptions {
    /// Battery energy component (CAD per kWh installed).
    pub battery_cad_per_kwh: f64,
    /// Battery power component (CAD per kW of inverter/PCS).
    pub battery_cad_per_kw: f64,
    /// Annual O&M (CAD per kW of PV per year).
    pub om_cad_per_kw_year: f64,
    /// General inflation applied to O&M (fractional).
    pub inflation_rate: f64,
}

impl Default for CostAssumptions {
    fn default() -> Self {
        Self {
            battery_cad_per_kwh: 650.0,
            battery_cad_per_kw: 350.0,
            om_cad_per_kw_year: 15.0,
            inflation_rate: 0.02,
        }
    }
}

/// Incentive program rules.
///
/// Timing is fixed by the financial model: utility rebates land at signing,
/// the battery rebate is split across years 0 and 1, the federal credit lands
/// in year 1, the depreciation shield is spread from year 1.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncentiveAssumptions {
    /// Utility PV capacity rebate (CAD per kW of nameplate).
    pub utility_rebate_cad_per_kw: f64,
    /// Utility rebate cap as a fraction of gross CAPEX.
    pub utility_rebate_cap_fraction: f64,
    /// Battery storage rebate (CAD per kWh installed).
    pub battery_rebate_cad_per_kwh: f64,
    /// Federal investment credit as a fraction of CAPEX net of utility rebates.
    pub federal_credit_fraction: f64,
    /// Corporate tax rate used for the depreciation shield (fractional).
    pub tax_rate: f64,
    /// Years over which accelerated depreciation is realized.
    pub depreciation_years: u32,
}

impl Default for IncentiveAssumptions {
    fn default() -> Self {
        Self {
            utility_rebate_cad_per_kw: 250.0,
            utility_rebate_cap_fraction: 0.25,
            battery_rebate_cad_per_kwh: 150.0,
            federal_credit_fraction: 0.30,
            tax_rate: 0.265,
            depreciation_years: 5,
        }
    }
}

/// Discounting and horizon parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceAssumptions {
    /// Annual discount rate (fractional).
    pub discount_rate: f64,
    /// Horizon (years) used for IRR, payback reporting, and sweep ranking.
    /// NPV is additionally reported at the standard 10/20/25/30 horizons.
    pub horizon_years: u32,
}

impl Default for FinanceAssumptions {
    fn default() -> Self {
        Self {
            discount_rate: 0.06,
            horizon_years: 25,
        }
    }
}

/// Sizing sweep grid parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepAssumptions {
    /// Upper PV bound of the sweep (kW); further capped by the roof maximum.
    pub pv_max_kw: f64,
    /// PV grid step (kW).
    pub pv_step_kw: f64,
    /// Upper battery energy bound of the sweep (kWh).
    pub battery_max_kwh: f64,
    /// Battery energy grid step (kWh).
    pub battery_step_kwh: f64,
    /// Battery power rating as a fraction of energy capacity (kW per kWh).
    pub battery_power_ratio: f64,
    /// Fixed battery size used while sweeping PV in the hybrid family (kWh).
    pub hybrid_battery_kwh: f64,
    /// Fixed PV size used while sweeping battery in the hybrid family (kW).
    pub hybrid_pv_kw: f64,
    /// Minimum gross CAPEX for a point to be eligible as the IRR optimum;
    /// guards against spuriously high IRR on near-zero investments.
    pub irr_min_capex_cad: f64,
}

impl Default for SweepAssumptions {
    fn default() -> Self {
        Self {
            pv_max_kw: 500.0,
            pv_step_kw: 25.0,
            battery_max_kwh: 500.0,
            battery_step_kwh: 50.0,
            battery_power_ratio: 0.5,
            hybrid_battery_kwh: 100.0,
            hybrid_pv_kw: 100.0,
            irr_min_capex_cad: 25_000.0,
        }
    }
}

/// Inclusive sampling range for one Monte Carlo parameter.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SampleRange {
    pub low: f64,
    pub high: f64,
}

impl SampleRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }
}

/// Monte Carlo sampling parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonteCarloAssumptions {
    /// Nominal iteration count.
    pub iterations: usize,
    /// Random seed; `None` means seed 0. Always deterministic: client-facing
    /// reports must be exactly reproducible for audit.
    pub seed: Option<u64>,
    /// Fraction of iterations deliberately failed, exercising the discard
    /// path end-to-end. Leave at 0.0 outside of tests.
    pub failure_injection_rate: f64,
    /// Sampling range for annual tariff escalation (fractional).
    pub tariff_escalation: SampleRange,
    /// Sampling range for the discount rate (fractional).
    pub discount_rate: SampleRange,
    /// Sampling range for specific yield (kWh/kWp).
    pub specific_yield: SampleRange,
    /// Sampling range for bifacial boost (fractional).
    pub bifacial_boost: SampleRange,
    /// Sampling range for O&M cost (CAD/kW/yr).
    pub om_cad_per_kw_year: SampleRange,
    /// Sampling range for the multiplier applied to the priced $/W.
    pub cost_per_watt_multiplier: SampleRange,
}

impl Default for MonteCarloAssumptions {
    fn default() -> Self {
        Self {
            iterations: 500,
            seed: None,
            failure_injection_rate: 0.0,
            tariff_escalation: SampleRange::new(0.01, 0.05),
            discount_rate: SampleRange::new(0.04, 0.08),
            specific_yield: SampleRange::new(1050.0, 1250.0),
            bifacial_boost: SampleRange::new(0.0, 0.08),
            om_cad_per_kw_year: SampleRange::new(10.0, 22.0),
            cost_per_watt_multiplier: SampleRange::new(0.85, 1.15),
        }
    }
}

impl AnalysisAssumptions {
    /// Returns the Québec medium-power commercial preset (the defaults).
    pub fn quebec_commercial() -> Self {
        Self::default()
    }

    /// Returns the autonomy-focused preset: finer and wider battery grid, for
    /// clients prioritizing self-sufficiency over payback.
    pub fn net_zero() -> Self {
        Self {
            sweep: SweepAssumptions {
                battery_max_kwh: 1000.0,
                battery_step_kwh: 25.0,
                hybrid_battery_kwh: 250.0,
                ..SweepAssumptions::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["quebec_commercial", "net_zero"];

    /// Loads a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "quebec_commercial" => Ok(Self::quebec_commercial()),
            "net_zero" => Ok(Self::net_zero()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses assumptions from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                "assumptions",
                format!("cannot read \"{}\": {e}", path.display()),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses assumptions from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns the list of violations.
    ///
    /// Returns an empty vector if the assumptions are usable.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.tariff.resolved() {
            errors.push(e);
        }
        if !(self.tariff.escalation_rate > -1.0) || !self.tariff.escalation_rate.is_finite() {
            errors.push(ConfigError::new(
                "tariff.escalation_rate",
                "must be a finite rate > -1.0",
            ));
        }

        let sol = &self.solar;
        if !(sol.specific_yield_kwh_per_kwp > 0.0) {
            errors.push(ConfigError::new(
                "solar.specific_yield_kwh_per_kwp",
                "must be > 0",
            ));
        }
        if !(sol.orientation_factor > 0.0) {
            errors.push(ConfigError::new("solar.orientation_factor", "must be > 0"));
        }
        if sol.bifacial_boost < 0.0 {
            errors.push(ConfigError::new("solar.bifacial_boost", "must be >= 0"));
        }
        if !(0.0..1.0).contains(&sol.degradation_rate) {
            errors.push(ConfigError::new(
                "solar.degradation_rate",
                "must be in [0.0, 1.0)",
            ));
        }

        let bat = &self.battery;
        if !(bat.roundtrip_efficiency > 0.0 && bat.roundtrip_efficiency <= 1.0) {
            errors.push(ConfigError::new(
                "battery.roundtrip_efficiency",
                "must be in (0.0, 1.0]",
            ));
        }
        if !(0.0..=1.0).contains(&bat.initial_soc_fraction) {
            errors.push(ConfigError::new(
                "battery.initial_soc_fraction",
                "must be in [0.0, 1.0]",
            ));
        }

        let costs = &self.costs;
        if costs.battery_cad_per_kwh < 0.0 {
            errors.push(ConfigError::new("costs.battery_cad_per_kwh", "must be >= 0"));
        }
        if costs.battery_cad_per_kw < 0.0 {
            errors.push(ConfigError::new("costs.battery_cad_per_kw", "must be >= 0"));
        }
        if costs.om_cad_per_kw_year < 0.0 {
            errors.push(ConfigError::new("costs.om_cad_per_kw_year", "must be >= 0"));
        }

        let inc = &self.incentives;
        if !(0.0..=1.0).contains(&inc.utility_rebate_cap_fraction) {
            errors.push(ConfigError::new(
                "incentives.utility_rebate_cap_fraction",
                "must be in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&inc.federal_credit_fraction) {
            errors.push(ConfigError::new(
                "incentives.federal_credit_fraction",
                "must be in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&inc.tax_rate) {
            errors.push(ConfigError::new("incentives.tax_rate", "must be in [0, 1]"));
        }

        let fin = &self.finance;
        if !(fin.discount_rate > -1.0) || !fin.discount_rate.is_finite() {
            errors.push(ConfigError::new(
                "finance.discount_rate",
                "must be a finite rate > -1.0",
            ));
        }
        if fin.horizon_years == 0 {
            errors.push(ConfigError::new("finance.horizon_years", "must be > 0"));
        }

        let sweep = &self.sweep;
        if !(sweep.pv_step_kw > 0.0) {
            errors.push(ConfigError::new("sweep.pv_step_kw", "must be > 0"));
        }
        if !(sweep.battery_step_kwh > 0.0) {
            errors.push(ConfigError::new("sweep.battery_step_kwh", "must be > 0"));
        }
        if sweep.pv_max_kw < 0.0 {
            errors.push(ConfigError::new("sweep.pv_max_kw", "must be >= 0"));
        }
        if sweep.battery_max_kwh < 0.0 {
            errors.push(ConfigError::new("sweep.battery_max_kwh", "must be >= 0"));
        }
        if !(sweep.battery_power_ratio > 0.0) {
            errors.push(ConfigError::new("sweep.battery_power_ratio", "must be > 0"));
        }

        let mc = &self.monte_carlo;
        if mc.iterations == 0 {
            errors.push(ConfigError::new("monte_carlo.iterations", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&mc.failure_injection_rate) {
            errors.push(ConfigError::new(
                "monte_carlo.failure_injection_rate",
                "must be in [0, 1]",
            ));
        }
        for (field, range) in [
            ("monte_carlo.tariff_escalation", mc.tariff_escalation),
            ("monte_carlo.discount_rate", mc.discount_rate),
            ("monte_carlo.specific_yield", mc.specific_yield),
            ("monte_carlo.bifacial_boost", mc.bifacial_boost),
            ("monte_carlo.om_cad_per_kw_year", mc.om_cad_per_kw_year),
            (
                "monte_carlo.cost_per_watt_multiplier",
                mc.cost_per_watt_multiplier,
            ),
        ] {
            if !range.is_valid() {
                errors.push(ConfigError::new(field, "low must be finite and <= high"));
            }
        }

        if self.profile.min_coverage_days == 0 {
            errors.push(ConfigError::new("profile.min_coverage_days", "must be > 0"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_assumptions_are_valid() {
        let a = AnalysisAssumptions::default();
        let errors = a.validate();
        assert!(errors.is_empty(), "defaults should be valid: {errors:?}");
    }

    #[test]
    fn all_presets_are_valid() {
        for name in AnalysisAssumptions::PRESETS {
            let a = AnalysisAssumptions::from_preset(name);
            assert!(a.is_ok(), "preset \"{name}\" should load");
            let errors = a.as_ref().map(|a| a.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let err = AnalysisAssumptions::from_preset("nonexistent");
        assert!(err.is_err());
        assert!(err.unwrap_err().message.contains("unknown preset"));
    }

    #[test]
    fn partial_toml_uses_defaults_elsewhere() {
        let toml = r#"
[finance]
discount_rate = 0.08
"#;
        let a = AnalysisAssumptions::from_toml_str(toml).expect("partial TOML should parse");
        assert_eq!(a.finance.discount_rate, 0.08);
        // untouched sections keep defaults
        assert_eq!(a.finance.horizon_years, 25);
        assert_eq!(a.solar.specific_yield_kwh_per_kwp, 1150.0);
        assert_eq!(a.tariff.rate_code, "M");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = r#"
[finance]
discount_rate = 0.08
bogus_field = 1.0
"#;
        assert!(AnalysisAssumptions::from_toml_str(toml).is_err());
    }

    #[test]
    fn explicit_tariff_override_wins_over_rate_code() {
        let mut a = AnalysisAssumptions::default();
        a.tariff.energy_cad_per_kwh = Some(0.2);
        let rates = a.tariff.resolved().expect("code M resolves");
        assert_eq!(rates.energy_cad_per_kwh, 0.2);
        // non-overridden fields still come from the table
        assert!(rates.demand_cad_per_kw_month > 0.0);
    }

    #[test]
    fn unknown_rate_code_fails_validation() {
        let mut a = AnalysisAssumptions::default();
        a.tariff.rate_code = "Z9".to_string();
        let errors = a.validate();
        assert!(errors.iter().any(|e| e.field == "tariff.rate_code"));
    }

    #[test]
    fn validation_catches_zero_step() {
        let mut a = AnalysisAssumptions::default();
        a.sweep.pv_step_kw = 0.0;
        let errors = a.validate();
        assert!(errors.iter().any(|e| e.field == "sweep.pv_step_kw"));
    }

    #[test]
    fn validation_catches_inverted_sample_range() {
        let mut a = AnalysisAssumptions::default();
        a.monte_carlo.discount_rate = SampleRange::new(0.09, 0.02);
        let errors = a.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "monte_carlo.discount_rate")
        );
    }

    #[test]
    fn effective_yield_combines_orientation_and_bifacial() {
        let sol = SolarAssumptions {
            specific_yield_kwh_per_kwp: 1000.0,
            orientation_factor: 0.9,
            bifacial_boost: 0.10,
            ..SolarAssumptions::default()
        };
        assert!((sol.effective_yield_kwh_per_kwp() - 990.0).abs() < 1e-9);
    }

    #[test]
    fn net_zero_preset_widens_battery_range() {
        let base = AnalysisAssumptions::quebec_commercial();
        let nz = AnalysisAssumptions::net_zero();
        assert!(nz.sweep.battery_max_kwh > base.sweep.battery_max_kwh);
        assert!(nz.sweep.battery_step_kwh < base.sweep.battery_step_kwh);
    }
}
