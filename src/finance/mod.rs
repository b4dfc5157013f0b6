//! Multi-year financial model.
//!
//! Turns one year of dispatch aggregates plus cost/incentive assumptions
//! into a cashflow series and scalar return metrics. Derived strictly from a
//! [`DispatchSummary`] and the assumptions, never hand-edited.

pub mod incentives;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisAssumptions;
use crate::dispatch::{DispatchSummary, SystemConfiguration};
use crate::error::AnalysisError;
use crate::pricing::PricingAdapter;

pub use incentives::{
    IncentiveEvent, IncentiveKind, incentive_schedule, incentives_in_year_cad,
    total_incentives_cad,
};

/// NPV reporting horizons (years), always present alongside the configured
/// ranking horizon.
pub const NPV_HORIZONS: [u32; 4] = [10, 20, 25, 30];

/// Complete financial picture of one configuration.
///
/// All amounts CAD. `cashflows_cad[y]` is the net cashflow of year `y`
/// (index 0 = signing); the vector always extends to at least 30 years so
/// the standard NPV horizons are well defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialBreakdown {
    /// Installed cost before incentives.
    pub gross_capex_cad: f64,
    /// $/W applied to the PV portion.
    pub cost_per_watt_cad: f64,
    /// Pricing tier label, for the proposal document.
    pub pricing_tier: String,
    /// Chronological incentive events.
    pub incentives: Vec<IncentiveEvent>,
    /// Gross CAPEX minus every incentive amount. Exact by construction.
    pub net_capex_cad: f64,
    /// First-year savings before O&M (energy + demand + export).
    pub year1_gross_savings_cad: f64,
    /// First-year O&M cost.
    pub year1_om_cad: f64,
    /// Net cashflow per year, index 0..=max(horizon, 30).
    pub cashflows_cad: Vec<f64>,
    /// NPV at the standard 10/20/25/30-year horizons.
    pub npv_10yr_cad: f64,
    pub npv_20yr_cad: f64,
    pub npv_25yr_cad: f64,
    pub npv_30yr_cad: f64,
    /// NPV at the configured ranking horizon.
    pub npv_horizon_cad: f64,
    /// IRR at the configured horizon; `None` when undefined (no savings, or
    /// no sign change over the horizon). Never a numeric sentinel.
    pub irr: Option<f64>,
    /// Undiscounted payback (fractional years); `None` if never recovered
    /// within the horizon.
    pub simple_payback_years: Option<f64>,
    /// Levelized cost of energy; `None` when the system produces nothing.
    pub lcoe_cad_per_kwh: Option<f64>,
    /// Lifetime CO2 avoided by on-site consumption (tonnes over horizon).
    pub co2_avoided_tonnes: f64,
}

/// Discounted sum of a cashflow slice (index = year offset).
pub fn npv(rate: f64, cashflows: &[f64]) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .map(|(year, cf)| cf / (1.0 + rate).powi(year as i32))
        .sum()
}

/// IRR via bisection on `npv(r) == 0` over `r` in `(-0.95, 10.0)`.
///
/// Returns `None` when the cashflow has no sign change in that bracket:
/// the undefined case, reported as such rather than forced to a number.
fn internal_rate_of_return(cashflows: &[f64]) -> Option<f64> {
    let mut lo = -0.95;
    let mut hi = 10.0;
    let f_lo = npv(lo, cashflows);
    let f_hi = npv(hi, cashflows);
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo * f_hi > 0.0 {
        return None;
    }
    for _ in 0..200 {
        let mid = (lo + hi) / 2.0;
        let f_mid = npv(mid, cashflows);
        if f_mid.abs() < 1e-9 || (hi - lo) < 1e-9 {
            return Some(mid);
        }
        if f_lo * f_mid <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some((lo + hi) / 2.0)
}

/// Undiscounted fractional-year payback over the given cashflows.
///
/// `None` when there is no upfront cash to recover, or when cumulative
/// cashflow never turns positive within the horizon.
fn simple_payback(cashflows: &[f64]) -> Option<f64> {
    if cashflows.first().is_none_or(|&cf0| cf0 >= 0.0) {
        return None;
    }
    let mut cumulative = 0.0;
    for (year, cf) in cashflows.iter().enumerate() {
        let before = cumulative;
        cumulative += cf;
        if cumulative >= 0.0 && year > 0 {
            let fraction = if *cf > 0.0 { -before / cf } else { 0.0 };
            return Some((year - 1) as f64 + fraction);
        }
    }
    None
}

/// Evaluates the financial breakdown for one simulated configuration.
///
/// # Errors
///
/// Returns [`AnalysisError::Config`] when the tariff cannot be resolved.
pub fn evaluate(
    config: &SystemConfiguration,
    summary: &DispatchSummary,
    assumptions: &AnalysisAssumptions,
    pricing: &dyn PricingAdapter,
) -> Result<FinancialBreakdown, AnalysisError> {
    let rates = assumptions
        .tariff
        .resolved()
        .map_err(|e| AnalysisError::Config(vec![e]))?;

    let cost_per_watt = pricing.cost_per_watt(config.pv_kw);
    let pv_capex = cost_per_watt * config.pv_kw * 1000.0;
    let battery_capex = config.battery_kwh * assumptions.costs.battery_cad_per_kwh
        + config.battery_kw * assumptions.costs.battery_cad_per_kw;
    let gross_capex = pv_capex + battery_capex;

    let events = incentive_schedule(config, gross_capex, &assumptions.incentives);
    let net_capex = gross_capex - total_incentives_cad(&events);

    let horizon = assumptions.finance.horizon_years;
    let horizon_max = horizon.max(*NPV_HORIZONS.last().unwrap_or(&30));

    let base_energy_savings = summary.self_consumption_kwh * rates.energy_cad_per_kwh;
    let base_demand_savings =
        summary.peak_reduction_kw() * rates.demand_cad_per_kw_month * 12.0;
    let escalation = assumptions.tariff.escalation_rate;
    let degradation = assumptions.solar.degradation_rate;
    let inflation = assumptions.costs.inflation_rate;
    let annual_om = assumptions.costs.om_cad_per_kw_year * config.pv_kw;

    let mut cashflows = Vec::with_capacity(horizon_max as usize + 1);
    cashflows.push(-(gross_capex - incentives_in_year_cad(&events, 0)));

    let mut year1_gross_savings = 0.0;
    let mut year1_om = 0.0;
    for year in 1..=horizon_max {
        let degr = (1.0 - degradation).powi(year as i32 - 1);
        let esc = (1.0 + escalation).powi(year as i32 - 1);
        let infl = (1.0 + inflation).powi(year as i32 - 1);

        let energy_savings = base_energy_savings * degr * esc;
        let demand_savings = base_demand_savings * esc;

        // Two-tier export valuation: months inside the full-credit window
        // earn the retail energy rate, the rest earn the cost-of-supply rate.
        let months_before = (year - 1) * 12;
        let full_fraction = ((assumptions.tariff.full_credit_months as f64
            - months_before as f64)
            / 12.0)
            .clamp(0.0, 1.0);
        let export_rate = full_fraction * rates.energy_cad_per_kwh
            + (1.0 - full_fraction) * rates.cost_of_supply_cad_per_kwh;
        let export_revenue = summary.export_kwh * export_rate * degr * esc;

        let om = annual_om * infl;
        if year == 1 {
            year1_gross_savings = energy_savings + demand_savings + export_revenue;
            year1_om = om;
        }

        cashflows.push(
            energy_savings + demand_savings + export_revenue - om
                + incentives_in_year_cad(&events, year),
        );
    }

    let discount = assumptions.finance.discount_rate;
    let npv_at = |h: u32| npv(discount, &cashflows[..=(h.min(horizon_max) as usize)]);

    let horizon_cash = &cashflows[..=(horizon as usize)];
    let irr = if year1_gross_savings > 0.0 {
        internal_rate_of_return(horizon_cash)
    } else {
        None
    };
    let payback = simple_payback(horizon_cash);

    // LCOE: discounted lifetime cost over discounted lifetime production.
    let annual_production = summary.production_kwh;
    let lcoe = if annual_production > 0.0 {
        let mut cost = gross_capex;
        for e in &events {
            cost -= e.amount_cad / (1.0 + discount).powi(e.year_offset as i32);
        }
        let mut energy = 0.0;
        for year in 1..=horizon {
            let degr = (1.0 - degradation).powi(year as i32 - 1);
            cost += annual_om * (1.0 + inflation).powi(year as i32 - 1)
                / (1.0 + discount).powi(year as i32);
            energy += annual_production * degr / (1.0 + discount).powi(year as i32);
        }
        Some(cost / energy)
    } else {
        None
    };

    let co2_avoided_tonnes = (1..=horizon)
        .map(|year| {
            summary.self_consumption_kwh
                * (1.0 - degradation).powi(year as i32 - 1)
                * assumptions.solar.grid_co2_kg_per_kwh
        })
        .sum::<f64>()
        / 1000.0;

    Ok(FinancialBreakdown {
        gross_capex_cad: gross_capex,
        cost_per_watt_cad: cost_per_watt,
        pricing_tier: pricing.tier_label(config.pv_kw).to_string(),
        incentives: events,
        net_capex_cad: net_capex,
        year1_gross_savings_cad: year1_gross_savings,
        year1_om_cad: year1_om,
        npv_10yr_cad: npv_at(10),
        npv_20yr_cad: npv_at(20),
        npv_25yr_cad: npv_at(25),
        npv_30yr_cad: npv_at(30),
        npv_horizon_cad: npv_at(horizon),
        irr,
        simple_payback_years: payback,
        lcoe_cad_per_kwh: lcoe,
        co2_avoided_tonnes,
        cashflows_cad: cashflows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::FlatPricing;

    fn summary(
        production: f64,
        consumption: f64,
        self_consumption: f64,
        export: f64,
        peak_before: f64,
        peak_after: f64,
    ) -> DispatchSummary {
        DispatchSummary {
            production_kwh: production,
            consumption_kwh: consumption,
            self_consumption_kwh: self_consumption,
            export_kwh: export,
            import_kwh: consumption - self_consumption,
            battery_losses_kwh: 0.0,
            delta_soc_kwh: 0.0,
            peak_demand_before_kw: peak_before,
            peak_demand_after_kw: peak_after,
            self_sufficiency: if consumption > 0.0 {
                self_consumption / consumption
            } else {
                0.0
            },
        }
    }

    fn base_assumptions() -> AnalysisAssumptions {
        AnalysisAssumptions::default()
    }

    #[test]
    fn capex_matches_flat_pricing_exactly() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 200_000.0, 100_000.0, 15_000.0, 50.0, 40.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        assert!((breakdown.gross_capex_cad - 100.0 * 1000.0 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn net_capex_is_gross_minus_incentives_exactly() {
        let config = SystemConfiguration::new(100.0, 200.0, 100.0);
        let s = summary(115_000.0, 200_000.0, 110_000.0, 5_000.0, 50.0, 35.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        let total: f64 = breakdown.incentives.iter().map(|e| e.amount_cad).sum();
        assert_eq!(breakdown.net_capex_cad, breakdown.gross_capex_cad - total);
    }

    #[test]
    fn cashflow_year_zero_is_gross_minus_signing_rebates() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 200_000.0, 100_000.0, 15_000.0, 50.0, 40.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        let signing = incentives_in_year_cad(&breakdown.incentives, 0);
        assert!(
            (breakdown.cashflows_cad[0] + breakdown.gross_capex_cad - signing).abs() < 1e-9
        );
    }

    #[test]
    fn zero_savings_reports_undefined_irr() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let mut a = base_assumptions();
        // no export revenue either
        a.tariff.cost_of_supply_cad_per_kwh = Some(0.0);
        a.tariff.energy_cad_per_kwh = Some(0.0);
        a.tariff.demand_cad_per_kw_month = Some(0.0);
        let breakdown =
            evaluate(&config, &s, &a, &FlatPricing::new(2.0)).expect("should evaluate");
        assert!(breakdown.irr.is_none());
        assert!(breakdown.simple_payback_years.is_none());
    }

    #[test]
    fn profitable_system_has_positive_npv_and_defined_irr() {
        let config = SystemConfiguration::pv_only(100.0);
        // Strong self-consumption against a healthy tariff.
        let s = summary(115_000.0, 400_000.0, 110_000.0, 5_000.0, 80.0, 50.0);
        let mut a = base_assumptions();
        a.tariff.energy_cad_per_kwh = Some(0.15);
        let breakdown =
            evaluate(&config, &s, &a, &FlatPricing::new(2.0)).expect("should evaluate");
        assert!(breakdown.npv_horizon_cad > 0.0, "npv = {}", breakdown.npv_horizon_cad);
        let irr = breakdown.irr.expect("irr should be defined");
        assert!(irr > 0.0 && irr < 1.0, "irr = {irr}");
        let payback = breakdown.simple_payback_years.expect("payback reached");
        assert!(payback > 0.0 && payback < 25.0);
    }

    #[test]
    fn npv_horizons_are_monotonic_for_positive_annual_cashflows() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 400_000.0, 110_000.0, 5_000.0, 80.0, 50.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        assert!(breakdown.npv_20yr_cad > breakdown.npv_10yr_cad);
        assert!(breakdown.npv_25yr_cad > breakdown.npv_20yr_cad);
        assert!(breakdown.npv_30yr_cad > breakdown.npv_25yr_cad);
    }

    #[test]
    fn export_rate_drops_after_full_credit_window() {
        // All value comes from exports; with 24 full-credit months, year 3
        // revenue falls to the cost-of-supply rate (modulo escalation and
        // degradation, which we disable).
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 0.0, 0.0, 115_000.0, 0.0, 0.0);
        let mut a = base_assumptions();
        a.tariff.energy_cad_per_kwh = Some(0.10);
        a.tariff.cost_of_supply_cad_per_kwh = Some(0.04);
        a.tariff.escalation_rate = 0.0;
        a.solar.degradation_rate = 0.0;
        a.costs.om_cad_per_kw_year = 0.0;
        a.incentives = crate::config::IncentiveAssumptions {
            utility_rebate_cad_per_kw: 0.0,
            battery_rebate_cad_per_kwh: 0.0,
            federal_credit_fraction: 0.0,
            tax_rate: 0.0,
            ..Default::default()
        };
        let breakdown =
            evaluate(&config, &s, &a, &FlatPricing::new(2.0)).expect("should evaluate");
        let year2 = breakdown.cashflows_cad[2];
        let year3 = breakdown.cashflows_cad[3];
        assert!((year2 - 115_000.0 * 0.10).abs() < 1e-6);
        assert!((year3 - 115_000.0 * 0.04).abs() < 1e-6);
    }

    #[test]
    fn degradation_shrinks_later_savings() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 400_000.0, 110_000.0, 0.0, 0.0, 0.0);
        let mut a = base_assumptions();
        a.tariff.escalation_rate = 0.0;
        a.costs.om_cad_per_kw_year = 0.0;
        let breakdown =
            evaluate(&config, &s, &a, &FlatPricing::new(2.0)).expect("should evaluate");
        // After incentives stop landing (year > 5), pure degradation decay.
        assert!(breakdown.cashflows_cad[10] > breakdown.cashflows_cad[20]);
    }

    #[test]
    fn lcoe_is_none_without_production() {
        let config = SystemConfiguration::battery_only(100.0, 50.0);
        let s = summary(0.0, 200_000.0, 0.0, 0.0, 50.0, 45.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        assert!(breakdown.lcoe_cad_per_kwh.is_none());
    }

    #[test]
    fn lcoe_is_plausible_for_commercial_pv() {
        let config = SystemConfiguration::pv_only(100.0);
        let s = summary(115_000.0, 400_000.0, 110_000.0, 5_000.0, 0.0, 0.0);
        let breakdown = evaluate(&config, &s, &base_assumptions(), &FlatPricing::new(2.0))
            .expect("should evaluate");
        let lcoe = breakdown.lcoe_cad_per_kwh.expect("produces energy");
        assert!(lcoe > 0.0 && lcoe < 0.5, "lcoe = {lcoe}");
    }

    #[test]
    fn evaluation_is_deterministic() {
        let config = SystemConfiguration::new(100.0, 200.0, 100.0);
        let s = summary(115_000.0, 200_000.0, 110_000.0, 5_000.0, 50.0, 35.0);
        let a = base_assumptions();
        let p = FlatPricing::new(2.0);
        let b1 = evaluate(&config, &s, &a, &p).expect("first");
        let b2 = evaluate(&config, &s, &a, &p).expect("second");
        assert_eq!(b1, b2);
    }
}
