//! Sizing sweep and efficiency-frontier construction.
//!
//! Explores (PV size, battery size) over four sweep families, evaluating
//! each grid point independently through the dispatch simulator and the
//! financial model. Points are pure functions of immutable inputs, so the
//! grid fans out across worker threads with no shared mutable state; only
//! optimum selection waits on the full set.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::AnalysisAssumptions;
use crate::dispatch::{DispatchInput, DispatchSummary, SystemConfiguration, simulate};
use crate::error::AnalysisError;
use crate::finance::{self, FinancialBreakdown};
use crate::pricing::PricingAdapter;

/// Which sweep family produced a frontier point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepCategory {
    SolarOnly,
    BatteryOnly,
    HybridPvSweep,
    HybridBatterySweep,
}

impl SweepCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SolarOnly => "solar_only",
            Self::BatteryOnly => "battery_only",
            Self::HybridPvSweep => "hybrid_pv_sweep",
            Self::HybridBatterySweep => "hybrid_battery_sweep",
        }
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub configuration: SystemConfiguration,
    pub summary: DispatchSummary,
    pub financials: FinancialBreakdown,
    pub category: SweepCategory,
    /// Set when this point is one of the three selected optima.
    pub is_optimal: bool,
}

/// The complete labeled point cloud plus the three selected optima.
///
/// Optima are indices into `points`, so the flags and the selections cannot
/// disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontier {
    pub points: Vec<FrontierPoint>,
    best_npv_index: Option<usize>,
    best_irr_index: Option<usize>,
    max_self_sufficiency_index: Option<usize>,
}

impl Frontier {
    /// Point with the highest NPV at the configured horizon.
    pub fn best_npv(&self) -> Option<&FrontierPoint> {
        self.best_npv_index.map(|i| &self.points[i])
    }

    /// Point with the highest robust IRR; falls back to the best-NPV point
    /// when every IRR candidate is a degenerate near-zero investment.
    pub fn best_irr(&self) -> Option<&FrontierPoint> {
        self.best_irr_index.map(|i| &self.points[i])
    }

    /// Point with the highest self-sufficiency fraction, independent of
    /// financial return.
    pub fn max_self_sufficiency(&self) -> Option<&FrontierPoint> {
        self.max_self_sufficiency_index.map(|i| &self.points[i])
    }

    /// Points belonging to one sweep family, in grid order.
    pub fn category_points(&self, category: SweepCategory) -> Vec<&FrontierPoint> {
        self.points
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }
}

/// Grid values `0, step, 2*step, ..` up to and including `max` (within float
/// slack).
fn grid_values(max: f64, step: f64) -> Vec<f64> {
    if max < 0.0 || step <= 0.0 {
        return vec![0.0];
    }
    let count = (max / step + 1e-9).floor() as usize;
    (0..=count).map(|i| i as f64 * step).collect()
}

/// Builds the sweep grid: four families of candidate configurations.
///
/// PV sizes are capped at `roof_max_pv_kw`; capacities beyond the roof are
/// never generated. The demand setpoint, when configured on the forced
/// sizing path, is not part of the sweep.
fn build_grid(
    assumptions: &AnalysisAssumptions,
    roof_max_pv_kw: f64,
) -> Vec<(SystemConfiguration, SweepCategory)> {
    let sweep = &assumptions.sweep;
    let pv_top = sweep.pv_max_kw.min(roof_max_pv_kw);
    let power_of = |kwh: f64| kwh * sweep.battery_power_ratio;

    let mut grid = Vec::new();
    for pv in grid_values(pv_top, sweep.pv_step_kw) {
        grid.push((SystemConfiguration::pv_only(pv), SweepCategory::SolarOnly));
    }
    for kwh in grid_values(sweep.battery_max_kwh, sweep.battery_step_kwh) {
        grid.push((
            SystemConfiguration::battery_only(kwh, power_of(kwh)),
            SweepCategory::BatteryOnly,
        ));
    }
    let hybrid_kwh = sweep.hybrid_battery_kwh;
    for pv in grid_values(pv_top, sweep.pv_step_kw) {
        grid.push((
            SystemConfiguration::new(pv, hybrid_kwh, power_of(hybrid_kwh)),
            SweepCategory::HybridPvSweep,
        ));
    }
    let hybrid_pv = sweep.hybrid_pv_kw.min(pv_top);
    for kwh in grid_values(sweep.battery_max_kwh, sweep.battery_step_kwh) {
        grid.push((
            SystemConfiguration::new(hybrid_pv, kwh, power_of(kwh)),
            SweepCategory::HybridBatterySweep,
        ));
    }
    grid
}

/// Runs the full sizing sweep and selects the optimal scenarios.
///
/// Each grid point is evaluated independently in parallel. A point that
/// fails to evaluate is logged and skipped without aborting the batch; the
/// batch itself only aborts on cancellation.
///
/// # Errors
///
/// Returns [`AnalysisError::Cancelled`] if the token fires, or
/// [`AnalysisError::InfeasibleConfiguration`] when no grid point at all
/// could be evaluated.
pub fn build_frontier(
    input: &DispatchInput<'_>,
    assumptions: &AnalysisAssumptions,
    pricing: &dyn PricingAdapter,
    roof_max_pv_kw: f64,
    cancel: &CancelToken,
) -> Result<Frontier, AnalysisError> {
    let grid = build_grid(assumptions, roof_max_pv_kw);

    let evaluated: Vec<Option<FrontierPoint>> = grid
        .par_iter()
        .map(|(config, category)| {
            if cancel.is_cancelled() {
                return None;
            }
            match evaluate_point(input, assumptions, pricing, config, *category) {
                Ok(point) => Some(point),
                Err(e) => {
                    log::warn!(
                        "skipping sweep point (pv={} kW, battery={} kWh): {e}",
                        config.pv_kw,
                        config.battery_kwh
                    );
                    None
                }
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    let mut points: Vec<FrontierPoint> = evaluated.into_iter().flatten().collect();
    if points.is_empty() {
        return Err(AnalysisError::infeasible(
            "no sweep grid point could be evaluated",
        ));
    }

    let best_npv_index = select_best_npv(&points);
    let best_irr_index =
        select_best_irr(&points, assumptions.sweep.irr_min_capex_cad).or(best_npv_index);
    let max_self_sufficiency_index = select_max_self_sufficiency(&points);

    for index in [best_npv_index, best_irr_index, max_self_sufficiency_index]
        .into_iter()
        .flatten()
    {
        points[index].is_optimal = true;
    }

    Ok(Frontier {
        points,
        best_npv_index,
        best_irr_index,
        max_self_sufficiency_index,
    })
}

fn evaluate_point(
    input: &DispatchInput<'_>,
    assumptions: &AnalysisAssumptions,
    pricing: &dyn PricingAdapter,
    config: &SystemConfiguration,
    category: SweepCategory,
) -> Result<FrontierPoint, AnalysisError> {
    let dispatch = simulate(input, config)?;
    let financials = finance::evaluate(config, &dispatch.summary, assumptions, pricing)?;
    Ok(FrontierPoint {
        configuration: config.clone(),
        summary: dispatch.summary,
        financials,
        category,
        is_optimal: false,
    })
}

/// Maximum NPV at the configured horizon; ties break toward lower CAPEX.
fn select_best_npv(points: &[FrontierPoint]) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.financials
                .npv_horizon_cad
                .total_cmp(&b.financials.npv_horizon_cad)
                .then(
                    // reversed: lower CAPEX wins the tie
                    b.financials
                        .gross_capex_cad
                        .total_cmp(&a.financials.gross_capex_cad),
                )
        })
        .map(|(i, _)| i)
}

/// Maximum defined IRR among points whose investment is large enough to be
/// meaningful. Returns `None` when no such point exists; the caller then
/// falls back to the best-NPV point rather than surfacing a misleading
/// tiny-system IRR.
fn select_best_irr(points: &[FrontierPoint], min_capex_cad: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            p.financials.irr.is_some() && p.financials.gross_capex_cad >= min_capex_cad
        })
        .max_by(|(_, a), (_, b)| {
            let irr_a = a.financials.irr.unwrap_or(f64::NEG_INFINITY);
            let irr_b = b.financials.irr.unwrap_or(f64::NEG_INFINITY);
            irr_a.total_cmp(&irr_b).then(
                a.financials
                    .npv_horizon_cad
                    .total_cmp(&b.financials.npv_horizon_cad),
            )
        })
        .map(|(i, _)| i)
}

/// Highest self-sufficiency fraction; ties break toward lower CAPEX.
fn select_max_self_sufficiency(points: &[FrontierPoint]) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.summary
                .self_sufficiency
                .total_cmp(&b.summary.self_sufficiency)
                .then(
                    b.financials
                        .gross_capex_cad
                        .total_cmp(&a.financials.gross_capex_cad),
                )
        })
        .map(|(i, _)| i)
}
