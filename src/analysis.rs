//! Single-run orchestration: profile → dispatch → finance → sweep → Monte
//! Carlo.
//!
//! This is the engine's entry point for the surrounding product. Everything
//! downstream of the meter readings is recomputed end-to-end on every call:
//! a changed assumption invalidates the whole chain, which is re-run, never
//! patched.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::AnalysisAssumptions;
use crate::dispatch::{
    DispatchInput, DispatchSummary, PvShape, SystemConfiguration, simulate,
};
use crate::error::AnalysisError;
use crate::finance::{self, FinancialBreakdown};
use crate::montecarlo::{MonteCarloResult, run_monte_carlo};
use crate::pricing::PricingAdapter;
use crate::profile::{MeterReading, build_profile};
use crate::sweep::{Frontier, build_frontier};

/// Everything the caller supplies for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Raw interval readings for the representative year.
    pub readings: Vec<MeterReading>,
    /// Economic and technical assumptions.
    pub assumptions: AnalysisAssumptions,
    /// Roof-area-derived maximum PV capacity (kW), computed externally from
    /// traced polygons.
    pub roof_max_pv_kw: f64,
    /// When set, evaluate exactly this configuration instead of sweeping.
    pub forced_sizing: Option<SystemConfiguration>,
    /// Optional site-measured PV shape; the built-in representative shape is
    /// used when absent.
    pub pv_shape: Option<PvShape>,
    /// Caller's job-deduplication key, echoed on the result untouched. The
    /// engine keeps no ambient dedup state.
    pub idempotency_key: Option<String>,
}

impl AnalysisRequest {
    pub fn new(readings: Vec<MeterReading>, assumptions: AnalysisAssumptions) -> Self {
        Self {
            readings,
            assumptions,
            roof_max_pv_kw: f64::MAX,
            forced_sizing: None,
            pv_shape: None,
            idempotency_key: None,
        }
    }
}

/// Profile facts the reporting layer needs to label the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub annual_consumption_kwh: f64,
    pub peak_demand_kw: f64,
    pub coverage_days: usize,
    /// 1-based months synthesized from neighbors; non-empty means the end
    /// user should discount confidence accordingly.
    pub interpolated_months: Vec<u32>,
}

/// The selected scenario: sizing, annual dispatch metrics, and financials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub configuration: SystemConfiguration,
    pub dispatch: DispatchSummary,
    pub financials: FinancialBreakdown,
}

/// Full output bundle consumed by the reporting/UI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Echo of the request's idempotency key.
    pub idempotency_key: Option<String>,
    pub profile: ProfileSummary,
    /// The recommended scenario: the forced sizing when one was requested,
    /// otherwise the sweep's best-NPV point.
    pub scenario: ScenarioResult,
    /// `None` on the forced-sizing path.
    pub frontier: Option<Frontier>,
    /// Outcome distribution for the selected scenario.
    pub monte_carlo: MonteCarloResult,
}

/// Runs the complete analysis.
///
/// Stage failures (profile, dispatch, finance) abort with context; failures
/// of individual sweep points or Monte Carlo iterations are contained inside
/// their batches.
///
/// # Errors
///
/// - [`AnalysisError::Config`] for invalid assumptions,
/// - [`AnalysisError::InsufficientData`] for thin meter coverage,
/// - [`AnalysisError::InfeasibleConfiguration`] when a forced sizing exceeds
///   the roof capacity,
/// - [`AnalysisError::Cancelled`] when the token fires mid-batch.
pub fn run_analysis(
    request: &AnalysisRequest,
    pricing: &dyn PricingAdapter,
    cancel: &CancelToken,
) -> Result<AnalysisOutcome, AnalysisError> {
    let assumptions = &request.assumptions;
    let errors = assumptions.validate();
    if !errors.is_empty() {
        return Err(AnalysisError::Config(errors));
    }
    if request.roof_max_pv_kw.is_nan() || request.roof_max_pv_kw < 0.0 {
        return Err(AnalysisError::invalid_input(
            "roof_max_pv_kw",
            "must be a non-negative number",
        ));
    }

    let profile = build_profile(&request.readings, &assumptions.profile)?;
    let profile_summary = ProfileSummary {
        annual_consumption_kwh: profile.annual_consumption_kwh(),
        peak_demand_kw: profile.peak_demand_kw(),
        coverage_days: profile.coverage_days,
        interpolated_months: profile.interpolated_months.clone(),
    };

    let default_shape;
    let shape = match &request.pv_shape {
        Some(shape) => shape,
        None => {
            default_shape = PvShape::representative();
            &default_shape
        }
    };
    let input = DispatchInput {
        profile: &profile,
        shape,
        effective_yield_kwh_per_kwp: assumptions.solar.effective_yield_kwh_per_kwp(),
        battery: &assumptions.battery,
    };

    let (scenario, frontier) = match &request.forced_sizing {
        Some(config) => {
            config.validate()?;
            if config.pv_kw > request.roof_max_pv_kw {
                return Err(AnalysisError::infeasible(format!(
                    "requested {} kW of PV exceeds the roof capacity of {} kW",
                    config.pv_kw, request.roof_max_pv_kw
                )));
            }
            let dispatch = simulate(&input, config)?;
            let financials =
                finance::evaluate(config, &dispatch.summary, assumptions, pricing)?;
            (
                ScenarioResult {
                    configuration: config.clone(),
                    dispatch: dispatch.summary,
                    financials,
                },
                None,
            )
        }
        None => {
            let frontier =
                build_frontier(&input, assumptions, pricing, request.roof_max_pv_kw, cancel)?;
            let best = frontier.best_npv().ok_or_else(|| {
                AnalysisError::infeasible("sweep produced no rankable configuration")
            })?;
            let scenario = ScenarioResult {
                configuration: best.configuration.clone(),
                dispatch: best.summary,
                financials: best.financials.clone(),
            };
            (scenario, Some(frontier))
        }
    };

    let monte_carlo = run_monte_carlo(
        assumptions,
        &scenario.configuration,
        &scenario.dispatch,
        pricing,
        cancel,
    )?;

    Ok(AnalysisOutcome {
        idempotency_key: request.idempotency_key.clone(),
        profile: profile_summary,
        scenario,
        frontier,
        monte_carlo,
    })
}
