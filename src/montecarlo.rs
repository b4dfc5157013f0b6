//! Monte Carlo engine over uncertain economic assumptions.
//!
//! Each iteration draws one independent uniform sample per parameter,
//! re-evaluates the scenario through a cheap annualized model (the base
//! dispatch is rescaled analytically; the 8760-hour simulation is *not*
//! re-run per iteration), and records the resulting metrics.
//!
//! Reproducibility is a contract: iteration `i` runs on its own
//! `StdRng::seed_from_u64(seed + i)`, so a result set is bit-identical for a
//! given seed regardless of thread scheduling.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::{AnalysisAssumptions, SampleRange};
use crate::dispatch::{DispatchSummary, SystemConfiguration};
use crate::error::AnalysisError;
use crate::finance;
use crate::pricing::PricingAdapter;

/// Iterations evaluated between cancellation checks.
const CHUNK_SIZE: usize = 64;

/// One drawn parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSample {
    pub tariff_escalation: f64,
    pub discount_rate: f64,
    pub specific_yield_kwh_per_kwp: f64,
    pub bifacial_boost: f64,
    pub om_cad_per_kw_year: f64,
    pub cost_per_watt_multiplier: f64,
}

/// Metrics recorded for one successful iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationOutcome {
    pub sample: ParameterSample,
    pub npv_cad: f64,
    pub irr: Option<f64>,
    pub simple_payback_years: Option<f64>,
    pub lcoe_cad_per_kwh: Option<f64>,
}

/// Distribution summary for one tracked metric, over the iterations where it
/// was defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    /// Iterations contributing to this summary.
    pub samples: usize,
}

impl MetricSummary {
    /// Builds the summary from raw values; `None` when empty.
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let percentile = |p: f64| {
            let index = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
            values[index.min(n - 1)]
        };
        Some(Self {
            mean,
            p10: percentile(10.0),
            p50: percentile(50.0),
            p90: percentile(90.0),
            samples: n,
        })
    }
}

/// Full Monte Carlo output: per-iteration outcomes plus summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// Nominal iteration count from the assumptions.
    pub configured_iterations: usize,
    /// Iterations that produced usable metrics.
    pub used_iterations: usize,
    /// Iterations discarded (non-finite metrics or injected failures).
    pub discarded_iterations: usize,
    /// Seed the batch actually ran with.
    pub seed: u64,
    /// One outcome per successful iteration, in iteration order.
    pub outcomes: Vec<IterationOutcome>,
    pub npv: Option<MetricSummary>,
    pub irr: Option<MetricSummary>,
    pub payback: Option<MetricSummary>,
    pub lcoe: Option<MetricSummary>,
    /// Fraction of used iterations with NPV > 0.
    pub probability_npv_positive: f64,
}

fn draw(rng: &mut StdRng, range: SampleRange) -> f64 {
    range.low + rng.random::<f64>() * (range.high - range.low)
}

/// Pricing wrapper applying a sampled multiplier to the base $/W.
struct ScaledPricing<'a> {
    inner: &'a dyn PricingAdapter,
    multiplier: f64,
}

impl PricingAdapter for ScaledPricing<'_> {
    fn cost_per_watt(&self, capacity_kw: f64) -> f64 {
        self.inner.cost_per_watt(capacity_kw) * self.multiplier
    }

    fn tier_label(&self, capacity_kw: f64) -> &str {
        self.inner.tier_label(capacity_kw)
    }
}

/// Rescales the base dispatch summary to a sampled yield.
///
/// Production, self-consumption, and losses scale linearly with the yield
/// ratio; self-consumption is capped at consumption; exports take the
/// remainder so the balance stays closed. Peak demand reduction is held at
/// the base value. This is the simplified scenario runner: accurate to a few
/// percent against a full re-simulation, at a tiny fraction of the cost.
fn rescale_summary(base: &DispatchSummary, yield_ratio: f64) -> DispatchSummary {
    let production = base.production_kwh * yield_ratio;
    let self_consumption = (base.self_consumption_kwh * yield_ratio).min(base.consumption_kwh);
    let losses = base.battery_losses_kwh * yield_ratio;
    let delta_soc = base.delta_soc_kwh;
    let import = base.consumption_kwh - self_consumption;
    let export = (production + import - base.consumption_kwh - losses - delta_soc).max(0.0);
    DispatchSummary {
        production_kwh: production,
        consumption_kwh: base.consumption_kwh,
        self_consumption_kwh: self_consumption,
        export_kwh: export,
        import_kwh: import,
        battery_losses_kwh: losses,
        delta_soc_kwh: delta_soc,
        peak_demand_before_kw: base.peak_demand_before_kw,
        peak_demand_after_kw: base.peak_demand_after_kw,
        self_sufficiency: if base.consumption_kwh > 0.0 {
            self_consumption / base.consumption_kwh
        } else {
            0.0
        },
    }
}

/// Evaluates one iteration; `None` means the iteration is discarded.
fn run_iteration(
    iteration: u64,
    seed: u64,
    base: &AnalysisAssumptions,
    config: &SystemConfiguration,
    base_summary: &DispatchSummary,
    pricing: &dyn PricingAdapter,
) -> Option<IterationOutcome> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(iteration));
    let mc = &base.monte_carlo;
    let sample = ParameterSample {
        tariff_escalation: draw(&mut rng, mc.tariff_escalation),
        discount_rate: draw(&mut rng, mc.discount_rate),
        specific_yield_kwh_per_kwp: draw(&mut rng, mc.specific_yield),
        bifacial_boost: draw(&mut rng, mc.bifacial_boost),
        om_cad_per_kw_year: draw(&mut rng, mc.om_cad_per_kw_year),
        cost_per_watt_multiplier: draw(&mut rng, mc.cost_per_watt_multiplier),
    };

    // The failure draw is part of the iteration's stream, after the
    // parameter draws, so injection does not perturb sampled values.
    if mc.failure_injection_rate > 0.0 && rng.random::<f64>() < mc.failure_injection_rate {
        log::warn!("monte carlo iteration {iteration} discarded (injected failure)");
        return None;
    }

    let mut perturbed = base.clone();
    perturbed.tariff.escalation_rate = sample.tariff_escalation;
    perturbed.finance.discount_rate = sample.discount_rate;
    perturbed.solar.specific_yield_kwh_per_kwp = sample.specific_yield_kwh_per_kwp;
    perturbed.solar.bifacial_boost = sample.bifacial_boost;
    perturbed.costs.om_cad_per_kw_year = sample.om_cad_per_kw_year;

    let base_yield = base.solar.effective_yield_kwh_per_kwp();
    if !(base_yield > 0.0) {
        log::warn!("monte carlo iteration {iteration} discarded (degenerate base yield)");
        return None;
    }
    let yield_ratio = perturbed.solar.effective_yield_kwh_per_kwp() / base_yield;
    let summary = rescale_summary(base_summary, yield_ratio);

    let scaled_pricing = ScaledPricing {
        inner: pricing,
        multiplier: sample.cost_per_watt_multiplier,
    };

    let breakdown = match finance::evaluate(config, &summary, &perturbed, &scaled_pricing) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("monte carlo iteration {iteration} discarded: {e}");
            return None;
        }
    };

    if !breakdown.npv_horizon_cad.is_finite() {
        log::warn!("monte carlo iteration {iteration} discarded (non-finite NPV)");
        return None;
    }

    Some(IterationOutcome {
        sample,
        npv_cad: breakdown.npv_horizon_cad,
        irr: breakdown.irr,
        simple_payback_years: breakdown.simple_payback_years,
        lcoe_cad_per_kwh: breakdown.lcoe_cad_per_kwh,
    })
}

/// Runs the Monte Carlo batch for a fixed configuration.
///
/// Iterations run in parallel chunks; the cancel token is checked between
/// chunks, never mid-iteration. A failed iteration is discarded and logged
/// rather than aborting the batch, and the used count is reported alongside
/// the configured count.
///
/// # Errors
///
/// Returns [`AnalysisError::Cancelled`] if the token fires.
pub fn run_monte_carlo(
    assumptions: &AnalysisAssumptions,
    config: &SystemConfiguration,
    base_summary: &DispatchSummary,
    pricing: &dyn PricingAdapter,
    cancel: &CancelToken,
) -> Result<MonteCarloResult, AnalysisError> {
    let configured = assumptions.monte_carlo.iterations;
    let seed = assumptions.monte_carlo.seed.unwrap_or(0);

    let indices: Vec<u64> = (0..configured as u64).collect();
    let chunk_results: Vec<Option<Vec<Option<IterationOutcome>>>> = indices
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(
                chunk
                    .iter()
                    .map(|&i| {
                        run_iteration(i, seed, assumptions, config, base_summary, pricing)
                    })
                    .collect(),
            )
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    let outcomes: Vec<IterationOutcome> = chunk_results
        .into_iter()
        .flatten()
        .flatten()
        .flatten()
        .collect();

    let used = outcomes.len();
    let discarded = configured - used;
    if discarded > 0 {
        log::warn!("monte carlo: {discarded} of {configured} iteration(s) discarded");
    }

    let npv_values: Vec<f64> = outcomes.iter().map(|o| o.npv_cad).collect();
    let positive = npv_values.iter().filter(|&&v| v > 0.0).count();

    Ok(MonteCarloResult {
        configured_iterations: configured,
        used_iterations: used,
        discarded_iterations: discarded,
        seed,
        npv: MetricSummary::from_values(npv_values),
        irr: MetricSummary::from_values(outcomes.iter().filter_map(|o| o.irr).collect()),
        payback: MetricSummary::from_values(
            outcomes.iter().filter_map(|o| o.simple_payback_years).collect(),
        ),
        lcoe: MetricSummary::from_values(
            outcomes.iter().filter_map(|o| o.lcoe_cad_per_kwh).collect(),
        ),
        probability_npv_positive: if used > 0 {
            positive as f64 / used as f64
        } else {
            0.0
        },
        outcomes,
    })
}
