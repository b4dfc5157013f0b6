//! Plain-text reporting for the CLI and logs.

use std::fmt;

use crate::analysis::{AnalysisOutcome, ProfileSummary, ScenarioResult};
use crate::montecarlo::{MetricSummary, MonteCarloResult};
use crate::sweep::Frontier;

fn fmt_opt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn fmt_opt_years(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1} yr"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn fmt_opt_rate(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4} $/kWh"))
        .unwrap_or_else(|| "n/a".to_string())
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.configuration;
        let d = &self.dispatch;
        let fin = &self.financials;
        writeln!(f, "--- Recommended scenario ---")?;
        writeln!(
            f,
            "Sizing:              {:.0} kW PV / {:.0} kWh / {:.0} kW battery",
            c.pv_kw, c.battery_kwh, c.battery_kw
        )?;
        writeln!(f, "Annual production:   {:.0} kWh", d.production_kwh)?;
        writeln!(
            f,
            "Self-consumption:    {:.0} kWh ({:.1}% of load)",
            d.self_consumption_kwh,
            d.self_sufficiency * 100.0
        )?;
        writeln!(f, "Annual export:       {:.0} kWh", d.export_kwh)?;
        writeln!(
            f,
            "Peak demand:         {:.1} kW -> {:.1} kW",
            d.peak_demand_before_kw, d.peak_demand_after_kw
        )?;
        writeln!(
            f,
            "CAPEX:               ${:.0} gross / ${:.0} net ({} @ ${:.2}/W)",
            fin.gross_capex_cad, fin.net_capex_cad, fin.pricing_tier, fin.cost_per_watt_cad
        )?;
        writeln!(f, "NPV (horizon):       ${:.0}", fin.npv_horizon_cad)?;
        writeln!(
            f,
            "NPV 10/20/25/30 yr:  ${:.0} / ${:.0} / ${:.0} / ${:.0}",
            fin.npv_10yr_cad, fin.npv_20yr_cad, fin.npv_25yr_cad, fin.npv_30yr_cad
        )?;
        writeln!(f, "IRR:                 {}", fmt_opt_pct(fin.irr))?;
        writeln!(
            f,
            "Simple payback:      {}",
            fmt_opt_years(fin.simple_payback_years)
        )?;
        writeln!(f, "LCOE:                {}", fmt_opt_rate(fin.lcoe_cad_per_kwh))?;
        write!(
            f,
            "CO2 avoided:         {:.1} t over the horizon",
            fin.co2_avoided_tonnes
        )
    }
}

/// Prints the profile facts, flagging interpolated months.
pub fn print_profile_report(profile: &ProfileSummary) {
    println!("--- Meter profile ---");
    println!(
        "Annual consumption:  {:.0} kWh (peak {:.1} kW, {} days of real data)",
        profile.annual_consumption_kwh, profile.peak_demand_kw, profile.coverage_days
    );
    if profile.interpolated_months.is_empty() {
        println!("Coverage:            all twelve months have real readings");
    } else {
        let months: Vec<String> = profile
            .interpolated_months
            .iter()
            .map(u32::to_string)
            .collect();
        println!(
            "Coverage:            month(s) {} synthesized from neighbors; \
             treat results with reduced confidence",
            months.join(", ")
        );
    }
}

/// Prints the three selected optima of a frontier.
pub fn print_frontier_report(frontier: &Frontier) {
    println!("--- Sizing frontier ({} points) ---", frontier.points.len());
    for (label, point) in [
        ("Best NPV", frontier.best_npv()),
        ("Best IRR", frontier.best_irr()),
        ("Max autonomy", frontier.max_self_sufficiency()),
    ] {
        if let Some(p) = point {
            println!(
                "{label:<14} {:>5.0} kW PV / {:>5.0} kWh battery | NPV ${:>10.0} | IRR {:>8} | self-suff {:>5.1}%",
                p.configuration.pv_kw,
                p.configuration.battery_kwh,
                p.financials.npv_horizon_cad,
                fmt_opt_pct(p.financials.irr),
                p.summary.self_sufficiency * 100.0,
            );
        }
    }
}

fn print_metric_line(name: &str, unit: &str, summary: Option<&MetricSummary>) {
    match summary {
        Some(s) => println!(
            "{name:<9} mean {:>12.2}{unit} | p10 {:>12.2}{unit} | p50 {:>12.2}{unit} | p90 {:>12.2}{unit} ({} samples)",
            s.mean, s.p10, s.p50, s.p90, s.samples
        ),
        None => println!("{name:<9} n/a"),
    }
}

/// Prints the Monte Carlo distribution summary.
pub fn print_monte_carlo_report(mc: &MonteCarloResult) {
    println!(
        "--- Monte Carlo ({} of {} iterations used, {} discarded, seed {}) ---",
        mc.used_iterations, mc.configured_iterations, mc.discarded_iterations, mc.seed
    );
    print_metric_line("NPV", " $", mc.npv.as_ref());
    print_metric_line("IRR", "", mc.irr.as_ref());
    print_metric_line("Payback", " yr", mc.payback.as_ref());
    print_metric_line("LCOE", " $/kWh", mc.lcoe.as_ref());
    println!(
        "P(NPV > 0):  {:.1}%",
        mc.probability_npv_positive * 100.0
    );
}

/// Prints the complete analysis outcome.
pub fn print_outcome(outcome: &AnalysisOutcome) {
    print_profile_report(&outcome.profile);
    println!();
    println!("{}", outcome.scenario);
    if let Some(frontier) = &outcome.frontier {
        println!();
        print_frontier_report(frontier);
    }
    println!();
    print_monte_carlo_report(&outcome.monte_carlo);
}
