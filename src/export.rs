//! CSV export for frontier points and cashflow series.
//!
//! Stable column schemas, deterministic output for identical inputs.
//! Undefined metrics (IRR with no root, payback never reached) export as
//! empty fields, never as numeric sentinels.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::finance::{FinancialBreakdown, incentives_in_year_cad};
use crate::sweep::Frontier;

/// Schema v1 column header for frontier export.
pub const FRONTIER_SCHEMA_V1_HEADER: &str = "category,pv_kw,battery_kwh,battery_kw,\
     gross_capex_cad,net_capex_cad,npv_horizon_cad,irr,simple_payback_years,\
     lcoe_cad_per_kwh,self_sufficiency,production_kwh,self_consumption_kwh,\
     export_kwh,peak_reduction_kw,is_optimal";

/// Schema v1 column header for cashflow export.
pub const CASHFLOW_SCHEMA_V1_HEADER: &str =
    "year,cashflow_cad,cumulative_cad,incentives_cad";

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Writes the frontier point cloud as CSV to any writer.
///
/// One row per evaluated point, in sweep order.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_frontier_csv<W: Write>(writer: W, frontier: &Frontier) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(FRONTIER_SCHEMA_V1_HEADER.split(',').map(str::trim))?;

    for p in &frontier.points {
        wtr.write_record(&[
            p.category.as_str().to_string(),
            format!("{:.3}", p.configuration.pv_kw),
            format!("{:.3}", p.configuration.battery_kwh),
            format!("{:.3}", p.configuration.battery_kw),
            format!("{:.2}", p.financials.gross_capex_cad),
            format!("{:.2}", p.financials.net_capex_cad),
            format!("{:.2}", p.financials.npv_horizon_cad),
            fmt_opt(p.financials.irr),
            fmt_opt(p.financials.simple_payback_years),
            fmt_opt(p.financials.lcoe_cad_per_kwh),
            format!("{:.6}", p.summary.self_sufficiency),
            format!("{:.3}", p.summary.production_kwh),
            format!("{:.3}", p.summary.self_consumption_kwh),
            format!("{:.3}", p.summary.export_kwh),
            format!("{:.3}", p.summary.peak_reduction_kw()),
            p.is_optimal.to_string(),
        ])?;
    }

    wtr.flush()
}

/// Writes the year-indexed cashflow series as CSV to any writer.
///
/// The incentive column reuses the same event schedule the scalar metrics
/// were computed from, so a chart built from this file cannot drift from the
/// reported NPV/IRR.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_cashflow_csv<W: Write>(
    writer: W,
    breakdown: &FinancialBreakdown,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(CASHFLOW_SCHEMA_V1_HEADER.split(',').map(str::trim))?;

    let mut cumulative = 0.0;
    for (year, cf) in breakdown.cashflows_cad.iter().enumerate() {
        cumulative += cf;
        wtr.write_record(&[
            year.to_string(),
            format!("{cf:.2}"),
            format!("{cumulative:.2}"),
            format!(
                "{:.2}",
                incentives_in_year_cad(&breakdown.incentives, year as u32)
            ),
        ])?;
    }

    wtr.flush()
}

/// Exports the frontier to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_frontier_csv(frontier: &Frontier, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_frontier_csv(BufWriter::new(file), frontier)
}

/// Exports a cashflow series to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_cashflow_csv(breakdown: &FinancialBreakdown, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_cashflow_csv(BufWriter::new(file), breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::config::AnalysisAssumptions;
    use crate::dispatch::{DispatchInput, PvShape, SystemConfiguration};
    use crate::finance;
    use crate::pricing::FlatPricing;
    use crate::profile::{HOURS_PER_YEAR, HourlyProfile};
    use crate::sweep::build_frontier;

    fn profile() -> HourlyProfile {
        HourlyProfile {
            consumption_kwh: vec![20.0; HOURS_PER_YEAR],
            demand_kw: vec![25.0; HOURS_PER_YEAR],
            interpolated_months: Vec::new(),
            coverage_days: 365,
        }
    }

    fn tiny_frontier() -> Frontier {
        let profile = profile();
        let shape = PvShape::representative();
        let mut a = AnalysisAssumptions::default();
        a.sweep.pv_max_kw = 50.0;
        a.sweep.pv_step_kw = 50.0;
        a.sweep.battery_max_kwh = 50.0;
        a.sweep.battery_step_kwh = 50.0;
        a.sweep.hybrid_battery_kwh = 50.0;
        a.sweep.hybrid_pv_kw = 50.0;
        let input = DispatchInput {
            profile: &profile,
            shape: &shape,
            effective_yield_kwh_per_kwp: 1150.0,
            battery: &a.battery,
        };
        build_frontier(
            &input,
            &a,
            &FlatPricing::new(2.0),
            1000.0,
            &CancelToken::new(),
        )
        .expect("tiny sweep succeeds")
    }

    #[test]
    fn frontier_header_matches_schema_v1() {
        let frontier = tiny_frontier();
        let mut buf = Vec::new();
        write_frontier_csv(&mut buf, &frontier).expect("export succeeds");
        let output = String::from_utf8(buf).expect("valid UTF-8");
        let first_line = output.lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "category,pv_kw,battery_kwh,battery_kw,gross_capex_cad,net_capex_cad,\
             npv_horizon_cad,irr,simple_payback_years,lcoe_cad_per_kwh,\
             self_sufficiency,production_kwh,self_consumption_kwh,export_kwh,\
             peak_reduction_kw,is_optimal"
        );
    }

    #[test]
    fn frontier_row_count_matches_point_count() {
        let frontier = tiny_frontier();
        let mut buf = Vec::new();
        write_frontier_csv(&mut buf, &frontier).expect("export succeeds");
        let output = String::from_utf8(buf).expect("valid UTF-8");
        assert_eq!(output.lines().count(), frontier.points.len() + 1);
    }

    #[test]
    fn frontier_export_is_deterministic() {
        let frontier = tiny_frontier();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_frontier_csv(&mut buf1, &frontier).expect("first export");
        write_frontier_csv(&mut buf2, &frontier).expect("second export");
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn undefined_metrics_export_as_empty_fields() {
        // A zero-size point has no IRR, payback, or LCOE.
        let frontier = tiny_frontier();
        let zero = frontier
            .points
            .iter()
            .find(|p| p.configuration.pv_kw == 0.0 && p.configuration.battery_kwh == 0.0)
            .expect("zero point exists");
        assert!(zero.financials.irr.is_none());

        let mut buf = Vec::new();
        write_frontier_csv(&mut buf, &frontier).expect("export succeeds");
        let output = String::from_utf8(buf).expect("valid UTF-8");
        let zero_row = output
            .lines()
            .find(|l| l.starts_with("solar_only,0.000,0.000"))
            .expect("zero row present");
        // irr column (8th, index 7) is empty
        let fields: Vec<&str> = zero_row.split(',').collect();
        assert_eq!(fields[7], "");
    }

    #[test]
    fn cashflow_rows_cover_every_year_and_accumulate() {
        let profile = profile();
        let shape = PvShape::representative();
        let a = AnalysisAssumptions::default();
        let input = DispatchInput {
            profile: &profile,
            shape: &shape,
            effective_yield_kwh_per_kwp: 1150.0,
            battery: &a.battery,
        };
        let config = SystemConfiguration::pv_only(100.0);
        let dispatch = crate::dispatch::simulate(&input, &config).expect("simulates");
        let breakdown =
            finance::evaluate(&config, &dispatch.summary, &a, &FlatPricing::new(2.0))
                .expect("evaluates");

        let mut buf = Vec::new();
        write_cashflow_csv(&mut buf, &breakdown).expect("export succeeds");
        let output = String::from_utf8(buf).expect("valid UTF-8");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], CASHFLOW_SCHEMA_V1_HEADER);
        assert_eq!(lines.len(), breakdown.cashflows_cad.len() + 1);

        // cumulative of the last row equals the sum of all cashflows
        let last: Vec<&str> = lines.last().expect("has rows").split(',').collect();
        let cumulative: f64 = last[2].parse().expect("parses");
        let expected: f64 = breakdown.cashflows_cad.iter().sum();
        assert!((cumulative - expected).abs() < 0.01);
    }
}
