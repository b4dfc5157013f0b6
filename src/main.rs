//! Feasibility engine demo binary — CLI wiring around the analysis entry
//! point.
//!
//! Raw meter-file parsing belongs to the surrounding product, so this binary
//! synthesizes a year of demonstration readings (seeded sinusoidal load with
//! noise) and runs the full analysis on them.

use std::path::Path;
use std::process;

use chrono::NaiveDate;
use rand::{Rng, SeedableRng, rngs::StdRng};

use solfin_sim::analysis::{AnalysisRequest, run_analysis};
use solfin_sim::cancel::CancelToken;
use solfin_sim::config::AnalysisAssumptions;
use solfin_sim::dispatch::SystemConfiguration;
use solfin_sim::export::{export_cashflow_csv, export_frontier_csv};
use solfin_sim::pricing::TieredPricing;
use solfin_sim::profile::MeterReading;
use solfin_sim::report::print_outcome;

/// Demand registers read above the hourly average; synthetic demand applies
/// this within-hour peak factor.
const DEMAND_PEAK_FACTOR: f64 = 1.2;

/// Parsed CLI arguments.
struct CliArgs {
    assumptions_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    roof_max_kw: f64,
    forced_pv_kw: Option<f64>,
    forced_battery_kwh: Option<f64>,
    forced_battery_kw: Option<f64>,
    demand_setpoint_kw: Option<f64>,
    frontier_out: Option<String>,
    cashflow_out: Option<String>,
}

fn print_help() {
    eprintln!("solfin-sim — solar+storage feasibility engine (demo driver)");
    eprintln!();
    eprintln!("Usage: solfin-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --assumptions <path>     Load assumptions from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (quebec_commercial, net_zero)");
    eprintln!("  --seed <u64>             Override the Monte Carlo seed");
    eprintln!("  --roof-max <kw>          Roof-area-derived maximum PV capacity");
    eprintln!("  --pv <kw>                Force a specific PV size (skips the sweep)");
    eprintln!("  --battery-kwh <kwh>      Forced battery energy (with --pv)");
    eprintln!("  --battery-kw <kw>        Forced battery power (with --pv)");
    eprintln!("  --setpoint <kw>          Demand-shaving setpoint for the forced sizing");
    eprintln!("  --frontier-out <path>    Export swept frontier points to CSV");
    eprintln!("  --cashflow-out <path>    Export the scenario cashflow series to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Without --assumptions or --preset, the quebec_commercial preset is used.");
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str, kind: &str) -> T {
    let Some(raw) = args.get(i) else {
        eprintln!("error: {flag} requires a {kind} argument");
        process::exit(1);
    };
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("error: {flag} value \"{raw}\" is not a valid {kind}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        assumptions_path: None,
        preset: None,
        seed_override: None,
        roof_max_kw: 500.0,
        forced_pv_kw: None,
        forced_battery_kwh: None,
        forced_battery_kw: None,
        demand_setpoint_kw: None,
        frontier_out: None,
        cashflow_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--assumptions" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --assumptions requires a path argument");
                    process::exit(1);
                };
                cli.assumptions_path = Some(path.clone());
            }
            "--preset" => {
                i += 1;
                let Some(name) = args.get(i) else {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                };
                cli.preset = Some(name.clone());
            }
            "--seed" => {
                i += 1;
                cli.seed_override = Some(parse_value(&args, i, "--seed", "u64"));
            }
            "--roof-max" => {
                i += 1;
                cli.roof_max_kw = parse_value(&args, i, "--roof-max", "number");
            }
            "--pv" => {
                i += 1;
                cli.forced_pv_kw = Some(parse_value(&args, i, "--pv", "number"));
            }
            "--battery-kwh" => {
                i += 1;
                cli.forced_battery_kwh = Some(parse_value(&args, i, "--battery-kwh", "number"));
            }
            "--battery-kw" => {
                i += 1;
                cli.forced_battery_kw = Some(parse_value(&args, i, "--battery-kw", "number"));
            }
            "--setpoint" => {
                i += 1;
                cli.demand_setpoint_kw = Some(parse_value(&args, i, "--setpoint", "number"));
            }
            "--frontier-out" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --frontier-out requires a path argument");
                    process::exit(1);
                };
                cli.frontier_out = Some(path.clone());
            }
            "--cashflow-out" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --cashflow-out requires a path argument");
                    process::exit(1);
                };
                cli.cashflow_out = Some(path.clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Gaussian noise via Box-Muller.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

/// Synthesizes one representative year of hourly commercial readings:
/// a daytime-peaking sinusoid on top of a seasonal swing, plus seeded noise.
fn synthetic_demo_readings(seed: u64) -> Vec<MeterReading> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut readings = Vec::with_capacity(8760);

    let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date");
    let end = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let mut day_index = 0f64;
    while date < end {
        let seasonal = 1.0 + 0.15 * (2.0 * std::f64::consts::PI * (day_index - 20.0) / 365.0).cos();
        for hour in 0..24u32 {
            let day_pos = hour as f64 / 24.0;
            let diurnal = (2.0 * std::f64::consts::PI * day_pos + 4.0).sin();
            let kwh = ((60.0 + 25.0 * diurnal) * seasonal + gaussian_noise(&mut rng, 2.0)).max(0.0);
            let demand = kwh * DEMAND_PEAK_FACTOR;
            readings.push(MeterReading::hourly(
                date.and_hms_opt(hour, 0, 0).expect("valid time"),
                kwh,
                demand,
            ));
        }
        date = date.succ_opt().expect("next day");
        day_index += 1.0;
    }
    readings
}

fn main() {
    env_logger::init();
    let cli = parse_args();

    // Load assumptions: --assumptions takes priority, then --preset, then the
    // default preset.
    let mut assumptions = if let Some(ref path) = cli.assumptions_path {
        match AnalysisAssumptions::from_toml_file(Path::new(path)) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match AnalysisAssumptions::from_preset(name) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        AnalysisAssumptions::quebec_commercial()
    };

    if let Some(seed) = cli.seed_override {
        assumptions.monte_carlo.seed = Some(seed);
    }

    let errors = assumptions.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let forced_sizing = cli.forced_pv_kw.map(|pv| {
        let mut config = SystemConfiguration::new(
            pv,
            cli.forced_battery_kwh.unwrap_or(0.0),
            cli.forced_battery_kw.unwrap_or(0.0),
        );
        if let Some(setpoint) = cli.demand_setpoint_kw {
            config = config.with_demand_setpoint(setpoint);
        }
        config
    });

    let mut request = AnalysisRequest::new(synthetic_demo_readings(42), assumptions);
    request.roof_max_pv_kw = cli.roof_max_kw;
    request.forced_sizing = forced_sizing;

    let pricing = TieredPricing::default();
    let outcome = match run_analysis(&request, &pricing, &CancelToken::new()) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("analysis failed: {e}");
            process::exit(1);
        }
    };

    print_outcome(&outcome);

    if let Some(ref path) = cli.frontier_out {
        match &outcome.frontier {
            Some(frontier) => {
                if let Err(e) = export_frontier_csv(frontier, Path::new(path)) {
                    eprintln!("error: failed to write frontier CSV: {e}");
                    process::exit(1);
                }
                eprintln!("Frontier written to {path}");
            }
            None => eprintln!("note: forced sizing produced no frontier, skipping {path}"),
        }
    }

    if let Some(ref path) = cli.cashflow_out {
        if let Err(e) = export_cashflow_csv(&outcome.scenario.financials, Path::new(path)) {
            eprintln!("error: failed to write cashflow CSV: {e}");
            process::exit(1);
        }
        eprintln!("Cashflow series written to {path}");
    }
}
