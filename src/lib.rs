//! Energy-economics simulation and sizing engine for commercial solar+storage
//! feasibility studies.
//!
//! Pipeline, each stage a pure function of the one before it:
//! raw meter readings → canonical hourly profile → hourly dispatch simulation
//! → multi-year financial metrics → sizing sweep / efficiency frontier →
//! Monte Carlo outcome distribution.
//!
//! Units are fixed crate-wide: kW, kWh, CAD, fractional rates.

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod finance;
pub mod montecarlo;
pub mod pricing;
pub mod profile;
pub mod report;
pub mod sweep;
pub mod tariff;

// Re-export the entry-point types for convenience.
pub use analysis::{AnalysisOutcome, AnalysisRequest, run_analysis};
pub use cancel::CancelToken;
pub use config::AnalysisAssumptions;
pub use error::AnalysisError;
