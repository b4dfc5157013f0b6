//! Failure taxonomy for the analysis engine.
//!
//! Invalid input yields a typed error, never a panic escaping to the caller
//! boundary. Numerically undefined metrics (IRR with no sign change, LCOE
//! with zero production) are *not* errors; they are `Option<f64>` fields on
//! the result types.

use std::fmt;

use thiserror::Error;

/// Validation error for a single assumption field, with a dotted field path.
#[derive(Debug, Clone, Error)]
#[error("config error: {field} — {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"finance.discount_rate"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that abort an analysis run.
///
/// Stage 1–3 failures (profile, dispatch, finance) surface as one of these;
/// per-point failures inside the sweep and per-iteration failures inside
/// Monte Carlo are contained and reported in their result objects instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Too little real meter coverage to build a reliable profile.
    ///
    /// The caller decides whether to re-run with a lower threshold and label
    /// the output as synthetic; the engine never fabricates a year silently.
    #[error(
        "insufficient meter data: {coverage_days} day(s) with real readings, \
         at least {required_days} required"
    )]
    InsufficientData {
        coverage_days: usize,
        required_days: usize,
    },

    /// A requested system size violates a physical constraint.
    #[error("infeasible configuration: {reason}")]
    InfeasibleConfiguration { reason: String },

    /// A caller-supplied value is malformed (negative capacity, NaN tariff…).
    #[error("invalid input: {field} — {message}")]
    InvalidInput { field: String, message: String },

    /// One or more assumption fields failed validation.
    #[error("invalid assumptions: {}", format_config_errors(.0))]
    Config(Vec<ConfigError>),

    /// The caller's cancellation token was triggered mid-batch.
    #[error("analysis cancelled by caller")]
    Cancelled,
}

impl AnalysisError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infeasible(reason: impl fmt::Display) -> Self {
        Self::InfeasibleConfiguration {
            reason: reason.to_string(),
        }
    }
}

fn format_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_both_counts() {
        let err = AnalysisError::InsufficientData {
            coverage_days: 12,
            required_days: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn config_errors_join_into_one_message() {
        let err = AnalysisError::Config(vec![
            ConfigError::new("finance.discount_rate", "must be in [0, 1)"),
            ConfigError::new("solar.specific_yield_kwh_per_kwp", "must be > 0"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("finance.discount_rate"));
        assert!(msg.contains("solar.specific_yield_kwh_per_kwp"));
    }
}
