//! Utility tariff table.
//!
//! One shared lookup for rate-code constants. Dispatch, the financial model,
//! and the sweep all resolve tariffs through [`TariffTable::rates_for_code`];
//! nothing else in the crate carries its own rate literals. An explicit
//! override in the assumptions always wins over a code lookup.

use serde::{Deserialize, Serialize};

/// Billing rates for one utility rate code. CAD; fractional $/kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffRates {
    /// Volumetric energy rate (CAD per kWh).
    pub energy_cad_per_kwh: f64,
    /// Demand charge (CAD per kW of monthly peak, per month).
    pub demand_cad_per_kw_month: f64,
    /// Reference "cost of supply" rate (CAD per kWh) credited for exported
    /// energy once the introductory net-metering window has lapsed.
    pub cost_of_supply_cad_per_kwh: f64,
}

/// Rate-code entry: `(code, rates)`.
type TariffEntry = (&'static str, TariffRates);

/// Published business rate codes (Hydro-Québec style).
const TARIFF_TABLE: &[TariffEntry] = &[
    // Small-power business
    (
        "G",
        TariffRates {
            energy_cad_per_kwh: 0.113,
            demand_cad_per_kw_month: 6.21,
            cost_of_supply_cad_per_kwh: 0.0487,
        },
    ),
    // Medium-power business
    (
        "M",
        TariffRates {
            energy_cad_per_kwh: 0.065,
            demand_cad_per_kw_month: 16.89,
            cost_of_supply_cad_per_kwh: 0.0487,
        },
    ),
    // Large-power industrial
    (
        "L",
        TariffRates {
            energy_cad_per_kwh: 0.0441,
            demand_cad_per_kw_month: 14.58,
            cost_of_supply_cad_per_kwh: 0.0487,
        },
    ),
    // Residential
    (
        "D",
        TariffRates {
            energy_cad_per_kwh: 0.0786,
            demand_cad_per_kw_month: 0.0,
            cost_of_supply_cad_per_kwh: 0.0487,
        },
    ),
];

/// Static tariff lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TariffTable;

impl TariffTable {
    /// Returns the published rates for a rate code, or `None` for unknown
    /// codes. Matching is case-insensitive.
    pub fn rates_for_code(code: &str) -> Option<TariffRates> {
        TARIFF_TABLE
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
            .map(|(_, rates)| *rates)
    }

    /// All known rate codes, for error messages.
    pub fn known_codes() -> Vec<&'static str> {
        TARIFF_TABLE.iter().map(|(c, _)| *c).collect()
    }
}
