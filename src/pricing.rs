//! PV installation pricing.
//!
//! The surrounding product owns the pricing catalog; the engine consumes it
//! through [`PricingAdapter`] as a black box. [`TieredPricing`] is the
//! concrete shape that catalog takes (larger systems buy watts cheaper),
//! and [`FlatPricing`] pins a single $/W for tests and what-if runs.

/// Cost-per-watt source, keyed only on PV capacity.
///
/// Implementations must be pure: the sweep calls these thousands of times
/// from worker threads.
pub trait PricingAdapter: Sync {
    /// Installed PV cost in CAD per watt for a system of `capacity_kw`.
    fn cost_per_watt(&self, capacity_kw: f64) -> f64;

    /// Human-readable label of the tier the capacity falls in.
    fn tier_label(&self, capacity_kw: f64) -> &str;
}

/// One pricing tier: applies to capacities of at least `min_kw`.
#[derive(Debug, Clone)]
pub struct PricingTier {
    pub min_kw: f64,
    pub cad_per_watt: f64,
    pub label: &'static str,
}

/// Size-tiered $/W schedule with a site-condition modifier.
///
/// Tiers are matched from the largest `min_kw` downward; the modifier is a
/// multiplier collected from site-visit conditions (roof complexity, access,
/// structural work) and applied uniformly.
#[derive(Debug, Clone)]
pub struct TieredPricing {
    tiers: Vec<PricingTier>,
    site_modifier: f64,
}

impl TieredPricing {
    /// Builds a schedule from tiers and a site modifier.
    ///
    /// Tiers are sorted by `min_kw` internally; an empty tier list or a
    /// non-positive modifier falls back to [`TieredPricing::default`].
    pub fn new(mut tiers: Vec<PricingTier>, site_modifier: f64) -> Self {
        if tiers.is_empty() || !(site_modifier > 0.0) {
            return Self::default();
        }
        tiers.sort_by(|a, b| a.min_kw.total_cmp(&b.min_kw));
        Self {
            tiers,
            site_modifier,
        }
    }
}

impl Default for TieredPricing {
    /// Commercial rooftop price book, 2024 CAD.
    fn default() -> Self {
        Self {
            tiers: vec![
                PricingTier {
                    min_kw: 0.0,
                    cad_per_watt: 2.85,
                    label: "small (<25 kW)",
                },
                PricingTier {
                    min_kw: 25.0,
                    cad_per_watt: 2.45,
                    label: "mid (25-100 kW)",
                },
                PricingTier {
                    min_kw: 100.0,
                    cad_per_watt: 2.10,
                    label: "commercial (100-500 kW)",
                },
                PricingTier {
                    min_kw: 500.0,
                    cad_per_watt: 1.80,
                    label: "utility (500+ kW)",
                },
            ],
            site_modifier: 1.0,
        }
    }
}

impl PricingAdapter for TieredPricing {
    fn cost_per_watt(&self, capacity_kw: f64) -> f64 {
        let tier = self
            .tiers
            .iter()
            .rev()
            .find(|t| capacity_kw >= t.min_kw)
            .unwrap_or(&self.tiers[0]);
        tier.cad_per_watt * self.site_modifier
    }

    fn tier_label(&self, capacity_kw: f64) -> &str {
        self.tiers
            .iter()
            .rev()
            .find(|t| capacity_kw >= t.min_kw)
            .unwrap_or(&self.tiers[0])
            .label
    }
}

/// Single $/W regardless of size.
#[derive(Debug, Clone, Copy)]
pub struct FlatPricing {
    pub cad_per_watt: f64,
}

impl FlatPricing {
    pub fn new(cad_per_watt: f64) -> Self {
        Self { cad_per_watt }
    }
}

impl PricingAdapter for FlatPricing {
    fn cost_per_watt(&self, _capacity_kw: f64) -> f64 {
        self.cad_per_watt
    }

    fn tier_label(&self, _capacity_kw: f64) -> &str {
        "flat"
    }
}
