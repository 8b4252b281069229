use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

// ============================================================================
// Scalars
// ============================================================================

/// Units allocated to a category.
pub type Quantity = u32;

/// Unit price (pre-tax).
pub type Price = f64;

/// Position of a category in the allocation vector. The unknown category is
/// always the last index.
pub type CategoryIndex = usize;

/// One quantity per category, in index order.
pub type AllocationVector = Vec<Quantity>;

/// Sum of an allocation, widened so it cannot overflow.
pub fn total_of(quantities: &[Quantity]) -> u64 {
    quantities.iter().map(|&q| u64::from(q)).sum()
}

// ============================================================================
// Price Range - Target window for the derived unknown price
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct PriceRange {
    pub low: Price,
    pub high: Price,
}

impl PriceRange {
    pub fn new(low: Price, high: Price) -> Self {
        Self { low, high }
    }

    /// Range spanning the cheapest and dearest known prices.
    ///
    /// Returns `None` for an empty list or when any price is not finite.
    pub fn from_known_prices(prices: &[Price]) -> Option<Self> {
        if prices.iter().any(|p| !p.is_finite()) {
            return None;
        }
        let low = prices.iter().copied().reduce(f64::min)?;
        let high = prices.iter().copied().reduce(f64::max)?;
        Some(Self { low, high })
    }

    /// Inclusive at both ends.
    pub fn contains(&self, price: Price) -> bool {
        self.low <= price && price <= self.high
    }

    pub fn is_point(&self) -> bool {
        self.low == self.high
    }

    pub fn is_well_formed(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }
}
