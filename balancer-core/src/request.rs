use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsify_next::Tsify;

use crate::config::{ConfigError, SolverConfig};
use crate::types::{CategoryIndex, Price, PriceRange, Quantity};

// ============================================================================
// Bounds
// ============================================================================

/// Per-category quantity constraint. Unknown tags fail at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "kind", content = "value")]
pub enum Bound {
    Exact(Quantity),
    AtLeast(Quantity),
    AtMost(Quantity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct BoundSpec {
    pub category: CategoryIndex,
    pub bound: Bound,
}

impl BoundSpec {
    pub fn exact(category: CategoryIndex, value: Quantity) -> Self {
        Self {
            category,
            bound: Bound::Exact(value),
        }
    }

    pub fn at_least(category: CategoryIndex, value: Quantity) -> Self {
        Self {
            category,
            bound: Bound::AtLeast(value),
        }
    }

    pub fn at_most(category: CategoryIndex, value: Quantity) -> Self {
        Self {
            category,
            bound: Bound::AtMost(value),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Contract violations. These are caller bugs, not solver outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("at least one category is required")]
    NoCategories,

    #[error("expected {expected} known prices, got {actual}")]
    KnownPriceCount { expected: usize, actual: usize },

    #[error("total quantity {total_quantity} is below the number of categories {total_products}")]
    QuantityBelowCategories {
        total_quantity: Quantity,
        total_products: u32,
    },

    #[error("total price must be positive and finite, got {0}")]
    TotalPrice(f64),

    #[error("tax rate must lie in [0, 1), got {0}")]
    TaxRate(f64),

    #[error("known price at category {category} must be non-negative and finite, got {price}")]
    KnownPrice { category: CategoryIndex, price: f64 },

    #[error("price range [{low}, {high}] is not a finite ascending interval")]
    PriceRange { low: f64, high: f64 },

    #[error("bound targets category {category}, only 0..{limit} can be constrained")]
    BoundIndex {
        category: CategoryIndex,
        limit: CategoryIndex,
    },

    #[error("invalid solver config: {0}")]
    Config(String),
}

impl From<ConfigError> for RequestError {
    fn from(err: ConfigError) -> Self {
        RequestError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SolveRequest {
    pub total_products: u32,
    pub total_quantity: Quantity,
    pub total_price_with_tax: f64,
    pub tax_rate: f64,
    /// One price per category except the last (unknown) one.
    pub known_prices: Vec<Price>,
    pub price_range: PriceRange,
    #[serde(default)]
    pub bounds: Vec<BoundSpec>,
    #[serde(default)]
    pub config: SolverConfig,
}

impl SolveRequest {
    /// Request whose target range is derived from the known prices.
    ///
    /// The category count is `known_prices.len() + 1`.
    pub fn with_auto_range(
        total_quantity: Quantity,
        total_price_with_tax: f64,
        tax_rate: f64,
        known_prices: Vec<Price>,
    ) -> Option<Self> {
        let price_range = PriceRange::from_known_prices(&known_prices)?;
        let total_products = u32::try_from(known_prices.len() + 1).ok()?;
        Some(Self {
            total_products,
            total_quantity,
            total_price_with_tax,
            tax_rate,
            known_prices,
            price_range,
            bounds: Vec::new(),
            config: SolverConfig::default(),
        })
    }

    pub fn with_bounds(mut self, bounds: impl IntoIterator<Item = BoundSpec>) -> Self {
        self.bounds.extend(bounds);
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn category_count(&self) -> usize {
        self.total_products as usize
    }

    pub fn unknown_index(&self) -> CategoryIndex {
        self.category_count().saturating_sub(1)
    }

    /// Budget with tax removed.
    pub fn target_pretax(&self) -> f64 {
        self.total_price_with_tax / (1.0 + self.tax_rate)
    }

    /// Check the caller-side contract.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.total_products == 0 {
            return Err(RequestError::NoCategories);
        }
        let expected = self.unknown_index();
        if self.known_prices.len() != expected {
            return Err(RequestError::KnownPriceCount {
                expected,
                actual: self.known_prices.len(),
            });
        }
        if self.total_quantity < self.total_products {
            return Err(RequestError::QuantityBelowCategories {
                total_quantity: self.total_quantity,
                total_products: self.total_products,
            });
        }
        if !(self.total_price_with_tax.is_finite() && self.total_price_with_tax > 0.0) {
            return Err(RequestError::TotalPrice(self.total_price_with_tax));
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(RequestError::TaxRate(self.tax_rate));
        }
        if let Some((category, &price)) = self
            .known_prices
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && **p >= 0.0))
        {
            return Err(RequestError::KnownPrice { category, price });
        }
        if !self.price_range.is_well_formed() {
            return Err(RequestError::PriceRange {
                low: self.price_range.low,
                high: self.price_range.high,
            });
        }
        // The unknown category is never constrained on its own.
        if let Some(spec) = self.bounds.iter().find(|b| b.category >= expected) {
            return Err(RequestError::BoundIndex {
                category: spec.category,
                limit: expected,
            });
        }
        self.config.validate()?;
        Ok(())
    }
}
