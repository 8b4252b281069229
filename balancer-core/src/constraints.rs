//! Bound normalization.
//!
//! Raw bounds are merged per category into a single `[min, max]` window:
//! every `AtLeast` and `Exact` raises `min`, every `AtMost` and `Exact` lowers
//! `max`. The merge is order-independent, so two different `Exact` values on
//! one category always surface as a conflict.

use crate::error::SolveError;
use crate::request::{Bound, BoundSpec};
use crate::types::{CategoryIndex, Quantity, total_of};

/// Effective quantity window of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub min: Quantity,
    pub max: Quantity,
    /// Pinned by an `Exact` bound; never adjusted.
    pub exact: bool,
    /// At least one raw bound applied.
    pub bounded: bool,
}

impl Window {
    fn open(total_quantity: Quantity) -> Self {
        Self {
            min: 0,
            max: total_quantity,
            exact: false,
            bounded: false,
        }
    }

    pub fn contains(&self, quantity: Quantity) -> bool {
        self.min <= quantity && quantity <= self.max
    }

    /// Can give up one unit without leaving the window.
    pub fn can_lose(&self, quantity: Quantity) -> bool {
        !self.exact && quantity > self.min
    }

    /// Can take one more unit without leaving the window.
    pub fn can_gain(&self, quantity: Quantity) -> bool {
        !self.exact && quantity < self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet {
    windows: Vec<Window>,
}

impl ConstraintSet {
    /// Every category open on `[0, total_quantity]`.
    pub fn unconstrained(total_products: usize, total_quantity: Quantity) -> Self {
        Self {
            windows: vec![Window::open(total_quantity); total_products],
        }
    }

    /// Merge raw bounds into per-category windows and check them against the total.
    ///
    /// Only known-price categories (`0..total_products - 1`) may carry bounds.
    pub fn normalize(
        bounds: &[BoundSpec],
        total_products: usize,
        total_quantity: Quantity,
    ) -> Result<Self, SolveError> {
        let limit = total_products.saturating_sub(1);
        let mut lows: Vec<Quantity> = vec![0; total_products];
        let mut highs: Vec<Quantity> = vec![Quantity::MAX; total_products];
        let mut exact = vec![false; total_products];
        let mut bounded = vec![false; total_products];

        for spec in bounds {
            let i = spec.category;
            if i >= limit {
                return Err(SolveError::BoundOutOfRange { category: i, limit });
            }
            bounded[i] = true;
            match spec.bound {
                Bound::AtLeast(v) => lows[i] = lows[i].max(v),
                Bound::AtMost(v) => highs[i] = highs[i].min(v),
                Bound::Exact(v) => {
                    lows[i] = lows[i].max(v);
                    highs[i] = highs[i].min(v);
                    exact[i] = true;
                }
            }
        }

        if let Some(category) = (0..total_products).find(|&i| lows[i] > highs[i]) {
            return Err(SolveError::Conflict {
                category,
                min: lows[category],
                max: highs[category],
            });
        }

        let required = total_of(&lows);
        if required > u64::from(total_quantity) {
            return Err(SolveError::InfeasibleTotal {
                required,
                total: total_quantity,
            });
        }

        let windows: Vec<Window> = (0..total_products)
            .map(|i| Window {
                min: lows[i],
                max: highs[i].min(total_quantity),
                exact: exact[i],
                bounded: bounded[i],
            })
            .collect();

        #[cfg(feature = "instrument")]
        for (category, w) in windows.iter().enumerate().filter(|(_, w)| w.bounded) {
            tracing::info!(
                target: "normalize",
                category = category,
                min = w.min,
                max = w.max,
                exact = w.exact,
            );
        }

        Ok(Self { windows })
    }

    #[cfg(test)]
    pub(crate) fn from_windows(windows: Vec<Window>) -> Self {
        Self { windows }
    }

    pub fn window(&self, category: CategoryIndex) -> Window {
        self.windows[category]
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// True when no raw bound applied to any category.
    pub fn is_unbounded(&self) -> bool {
        self.windows.iter().all(|w| !w.bounded)
    }

    /// Whether every quantity sits inside its window.
    pub fn admits(&self, quantities: &[Quantity]) -> bool {
        quantities.len() == self.windows.len()
            && self
                .windows
                .iter()
                .zip(quantities)
                .all(|(w, &q)| w.contains(q))
    }
}
