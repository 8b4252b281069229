//! Price balancing by single-unit transfers.
//!
//! The unknown category's price is whatever the pre-tax budget leaves over
//! after paying for the known categories, spread across its units. Moving one
//! unit from a cheap known category to an expensive one raises the known
//! contribution and so lowers the implied price; the reverse raises it.
//!
//! Each iteration:
//! 1. derive the implied price; stop if it is inside the target range
//! 2. pick the direction the known contribution has to move
//! 3. apply the first eligible donor/recipient pair in price order
//!
//! The search is greedy and can stall on bounds, so it stops when no pair
//! qualifies or when the iteration budget is spent.

use crate::config::{DonorEligibility, SolverConfig};
use crate::constraints::ConstraintSet;
use crate::error::SolveError;
use crate::types::{AllocationVector, CategoryIndex, Price, PriceRange, Quantity, total_of};

/// Unit price of the last category implied by the budget.
pub fn implied_price(
    quantities: &[Quantity],
    known_prices: &[Price],
    target_pretax: f64,
) -> Result<Price, SolveError> {
    let Some((&unknown_qty, known)) = quantities.split_last() else {
        return Err(SolveError::DivisionByZero);
    };
    if unknown_qty == 0 {
        return Err(SolveError::DivisionByZero);
    }
    let known_cost: f64 = known
        .iter()
        .zip(known_prices)
        .map(|(&q, &p)| f64::from(q) * p)
        .sum();
    Ok((target_pretax - known_cost) / f64::from(unknown_qty))
}

// === SWAP SEARCH ===

/// Which way the implied price has to go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Implied price above range: shift units toward expensive categories.
    Lower,
    /// Implied price below range: shift units toward cheap categories.
    Raise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Swap {
    pub donor: CategoryIndex,
    pub recipient: CategoryIndex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    InRange,
    /// No eligible pair while still out of range.
    Stuck,
    /// Iteration budget spent while still out of range.
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceOutcome {
    pub quantities: AllocationVector,
    pub implied_price: Price,
    /// Swaps applied.
    pub iterations: u32,
    pub termination: Termination,
}

pub struct PriceBalancer<'a> {
    known_prices: &'a [Price],
    target_pretax: f64,
    range: PriceRange,
    constraints: &'a ConstraintSet,
    config: &'a SolverConfig,
    base_quantity: Quantity,
    total_quantity: Quantity,
    /// Known categories by ascending `(price, index)`.
    by_price: Vec<CategoryIndex>,
}

impl<'a> PriceBalancer<'a> {
    pub fn new(
        known_prices: &'a [Price],
        target_pretax: f64,
        range: PriceRange,
        constraints: &'a ConstraintSet,
        config: &'a SolverConfig,
        base_quantity: Quantity,
        total_quantity: Quantity,
    ) -> Self {
        let mut by_price: Vec<CategoryIndex> = (0..known_prices.len()).collect();
        by_price.sort_by(|&a, &b| known_prices[a].total_cmp(&known_prices[b]).then(a.cmp(&b)));
        Self {
            known_prices,
            target_pretax,
            range,
            constraints,
            config,
            base_quantity,
            total_quantity,
            by_price,
        }
    }

    fn accepts(&self, price: Price) -> bool {
        self.range.contains(price) || (self.config.accept_point_range && self.range.is_point())
    }

    fn can_donate(&self, category: CategoryIndex, quantity: Quantity) -> bool {
        if !self.constraints.window(category).can_lose(quantity) {
            return false;
        }
        match self.config.eligibility {
            DonorEligibility::BoundsOnly => true,
            DonorEligibility::Tolerance => {
                i64::from(quantity)
                    > i64::from(self.base_quantity) - i64::from(self.config.quantity_tolerance)
            }
        }
    }

    fn can_receive(&self, category: CategoryIndex, quantity: Quantity) -> bool {
        self.constraints.window(category).can_gain(quantity)
    }

    /// First eligible pair in price order.
    ///
    /// `Lower` scans donors cheapest-first and recipients dearest-first;
    /// `Raise` mirrors both. A pair only counts if it moves the known
    /// contribution, so equal prices never pair up.
    pub fn find_swap(&self, quantities: &[Quantity], direction: Direction) -> Option<Swap> {
        let ascending = self.by_price.iter().copied();
        let descending = self.by_price.iter().rev().copied();
        let (donors, recipients): (Vec<_>, Vec<_>) = match direction {
            Direction::Lower => (ascending.collect(), descending.collect()),
            Direction::Raise => (descending.collect(), ascending.collect()),
        };

        donors
            .iter()
            .filter(|&&d| self.can_donate(d, quantities[d]))
            .find_map(|&d| {
                let donor_price = self.known_prices[d];
                recipients
                    .iter()
                    .take_while(|&&r| match direction {
                        Direction::Lower => self.known_prices[r] > donor_price,
                        Direction::Raise => self.known_prices[r] < donor_price,
                    })
                    .find(|&&r| self.can_receive(r, quantities[r]))
                    .map(|&r| Swap {
                        donor: d,
                        recipient: r,
                    })
            })
    }

    /// Guards against a swap that broke the sum invariant.
    fn verify_total(&self, quantities: &[Quantity]) -> Result<(), SolveError> {
        let actual = total_of(quantities);
        if actual != u64::from(self.total_quantity) {
            return Err(SolveError::Inconsistent {
                expected: self.total_quantity,
                actual,
            });
        }
        Ok(())
    }

    /// Swap until the implied price is accepted, no pair is left, or the budget is spent.
    ///
    /// The allocation left by the last budgeted swap is checked once more, so a
    /// run whose final swap lands in range ends `InRange` rather than
    /// `IterationLimit`.
    pub fn run(&self, mut quantities: AllocationVector) -> Result<BalanceOutcome, SolveError> {
        let mut iterations = 0u32;

        for iteration in 0..self.config.max_iterations {
            let price = implied_price(&quantities, self.known_prices, self.target_pretax)?;
            if self.accepts(price) {
                self.verify_total(&quantities)?;
                return Ok(BalanceOutcome {
                    quantities,
                    implied_price: price,
                    iterations,
                    termination: Termination::InRange,
                });
            }

            let direction = if price > self.range.high {
                Direction::Lower
            } else {
                Direction::Raise
            };

            let Some(swap) = self.find_swap(&quantities, direction) else {
                return Ok(BalanceOutcome {
                    quantities,
                    implied_price: price,
                    iterations,
                    termination: Termination::Stuck,
                });
            };

            #[cfg(feature = "instrument")]
            tracing::info!(
                target: "swap",
                iteration = iteration,
                donor = swap.donor,
                recipient = swap.recipient,
                donor_price = self.known_prices[swap.donor],
                recipient_price = self.known_prices[swap.recipient],
                implied_price = price,
            );
            let _ = iteration;

            quantities[swap.donor] -= 1;
            quantities[swap.recipient] += 1;
            iterations += 1;
        }

        // The last swap has not been checked yet.
        let price = implied_price(&quantities, self.known_prices, self.target_pretax)?;
        let termination = if self.accepts(price) {
            self.verify_total(&quantities)?;
            Termination::InRange
        } else {
            Termination::IterationLimit
        };
        Ok(BalanceOutcome {
            quantities,
            implied_price: price,
            iterations,
            termination,
        })
    }
}
