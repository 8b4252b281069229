//! Initial quantity spread.
//!
//! Starts from the most uniform split of the total, then relaxes it into the
//! bound windows with a bounded fixed-point loop:
//! - clamp every category into its window
//! - hand the resulting deficit (or surplus) to adjustable categories with room
//! - repeat until nothing moves or the round budget runs out
//!
//! Prices are not consulted here.

use crate::constraints::ConstraintSet;
use crate::error::SolveError;
use crate::types::{AllocationVector, Quantity, total_of};

/// Output of the allocation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub quantities: AllocationVector,
    /// `total_quantity / total_products`, the uniform share before remainders.
    pub base_quantity: Quantity,
    /// Relaxation rounds that moved quantity.
    pub rounds: u32,
}

/// Uniform split: the first `total % n` categories get one extra unit.
pub fn baseline(total_quantity: Quantity, total_products: usize) -> AllocationVector {
    if total_products == 0 {
        return Vec::new();
    }
    let n = total_products as u64;
    let base = (u64::from(total_quantity) / n) as Quantity;
    let remainder = (u64::from(total_quantity) % n) as usize;
    (0..total_products)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

pub struct InitialAllocator<'a> {
    total_quantity: Quantity,
    constraints: &'a ConstraintSet,
}

impl<'a> InitialAllocator<'a> {
    pub fn new(total_quantity: Quantity, constraints: &'a ConstraintSet) -> Self {
        Self {
            total_quantity,
            constraints,
        }
    }

    pub fn allocate(&self) -> Result<Allocation, SolveError> {
        let n = self.constraints.len();
        let start = baseline(self.total_quantity, n);
        let base_quantity = if n == 0 {
            0
        } else {
            (u64::from(self.total_quantity) / n as u64) as Quantity
        };

        if self.constraints.is_unbounded() {
            return Ok(Allocation {
                quantities: start,
                base_quantity,
                rounds: 0,
            });
        }

        let mut current: Vec<i64> = start.iter().map(|&q| i64::from(q)).collect();
        let rounds = self.relax(&mut current)?;
        let residual = self.settle_residual(&mut current)?;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "allocate",
            total_quantity = self.total_quantity,
            rounds = rounds,
            residual = residual,
        );
        let _ = residual;

        let quantities: AllocationVector = current
            .iter()
            .map(|&q| q.clamp(0, i64::from(Quantity::MAX)) as Quantity)
            .collect();

        let actual = total_of(&quantities);
        if actual != u64::from(self.total_quantity) || !self.constraints.admits(&quantities) {
            return Err(SolveError::Inconsistent {
                expected: self.total_quantity,
                actual,
            });
        }

        Ok(Allocation {
            quantities,
            base_quantity,
            rounds,
        })
    }

    fn clamp_all(&self, current: &mut [i64]) {
        for (q, w) in current.iter_mut().zip(self.constraints.windows()) {
            *q = (*q).clamp(i64::from(w.min), i64::from(w.max));
        }
    }

    fn gap(&self, current: &[i64]) -> i64 {
        i64::from(self.total_quantity) - current.iter().sum::<i64>()
    }

    /// Categories that can move in the direction of `delta`, in index order.
    fn absorbers(&self, current: &[i64], delta: i64) -> Vec<usize> {
        self.constraints
            .windows()
            .iter()
            .enumerate()
            .filter(|(i, w)| {
                !w.exact
                    && if delta > 0 {
                        current[*i] < i64::from(w.max)
                    } else {
                        current[*i] > i64::from(w.min)
                    }
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the number of rounds that redistributed quantity.
    fn relax(&self, current: &mut [i64]) -> Result<u32, SolveError> {
        let max_rounds = 2 * current.len();
        let mut rounds = 0u32;

        for round in 0..max_rounds {
            self.clamp_all(current);
            let delta = self.gap(current);
            if delta == 0 {
                break;
            }

            let absorbers = self.absorbers(current, delta);
            if absorbers.is_empty() {
                return Err(SolveError::NoAbsorber { residual: delta });
            }

            // Even share, remainder to the lowest indices.
            let k = absorbers.len() as i64;
            let share = delta / k;
            let extra = (delta % k).abs();
            for (pos, &i) in absorbers.iter().enumerate() {
                let bump = if (pos as i64) < extra { delta.signum() } else { 0 };
                current[i] += share + bump;
            }
            rounds += 1;

            #[cfg(feature = "instrument")]
            tracing::info!(
                target: "relax",
                round = round,
                delta = delta,
                absorbers = absorbers.len(),
            );
            let _ = round;
        }

        Ok(rounds)
    }

    /// Final clamp, then put any leftover on the first category that fits it whole.
    fn settle_residual(&self, current: &mut [i64]) -> Result<i64, SolveError> {
        self.clamp_all(current);
        let residual = self.gap(current);
        if residual == 0 {
            return Ok(0);
        }

        let target = self
            .constraints
            .windows()
            .iter()
            .enumerate()
            .find(|(i, w)| {
                let moved = current[*i] + residual;
                !w.exact && i64::from(w.min) <= moved && moved <= i64::from(w.max)
            })
            .map(|(i, _)| i)
            .ok_or(SolveError::NoAbsorber { residual })?;

        current[target] += residual;
        Ok(residual)
    }
}
