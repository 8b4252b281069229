use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::balancer::{BalanceOutcome, Termination};
use crate::config::SolverConfig;
use crate::error::{SolveError, SolveErrorKind};
use crate::types::{AllocationVector, Price};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum SolveStatus {
    Solved,
    Warning,
    Infeasible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum WarningKind {
    /// No bound-respecting swap could move the price further.
    Stuck,
    /// Iteration budget exhausted.
    IterationLimit,
}

/// Terminal state of one solve.
///
/// `Solved` and `Warning` carry the best allocation found; `Infeasible`
/// carries neither quantities nor a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub message: String,
    pub quantities: Option<AllocationVector>,
    pub estimated_unknown_price: Option<Price>,
    /// Swaps applied during balancing.
    pub iterations: u32,
    pub warning: Option<WarningKind>,
    pub error: Option<SolveErrorKind>,
}

impl SolveReport {
    pub fn from_outcome(outcome: BalanceOutcome, config: &SolverConfig) -> Self {
        let price = outcome.implied_price;
        let (status, warning, message) = match outcome.termination {
            Termination::InRange => (
                SolveStatus::Solved,
                None,
                "Found an allocation with the unknown price inside the target range.".to_string(),
            ),
            Termination::Stuck => (
                SolveStatus::Warning,
                Some(WarningKind::Stuck),
                format!(
                    "No bound-respecting swap can move the price further. Current unknown price is {price:.4}."
                ),
            ),
            Termination::IterationLimit => (
                SolveStatus::Warning,
                Some(WarningKind::IterationLimit),
                format!(
                    "Reached the iteration limit of {} without landing in range. Current unknown price is {price:.4}.",
                    config.max_iterations
                ),
            ),
        };

        Self {
            status,
            message,
            quantities: Some(outcome.quantities),
            estimated_unknown_price: Some(config.round_price(price)),
            iterations: outcome.iterations,
            warning,
            error: None,
        }
    }

    pub fn infeasible(error: &SolveError) -> Self {
        Self {
            status: SolveStatus::Infeasible,
            message: error.to_string(),
            quantities: None,
            estimated_unknown_price: None,
            iterations: 0,
            warning: None,
            error: Some(error.kind()),
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status == SolveStatus::Solved
    }
}
