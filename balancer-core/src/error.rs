use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsify_next::Tsify;

use crate::types::{CategoryIndex, Quantity};

/// Runtime outcomes that end a solve without an allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("bound targets category {category}, only 0..{limit} can be constrained")]
    BoundOutOfRange {
        category: CategoryIndex,
        limit: CategoryIndex,
    },

    #[error("conflicting bounds on category {category}: minimum {min} exceeds maximum {max}")]
    Conflict {
        category: CategoryIndex,
        min: Quantity,
        max: Quantity,
    },

    #[error("required minimum quantity {required} exceeds total quantity {total}")]
    InfeasibleTotal { required: u64, total: Quantity },

    #[error("no adjustable category can absorb a remainder of {residual} units")]
    NoAbsorber { residual: i64 },

    #[error("unknown category has no allocated units, its price cannot be derived")]
    DivisionByZero,

    #[error("allocation sums to {actual}, expected {expected}")]
    Inconsistent { expected: Quantity, actual: u64 },
}

/// Serializable discriminant of [`SolveError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum SolveErrorKind {
    InvalidBound,
    Conflict,
    InfeasibleTotal,
    DivisionByZero,
    Inconsistent,
}

impl SolveError {
    pub fn kind(&self) -> SolveErrorKind {
        match self {
            SolveError::BoundOutOfRange { .. } => SolveErrorKind::InvalidBound,
            SolveError::Conflict { .. } => SolveErrorKind::Conflict,
            SolveError::InfeasibleTotal { .. } | SolveError::NoAbsorber { .. } => {
                SolveErrorKind::InfeasibleTotal
            }
            SolveError::DivisionByZero => SolveErrorKind::DivisionByZero,
            SolveError::Inconsistent { .. } => SolveErrorKind::Inconsistent,
        }
    }
}
