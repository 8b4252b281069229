//! Integer allocation of a fixed quantity across price categories so that the
//! price implied for the one unpriced category lands in a target range.
//!
//! Pipeline: [`ConstraintSet::normalize`] → [`InitialAllocator::allocate`] →
//! [`PriceBalancer::run`] → [`SolveReport`]. Every stage is a pure function of
//! the request, so identical requests produce identical reports.

use wasm_bindgen::prelude::*;

pub mod allocation;
pub mod balancer;
pub mod config;
pub mod constraints;
pub mod error;
pub mod report;
pub mod request;
pub mod types;

pub use allocation::*;
pub use balancer::*;
pub use config::*;
pub use constraints::*;
pub use error::*;
pub use report::*;
pub use request::*;
pub use types::*;

#[cfg(feature = "instrument")]
pub use instrument;

// ============================================================================
// Native API
// ============================================================================

/// Solve one request.
///
/// Contract violations come back as `Err`; every solver outcome, including
/// infeasibility, is a report.
pub fn solve(request: &SolveRequest) -> Result<SolveReport, RequestError> {
    request.validate()?;

    let report = match run_stages(request) {
        Ok(outcome) => SolveReport::from_outcome(outcome, &request.config),
        Err(err) => SolveReport::infeasible(&err),
    };

    #[cfg(feature = "instrument")]
    tracing::info!(
        target: "solve",
        status = ?report.status,
        iterations = report.iterations,
        implied_price = report.estimated_unknown_price.unwrap_or(f64::NAN),
    );

    Ok(report)
}

fn run_stages(request: &SolveRequest) -> Result<BalanceOutcome, SolveError> {
    let constraints = ConstraintSet::normalize(
        &request.bounds,
        request.category_count(),
        request.total_quantity,
    )?;
    let allocation = InitialAllocator::new(request.total_quantity, &constraints).allocate()?;
    let balancer = PriceBalancer::new(
        &request.known_prices,
        request.target_pretax(),
        request.price_range,
        &constraints,
        &request.config,
        allocation.base_quantity,
        request.total_quantity,
    );
    balancer.run(allocation.quantities)
}

// ============================================================================
// WASM API
// ============================================================================

#[wasm_bindgen]
pub fn solve_request(request: SolveRequest) -> Result<SolveReport, JsError> {
    // Better panic messages in browser console
    console_error_panic_hook::set_once();
    solve(&request).map_err(|e| JsError::new(&e.to_string()))
}

/// Target range spanning the known prices, for forms that do not ask for one.
#[wasm_bindgen]
pub fn derive_price_range(known_prices: Vec<f64>) -> Option<PriceRange> {
    PriceRange::from_known_prices(&known_prices)
}
