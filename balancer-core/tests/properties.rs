//! Property-style sweeps over generated requests.
//!
//! Each trial draws a request from a seeded RNG, so failures reproduce by seed.
//! The properties must hold whatever status the solver lands on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use balancer_core::{
    BoundSpec, ConstraintSet, PriceRange, SolveReport, SolveRequest, SolveStatus, SolverConfig,
    solve, total_of,
};

const TRIALS: u64 = 300;

// === GENERATORS ===

fn random_bounds(rng: &mut StdRng, known: usize, total: u32) -> Vec<BoundSpec> {
    let count = rng.random_range(0..=known.min(4));
    (0..count)
        .map(|_| {
            let category = rng.random_range(0..known);
            let value = rng.random_range(0..=total / 2);
            match rng.random_range(0..3) {
                0 => BoundSpec::exact(category, value),
                1 => BoundSpec::at_least(category, value),
                _ => BoundSpec::at_most(category, value),
            }
        })
        .collect()
}

/// Budget is priced off a hidden allocation so most requests are reachable.
fn random_request(seed: u64) -> SolveRequest {
    let mut rng = StdRng::seed_from_u64(seed);
    let total_products: u32 = rng.random_range(2..=12);
    let total_quantity: u32 = rng.random_range(total_products..=total_products * 20);
    let known = (total_products - 1) as usize;

    let known_prices: Vec<f64> = (0..known)
        .map(|_| f64::from(rng.random_range(50u32..=500)))
        .collect();
    let hidden_unknown_price = f64::from(rng.random_range(50u32..=500));
    let per_category = f64::from(total_quantity) / f64::from(total_products);
    let pretax = per_category * (known_prices.iter().sum::<f64>() + hidden_unknown_price);
    let tax_rate = f64::from(rng.random_range(0u32..20)) / 100.0;

    let price_range = if rng.random_bool(0.2) {
        // Often unreachable.
        let low = f64::from(rng.random_range(1u32..50));
        PriceRange::new(low, low + 1.0)
    } else {
        PriceRange::from_known_prices(&known_prices).unwrap()
    };

    SolveRequest {
        total_products,
        total_quantity,
        total_price_with_tax: pretax * (1.0 + tax_rate),
        tax_rate,
        known_prices,
        price_range,
        bounds: random_bounds(&mut rng, known, total_quantity),
        config: SolverConfig {
            max_iterations: rng.random_range(1..=300),
            ..SolverConfig::default()
        },
    }
}

// === PROPERTIES ===

fn check_report(seed: u64, request: &SolveRequest, report: &SolveReport) {
    match report.status {
        SolveStatus::Infeasible => {
            assert!(report.quantities.is_none(), "seed {seed}: infeasible with quantities");
            assert!(report.estimated_unknown_price.is_none(), "seed {seed}");
            assert!(report.error.is_some(), "seed {seed}: infeasible without error kind");
        }
        SolveStatus::Solved | SolveStatus::Warning => {
            let quantities = report.quantities.as_ref().unwrap();
            assert_eq!(
                total_of(quantities),
                u64::from(request.total_quantity),
                "seed {seed}: sum invariant broken"
            );
            let constraints = ConstraintSet::normalize(
                &request.bounds,
                request.category_count(),
                request.total_quantity,
            )
            .unwrap();
            assert!(
                constraints.admits(quantities),
                "seed {seed}: {quantities:?} outside {:?}",
                constraints.windows()
            );
            assert!(report.iterations <= request.config.max_iterations, "seed {seed}");
            let price = report.estimated_unknown_price.unwrap();
            if report.status == SolveStatus::Solved {
                assert!(report.warning.is_none(), "seed {seed}");
                assert!(
                    price >= request.price_range.low - 1e-4
                        && price <= request.price_range.high + 1e-4,
                    "seed {seed}: solved price {price} outside {:?}",
                    request.price_range
                );
            } else {
                assert!(report.warning.is_some(), "seed {seed}: warning without kind");
            }
        }
    }
}

#[test]
fn invariants_hold_across_generated_requests() {
    let mut statuses = [0usize; 3];
    for seed in 0..TRIALS {
        let request = random_request(seed);
        request.validate().unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        let report = solve(&request).unwrap();
        check_report(seed, &request, &report);
        statuses[report.status as usize] += 1;
    }
    // The sweep should exercise more than one outcome.
    assert!(statuses[SolveStatus::Solved as usize] > 0, "{statuses:?}");
    assert!(statuses[SolveStatus::Warning as usize] > 0, "{statuses:?}");
}

#[test]
fn generated_requests_are_deterministic() {
    for seed in 0..50 {
        let request = random_request(seed);
        let a = solve(&request).unwrap();
        let b = solve(&request).unwrap();
        assert_eq!(a, b, "seed {seed}");
    }
}

#[test]
fn larger_budget_never_loses_a_solution() {
    for seed in 0..TRIALS {
        let request = random_request(seed);
        let short = solve(&request).unwrap();
        if short.status != SolveStatus::Solved {
            continue;
        }
        let long = solve(&request.clone().with_config(SolverConfig {
            max_iterations: request.config.max_iterations + 100,
            ..request.config.clone()
        }))
        .unwrap();
        assert_eq!(long.status, SolveStatus::Solved, "seed {seed}");
        assert_eq!(long.quantities, short.quantities, "seed {seed}");
    }
}
