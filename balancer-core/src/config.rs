//! Solver tuning knobs.
//!
//! Every field has a default matching the calculator's historical behavior,
//! so a request can omit the whole block or any part of it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsify_next::Tsify;

const MAX_PRICE_DECIMALS: u32 = 12;

/// Which categories may give up a unit during balancing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum DonorEligibility {
    /// Donor must stay above `base_quantity - quantity_tolerance` and within its bounds.
    #[default]
    Tolerance,
    /// Donor only has to stay within its bounds.
    BoundsOnly,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse solver config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(default)]
pub struct SolverConfig {
    /// Slack below the uniform baseline a donor may be drawn down to.
    pub quantity_tolerance: u32,
    /// Upper bound on balancing iterations.
    pub max_iterations: u32,
    pub eligibility: DonorEligibility,
    /// Decimal places kept in the reported unknown price.
    pub price_decimals: u32,
    /// Treat a single-value price range as satisfied by any allocation.
    pub accept_point_range: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            quantity_tolerance: 2,
            max_iterations: 200,
            eligibility: DonorEligibility::Tolerance,
            price_decimals: 4,
            accept_point_range: false,
        }
    }
}

impl SolverConfig {
    /// Parse from JSON; absent fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_iterations",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.price_decimals > MAX_PRICE_DECIMALS {
            return Err(ConfigError::InvalidValue {
                field: "price_decimals",
                reason: format!("at most {MAX_PRICE_DECIMALS} supported, got {}", self.price_decimals),
            });
        }
        Ok(())
    }

    /// Round a price to `price_decimals` places.
    pub fn round_price(&self, price: f64) -> f64 {
        let scale = 10f64.powi(self.price_decimals as i32);
        (price * scale).round() / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = SolverConfig::from_json("{}").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.quantity_tolerance, 2);
        assert_eq!(config.max_iterations, 200);
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let config =
            SolverConfig::from_json(r#"{"max_iterations": 50, "eligibility": "BoundsOnly"}"#)
                .unwrap();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.eligibility, DonorEligibility::BoundsOnly);
        assert_eq!(config.quantity_tolerance, 2);
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = SolverConfig::from_json(r#"{"max_iterations": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "max_iterations",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            SolverConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn round_price_keeps_configured_decimals() {
        let config = SolverConfig::default();
        assert_eq!(config.round_price(368.210_844_2), 368.2108);
        let coarse = SolverConfig {
            price_decimals: 0,
            ..SolverConfig::default()
        };
        assert_eq!(coarse.round_price(368.6), 369.0);
    }
}
