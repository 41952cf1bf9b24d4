//! Stock status classification.

use serde::{Deserialize, Serialize};

use storekeeper_core::DomainError;

/// Status badge derived from a product's current stock and its threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl core::str::FromStr for StockStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(StockStatus::InStock),
            "low_stock" => Ok(StockStatus::LowStock),
            "out_of_stock" => Ok(StockStatus::OutOfStock),
            other => Err(DomainError::validation(format!(
                "unknown stock status '{other}' (expected in_stock, low_stock or out_of_stock)"
            ))),
        }
    }
}

/// Classify a stock level against a low-stock threshold.
///
/// Pure and total: `stock <= 0` is out of stock (negative stock is reachable
/// only through corrections), a positive stock at or below the threshold is
/// low, anything above it is in stock.
pub fn classify(stock: i64, min_stock_level: i64) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= min_stock_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values() {
        assert_eq!(classify(0, 5), StockStatus::OutOfStock);
        assert_eq!(classify(5, 5), StockStatus::LowStock);
        assert_eq!(classify(6, 5), StockStatus::InStock);
    }

    #[test]
    fn negative_stock_is_out_of_stock() {
        // Reachable via corrections only.
        assert_eq!(classify(-3, 5), StockStatus::OutOfStock);
    }

    #[test]
    fn zero_threshold_never_reports_low() {
        assert_eq!(classify(1, 0), StockStatus::InStock);
        assert_eq!(classify(0, 0), StockStatus::OutOfStock);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [StockStatus::InStock, StockStatus::LowStock, StockStatus::OutOfStock] {
            assert_eq!(status.as_str().parse::<StockStatus>().unwrap(), status);
        }
        assert!("backordered".parse::<StockStatus>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: classification is total and matches its definition.
            #[test]
            fn classification_matches_definition(
                stock in -1_000_000i64..1_000_000,
                min in 0i64..1_000_000
            ) {
                let status = classify(stock, min);
                if stock <= 0 {
                    prop_assert_eq!(status, StockStatus::OutOfStock);
                } else if stock <= min {
                    prop_assert_eq!(status, StockStatus::LowStock);
                } else {
                    prop_assert_eq!(status, StockStatus::InStock);
                }
            }

            /// Property: classification is deterministic.
            #[test]
            fn classification_is_deterministic(
                stock in -1_000i64..1_000,
                min in 0i64..1_000
            ) {
                prop_assert_eq!(classify(stock, min), classify(stock, min));
            }
        }
    }
}
