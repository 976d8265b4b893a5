//! Stock levels and sales velocity.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Average number of weeks in a month, used to convert weekly velocity.
pub const WEEKS_PER_MONTH: Decimal = Decimal::from_parts(43, 0, 0, false, 1);

const DAYS_PER_MONTH: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

/// Stock state of a product, as loaded for a deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub stock: i32,
    pub monthly_sales: i32,
}

/// Why stock could not be reserved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockError {
    #[error("product {0} no longer exists")]
    UnknownProduct(ProductId),
    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    Insufficient {
        product_id: ProductId,
        available: i32,
        requested: u32,
    },
}

/// New values to write back for one product after a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub product_id: ProductId,
    pub new_stock: i32,
    pub new_monthly_sales: i32,
}

/// Plan the stock movements for an order.
///
/// All lines are checked before anything is changed: one short line fails the
/// whole order. Quantities for the same product are summed first. New stock is
/// clamped at zero and monthly sales grow by the quantity sold.
///
/// # Errors
///
/// Returns [`StockError`] for the first line that cannot be served.
pub fn plan_stock_deduction(
    levels: &HashMap<ProductId, StockLevel>,
    items: &[(ProductId, u32)],
) -> Result<Vec<StockChange>, StockError> {
    let mut requested: Vec<(ProductId, u32)> = Vec::with_capacity(items.len());
    for &(product_id, quantity) in items {
        match requested.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, total)) => *total = total.saturating_add(quantity),
            None => requested.push((product_id, quantity)),
        }
    }

    for &(product_id, quantity) in &requested {
        let level = levels
            .get(&product_id)
            .ok_or(StockError::UnknownProduct(product_id))?;
        if i64::from(level.stock) < i64::from(quantity) {
            return Err(StockError::Insufficient {
                product_id,
                available: level.stock,
                requested: quantity,
            });
        }
    }

    Ok(requested
        .into_iter()
        .filter_map(|(product_id, quantity)| {
            let level = levels.get(&product_id)?;
            let sold = i32::try_from(quantity).unwrap_or(i32::MAX);
            Some(StockChange {
                product_id,
                new_stock: level.stock.saturating_sub(sold).max(0),
                new_monthly_sales: level.monthly_sales.saturating_add(sold),
            })
        })
        .collect())
}

/// Check that `quantity` more units can go into a cart already holding
/// `in_cart` of a product with `stock` on hand.
#[must_use]
pub const fn can_add_to_cart(stock: i32, in_cart: u32, quantity: u32) -> bool {
    (in_cart as i64) + (quantity as i64) <= stock as i64
}

/// Clamp an admin-entered stock or sales figure at zero.
#[must_use]
pub const fn clamp_non_negative(value: i32) -> i32 {
    if value < 0 { 0 } else { value }
}

/// Units sold per day, rounded to two decimals.
#[must_use]
pub fn daily_velocity(monthly_sales: i32) -> Decimal {
    (Decimal::from(monthly_sales) / DAYS_PER_MONTH).round_dp(2)
}

/// Units sold per week, rounded to two decimals.
#[must_use]
pub fn weekly_velocity(monthly_sales: i32) -> Decimal {
    (Decimal::from(monthly_sales) / WEEKS_PER_MONTH).round_dp(2)
}

/// Monthly sales implied by a weekly figure, rounded to the nearest unit.
#[must_use]
pub fn monthly_from_weekly(weekly: Decimal) -> i32 {
    use rust_decimal::prelude::ToPrimitive;

    (weekly * WEEKS_PER_MONTH)
        .round()
        .to_i32()
        .map_or(0, clamp_non_negative)
}

/// Days of stock left at the current sales pace, if the product sells at all.
#[must_use]
pub fn days_of_cover(stock: i32, monthly_sales: i32) -> Option<Decimal> {
    let daily = daily_velocity(monthly_sales);
    if daily.is_zero() {
        return None;
    }
    Some((Decimal::from(stock.max(0)) / daily).round_dp(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(entries: &[(i32, i32, i32)]) -> HashMap<ProductId, StockLevel> {
        entries
            .iter()
            .map(|&(id, stock, monthly_sales)| {
                (
                    ProductId::new(id),
                    StockLevel {
                        stock,
                        monthly_sales,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_deduction_updates_stock_and_sales() {
        let levels = levels(&[(1, 10, 4), (2, 3, 0)]);
        let changes =
            plan_stock_deduction(&levels, &[(ProductId::new(1), 2), (ProductId::new(2), 3)]);

        assert_eq!(
            changes,
            Ok(vec![
                StockChange {
                    product_id: ProductId::new(1),
                    new_stock: 8,
                    new_monthly_sales: 6,
                },
                StockChange {
                    product_id: ProductId::new(2),
                    new_stock: 0,
                    new_monthly_sales: 3,
                },
            ])
        );
    }

    #[test]
    fn test_deduction_is_all_or_nothing() {
        let levels = levels(&[(1, 10, 0), (2, 1, 0)]);
        let result =
            plan_stock_deduction(&levels, &[(ProductId::new(1), 2), (ProductId::new(2), 2)]);

        assert_eq!(
            result,
            Err(StockError::Insufficient {
                product_id: ProductId::new(2),
                available: 1,
                requested: 2,
            })
        );
    }

    #[test]
    fn test_deduction_sums_duplicate_lines() {
        let levels = levels(&[(1, 3, 0)]);
        let result =
            plan_stock_deduction(&levels, &[(ProductId::new(1), 2), (ProductId::new(1), 2)]);
        assert!(matches!(result, Err(StockError::Insufficient { requested: 4, .. })));
    }

    #[test]
    fn test_deduction_unknown_product() {
        let result = plan_stock_deduction(&HashMap::new(), &[(ProductId::new(5), 1)]);
        assert_eq!(result, Err(StockError::UnknownProduct(ProductId::new(5))));
    }

    #[test]
    fn test_can_add_to_cart() {
        assert!(can_add_to_cart(3, 2, 1));
        assert!(!can_add_to_cart(3, 3, 1));
        assert!(!can_add_to_cart(0, 0, 1));
    }

    #[test]
    fn test_velocity() {
        assert_eq!(daily_velocity(45), Decimal::new(150, 2));
        assert_eq!(daily_velocity(10), Decimal::new(33, 2));
        assert_eq!(weekly_velocity(43), Decimal::from(10));
        assert_eq!(monthly_from_weekly(Decimal::from(10)), 43);
        assert_eq!(monthly_from_weekly(Decimal::from(-2)), 0);
    }

    #[test]
    fn test_days_of_cover() {
        assert_eq!(days_of_cover(30, 30), Some(Decimal::from(30)));
        assert_eq!(days_of_cover(30, 0), None);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(clamp_non_negative(-4), 0);
        assert_eq!(clamp_non_negative(12), 12);
    }
}
