//! Stock and money ledger rules for purchases and sales
//!
//! Everything here is pure arithmetic so the server and the browser price a
//! transaction identically. The backend loads and locks product rows, then
//! hands the numbers to these functions before writing anything back.
//!
//! Rules:
//! - `line_total = price * quantity`
//! - `profit = (sale_price - cost_price) * quantity`
//! - `due = total - paid`, with `0 <= paid <= total`
//! - stock never goes below zero; a movement that would do so is rejected

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{validate_price, validate_quantity};

/// Ledger rule violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("at least one item is required")]
    NoItems,

    #[error("item {index}: quantity must be greater than zero")]
    NonPositiveQuantity { index: usize },

    #[error("item {index}: price cannot be negative")]
    NegativePrice { index: usize },

    #[error("paid amount cannot be negative")]
    NegativePayment,

    #[error("payment must be greater than zero")]
    NonPositivePayment,

    #[error("paid amount {paid} exceeds total {total}")]
    Overpayment { total: Decimal, paid: Decimal },

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("product {0} not found")]
    UnknownProduct(Uuid),

    #[error("amount is too large")]
    AmountOverflow,
}

fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::AmountOverflow)
}

fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_mul(b).ok_or(LedgerError::AmountOverflow)
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Result<Decimal, LedgerError> {
    values.try_fold(Decimal::ZERO, checked_add)
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMovement {
    /// Goods come in: purchase created, sale deleted
    Receive,
    /// Goods go out: sale created, purchase deleted
    Issue,
}

impl StockMovement {
    /// Apply this movement to `current` stock
    pub fn apply(
        self,
        product_id: Uuid,
        current: Decimal,
        quantity: Decimal,
    ) -> Result<Decimal, LedgerError> {
        match self {
            StockMovement::Receive => checked_add(current, quantity),
            StockMovement::Issue => {
                if quantity > current {
                    return Err(LedgerError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: current,
                    });
                }
                Ok(current - quantity)
            }
        }
    }
}

/// A sale line before pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
}

/// A priced sale line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub line_total: Decimal,
    pub profit: Decimal,
}

impl SaleLine {
    pub fn price(input: &SaleLineInput) -> Result<Self, LedgerError> {
        let margin = input
            .sale_price
            .checked_sub(input.cost_price)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(Self {
            product_id: input.product_id,
            quantity: input.quantity,
            cost_price: input.cost_price,
            sale_price: input.sale_price,
            line_total: checked_mul(input.sale_price, input.quantity)?,
            profit: checked_mul(margin, input.quantity)?,
        })
    }
}

/// A purchase line before pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// A priced purchase line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl PurchaseLine {
    pub fn price(input: &PurchaseLineInput) -> Result<Self, LedgerError> {
        Ok(Self {
            product_id: input.product_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            line_total: checked_mul(input.unit_price, input.quantity)?,
        })
    }
}

/// Header amounts for a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub total_profit: Decimal,
}

/// Header amounts for a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseTotals {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
}

/// Amount still owed
pub fn due_amount(total: Decimal, paid: Decimal) -> Decimal {
    total - paid
}

/// Check a paid amount against a total and return the due amount
pub fn settle(total: Decimal, paid: Decimal) -> Result<Decimal, LedgerError> {
    if paid < Decimal::ZERO {
        return Err(LedgerError::NegativePayment);
    }
    if paid > total {
        return Err(LedgerError::Overpayment { total, paid });
    }
    Ok(due_amount(total, paid))
}

/// Add a further payment to an existing record, returning `(paid, due)`
pub fn apply_payment(
    total: Decimal,
    already_paid: Decimal,
    amount: Decimal,
) -> Result<(Decimal, Decimal), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositivePayment);
    }
    let paid = checked_add(already_paid, amount)?;
    let due = settle(total, paid)?;
    Ok((paid, due))
}

/// Price every sale line and total the header
pub fn price_sale(
    lines: &[SaleLineInput],
    paid: Decimal,
) -> Result<(Vec<SaleLine>, SaleTotals), LedgerError> {
    if lines.is_empty() {
        return Err(LedgerError::NoItems);
    }
    for (index, line) in lines.iter().enumerate() {
        check_line(index, line.quantity, &[line.cost_price, line.sale_price])?;
    }

    let priced = lines
        .iter()
        .map(SaleLine::price)
        .collect::<Result<Vec<_>, _>>()?;
    let total_amount = checked_sum(priced.iter().map(|l| l.line_total))?;
    let total_profit = checked_sum(priced.iter().map(|l| l.profit))?;
    let due_amount = settle(total_amount, paid)?;

    Ok((
        priced,
        SaleTotals {
            total_amount,
            paid_amount: paid,
            due_amount,
            total_profit,
        },
    ))
}

/// Price every purchase line and total the header
pub fn price_purchase(
    lines: &[PurchaseLineInput],
    paid: Decimal,
) -> Result<(Vec<PurchaseLine>, PurchaseTotals), LedgerError> {
    if lines.is_empty() {
        return Err(LedgerError::NoItems);
    }
    for (index, line) in lines.iter().enumerate() {
        check_line(index, line.quantity, &[line.unit_price])?;
    }

    let priced = lines
        .iter()
        .map(PurchaseLine::price)
        .collect::<Result<Vec<_>, _>>()?;
    let total_amount = checked_sum(priced.iter().map(|l| l.line_total))?;
    let due_amount = settle(total_amount, paid)?;

    Ok((
        priced,
        PurchaseTotals {
            total_amount,
            paid_amount: paid,
            due_amount,
        },
    ))
}

fn check_line(index: usize, quantity: Decimal, prices: &[Decimal]) -> Result<(), LedgerError> {
    if validate_quantity(quantity).is_err() {
        return Err(LedgerError::NonPositiveQuantity { index });
    }
    if prices.iter().any(|p| validate_price(*p).is_err()) {
        return Err(LedgerError::NegativePrice { index });
    }
    Ok(())
}

/// Sum quantities per product.
///
/// The map is ordered by product id, which is also the order product rows
/// are locked in.
pub fn aggregate_quantities<I>(items: I) -> Result<BTreeMap<Uuid, Decimal>, LedgerError>
where
    I: IntoIterator<Item = (Uuid, Decimal)>,
{
    let mut totals = BTreeMap::new();
    for (product_id, quantity) in items {
        let total = totals.entry(product_id).or_insert(Decimal::ZERO);
        *total = checked_add(*total, quantity)?;
    }
    Ok(totals)
}

/// Compute new stock levels for a movement over several products.
///
/// Fails on the first product that is missing from `stock` or would go
/// negative; nothing is returned in that case, so callers never write a
/// partial result.
pub fn plan_movement(
    movement: StockMovement,
    demand: &BTreeMap<Uuid, Decimal>,
    stock: &BTreeMap<Uuid, Decimal>,
) -> Result<BTreeMap<Uuid, Decimal>, LedgerError> {
    demand
        .iter()
        .map(|(product_id, quantity)| {
            let current = stock
                .get(product_id)
                .copied()
                .ok_or(LedgerError::UnknownProduct(*product_id))?;
            let next = movement.apply(*product_id, current, *quantity)?;
            Ok((*product_id, next))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sale_line(product_id: Uuid, qty: &str, cost: &str, price: &str) -> SaleLineInput {
        SaleLineInput {
            product_id,
            quantity: dec(qty),
            cost_price: dec(cost),
            sale_price: dec(price),
        }
    }

    #[test]
    fn test_sale_line_profit() {
        let line = SaleLine::price(&sale_line(Uuid::new_v4(), "12.5", "20", "26")).unwrap();
        assert_eq!(line.line_total, dec("325"));
        assert_eq!(line.profit, dec("75"));
    }

    #[test]
    fn test_sale_below_cost_is_a_loss() {
        let line = SaleLine::price(&sale_line(Uuid::new_v4(), "10", "30", "25")).unwrap();
        assert_eq!(line.profit, dec("-50"));
    }

    #[test]
    fn test_price_sale_totals() {
        let rice = Uuid::new_v4();
        let wheat = Uuid::new_v4();
        let (lines, totals) = price_sale(
            &[
                sale_line(rice, "100", "40", "45"),
                sale_line(wheat, "50", "30", "36.5"),
            ],
            dec("4000"),
        )
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(totals.total_amount, dec("6325"));
        assert_eq!(totals.total_profit, dec("825"));
        assert_eq!(totals.paid_amount, dec("4000"));
        assert_eq!(totals.due_amount, dec("2325"));
    }

    #[test]
    fn test_price_sale_rejects_bad_lines() {
        let id = Uuid::new_v4();
        assert_eq!(price_sale(&[], Decimal::ZERO), Err(LedgerError::NoItems));
        assert_eq!(
            price_sale(&[sale_line(id, "0", "1", "2")], Decimal::ZERO),
            Err(LedgerError::NonPositiveQuantity { index: 0 })
        );
        assert_eq!(
            price_sale(
                &[sale_line(id, "1", "1", "2"), sale_line(id, "1", "1", "-2")],
                Decimal::ZERO
            ),
            Err(LedgerError::NegativePrice { index: 1 })
        );
    }

    #[test]
    fn test_price_sale_rejects_overpayment() {
        let id = Uuid::new_v4();
        let result = price_sale(&[sale_line(id, "2", "1", "5")], dec("11"));
        assert_eq!(
            result,
            Err(LedgerError::Overpayment {
                total: dec("10"),
                paid: dec("11"),
            })
        );
    }

    #[test]
    fn test_price_purchase_totals() {
        let (lines, totals) = price_purchase(
            &[PurchaseLineInput {
                product_id: Uuid::new_v4(),
                quantity: dec("250"),
                unit_price: dec("18.40"),
            }],
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(lines[0].line_total, dec("4600"));
        assert_eq!(totals.total_amount, dec("4600"));
        assert_eq!(totals.due_amount, dec("4600"));
    }

    #[test]
    fn test_apply_payment() {
        assert_eq!(
            apply_payment(dec("100"), dec("40"), dec("60")),
            Ok((dec("100"), Decimal::ZERO))
        );
        assert_eq!(
            apply_payment(dec("100"), dec("40"), Decimal::ZERO),
            Err(LedgerError::NonPositivePayment)
        );
        assert!(matches!(
            apply_payment(dec("100"), dec("40"), dec("61")),
            Err(LedgerError::Overpayment { .. })
        ));
    }

    #[test]
    fn test_settle_negative() {
        assert_eq!(settle(dec("10"), dec("-1")), Err(LedgerError::NegativePayment));
    }

    #[test]
    fn test_aggregate_quantities_merges_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals =
            aggregate_quantities(vec![(a, dec("3")), (b, dec("1")), (a, dec("4.5"))]).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], dec("7.5"));
        assert_eq!(totals[&b], dec("1"));
    }

    #[test]
    fn test_plan_issue_checks_aggregated_quantity() {
        let a = Uuid::new_v4();
        let demand = aggregate_quantities(vec![(a, dec("6")), (a, dec("6"))]).unwrap();
        let stock = BTreeMap::from([(a, dec("10"))]);

        assert_eq!(
            plan_movement(StockMovement::Issue, &demand, &stock),
            Err(LedgerError::InsufficientStock {
                product_id: a,
                requested: dec("12"),
                available: dec("10"),
            })
        );
    }

    #[test]
    fn test_plan_receive_and_issue() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stock = BTreeMap::from([(a, dec("10")), (b, dec("0"))]);
        let demand = BTreeMap::from([(a, dec("4")), (b, dec("2"))]);

        let received = plan_movement(StockMovement::Receive, &demand, &stock).unwrap();
        assert_eq!(received[&a], dec("14"));
        assert_eq!(received[&b], dec("2"));

        let issued = plan_movement(StockMovement::Issue, &demand, &received).unwrap();
        assert_eq!(issued, stock);
    }

    #[test]
    fn test_plan_unknown_product() {
        let a = Uuid::new_v4();
        let demand = BTreeMap::from([(a, dec("1"))]);
        assert_eq!(
            plan_movement(StockMovement::Receive, &demand, &BTreeMap::new()),
            Err(LedgerError::UnknownProduct(a))
        );
    }

    #[test]
    fn test_issue_exact_stock_leaves_zero() {
        let id = Uuid::new_v4();
        assert_eq!(
            StockMovement::Issue.apply(id, dec("5.5"), dec("5.5")),
            Ok(Decimal::ZERO)
        );
    }

    #[test]
    fn test_huge_quantities_overflow_without_panicking() {
        let id = Uuid::new_v4();
        let huge = SaleLineInput {
            product_id: id,
            quantity: Decimal::MAX,
            cost_price: dec("1"),
            sale_price: dec("2"),
        };
        assert_eq!(price_sale(&[huge], Decimal::ZERO), Err(LedgerError::AmountOverflow));

        let purchase = PurchaseLineInput {
            product_id: id,
            quantity: Decimal::MAX,
            unit_price: dec("1.5"),
        };
        assert_eq!(
            price_purchase(&[purchase], Decimal::ZERO),
            Err(LedgerError::AmountOverflow)
        );

        assert_eq!(
            aggregate_quantities(vec![(id, Decimal::MAX), (id, Decimal::MAX)]),
            Err(LedgerError::AmountOverflow)
        );
        assert_eq!(
            StockMovement::Receive.apply(id, Decimal::MAX, dec("1")),
            Err(LedgerError::AmountOverflow)
        );
        assert_eq!(
            apply_payment(Decimal::MAX, Decimal::MAX, dec("1")),
            Err(LedgerError::AmountOverflow)
        );
    }

    #[test]
    fn test_line_totals_overflow_when_summed() {
        let line = |id| PurchaseLineInput {
            product_id: id,
            quantity: Decimal::MAX,
            unit_price: dec("1"),
        };
        assert_eq!(
            price_purchase(&[line(Uuid::new_v4()), line(Uuid::new_v4())], Decimal::ZERO),
            Err(LedgerError::AmountOverflow)
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn amount() -> impl Strategy<Value = Decimal> {
            (0i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 2))
        }

        proptest! {
            #[test]
            fn prop_settle_respects_bounds(total in amount(), paid in amount()) {
                match settle(total, paid) {
                    Ok(due) => {
                        prop_assert!(paid <= total);
                        prop_assert_eq!(due + paid, total);
                    }
                    Err(LedgerError::Overpayment { .. }) => prop_assert!(paid > total),
                    Err(other) => prop_assert!(false, "unexpected {:?}", other),
                }
            }

            #[test]
            fn prop_receive_then_issue_is_identity(current in amount(), quantity in amount()) {
                let id = Uuid::new_v4();
                let received = StockMovement::Receive.apply(id, current, quantity).unwrap();
                prop_assert_eq!(StockMovement::Issue.apply(id, received, quantity), Ok(current));
            }
        }
    }
}
