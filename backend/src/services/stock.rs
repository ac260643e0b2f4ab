//! Locked stock access shared by the purchase and sale services
//!
//! Callers run inside a transaction: lock the product rows, plan the movement
//! with [`shared::plan_movement`], then write the planned levels back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use shared::{plan_movement, StockMovement};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{name_stock_error, AppError, AppResult};

/// Product row held under `FOR UPDATE` for the rest of the transaction
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: Uuid,
    pub name: String,
    pub current_stock: Decimal,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
}

/// Lock the given products of a trader, in id order.
///
/// Every id must belong to `user_id`; a foreign or unknown id is reported as
/// a missing product.
pub async fn lock_products(
    conn: &mut PgConnection,
    user_id: Uuid,
    product_ids: &[Uuid],
) -> AppResult<BTreeMap<Uuid, LockedProduct>> {
    let rows = sqlx::query_as::<_, LockedProduct>(
        r#"
        SELECT id, name, current_stock, purchase_price, sale_price
        FROM products
        WHERE user_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let locked: BTreeMap<Uuid, LockedProduct> = rows.into_iter().map(|p| (p.id, p)).collect();

    if let Some(missing) = product_ids.iter().find(|id| !locked.contains_key(id)) {
        tracing::debug!(product_id = %missing, "Product not found while locking stock");
        return Err(AppError::NotFound("Product".to_string()));
    }

    Ok(locked)
}

/// Plan a movement against locked rows, naming the product on a shortfall
pub fn plan(
    movement: StockMovement,
    demand: &BTreeMap<Uuid, Decimal>,
    locked: &BTreeMap<Uuid, LockedProduct>,
) -> AppResult<BTreeMap<Uuid, Decimal>> {
    let stock: BTreeMap<Uuid, Decimal> = locked
        .iter()
        .map(|(id, p)| (*id, p.current_stock))
        .collect();

    plan_movement(movement, demand, &stock)
        .map_err(|err| name_stock_error(err, |id| locked.get(&id).map(|p| p.name.clone())))
}

/// Write planned stock levels back.
///
/// Each update only applies while the row still holds the level it was
/// planned from.
pub async fn write_stock(
    conn: &mut PgConnection,
    locked: &BTreeMap<Uuid, LockedProduct>,
    levels: &BTreeMap<Uuid, Decimal>,
) -> AppResult<()> {
    for (product_id, level) in levels {
        let expected = locked
            .get(product_id)
            .map(|p| p.current_stock)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = $1, updated_at = NOW()
            WHERE id = $2 AND current_stock = $3
            "#,
        )
        .bind(level)
        .bind(product_id)
        .bind(expected)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "Stock of product {} changed while locked",
                product_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked(id: Uuid, name: &str, stock: i64) -> LockedProduct {
        LockedProduct {
            id,
            name: name.to_string(),
            current_stock: Decimal::from(stock),
            purchase_price: Decimal::from(10),
            sale_price: Decimal::from(12),
        }
    }

    #[test]
    fn test_plan_issue_names_short_product() {
        let rice = Uuid::new_v4();
        let rows = BTreeMap::from([(rice, locked(rice, "Aman Rice", 4))]);
        let demand = BTreeMap::from([(rice, Decimal::from(5))]);

        let err = plan(StockMovement::Issue, &demand, &rows).unwrap_err();
        match err {
            AppError::InsufficientStock { product, requested, available } => {
                assert_eq!(product, "Aman Rice");
                assert_eq!(requested, Decimal::from(5));
                assert_eq!(available, Decimal::from(4));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plan_receive_adds_to_stock() {
        let jute = Uuid::new_v4();
        let rows = BTreeMap::from([(jute, locked(jute, "Jute", 7))]);
        let demand = BTreeMap::from([(jute, Decimal::from(3))]);

        let levels = plan(StockMovement::Receive, &demand, &rows).unwrap();
        assert_eq!(levels[&jute], Decimal::from(10));
    }
}
