//! Sale service
//!
//! A sale issues stock. Creating one locks every product it touches, checks
//! the summed quantity per product against stock, prices the lines at the
//! product's current purchase price as cost, and writes header, items and
//! stock in one transaction. Deleting a sale puts the goods back.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    aggregate_quantities, apply_payment, price_sale, Pagination, PaginatedResponse, SaleLineInput,
    StockMovement,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::trimmed;
use crate::services::stock::{lock_products, plan, write_stock};
use crate::services::RecordPaymentInput;

/// Sale header
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub sale_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub total_profit: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sale line item
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SaleItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub line_total: Decimal,
    pub profit: Decimal,
}

/// Sale with its line items
#[derive(Debug, Serialize)]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Input for creating a sale
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub customer_id: Uuid,
    pub sale_date: Option<NaiveDate>,
    pub paid_amount: Option<Decimal>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<CreateSaleItemInput>,
}

/// One line of a new sale; `sale_price` falls back to the product's price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub sale_price: Option<Decimal>,
}

/// Filters for listing sales
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SaleFilter {
    pub customer_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const SALE_SELECT: &str = r#"
    SELECT s.id, s.customer_id, c.name AS customer_name, s.sale_date,
           s.total_amount, s.paid_amount, s.due_amount, s.total_profit,
           s.note, s.created_at, s.updated_at
    FROM sales s
    JOIN customers c ON c.id = s.customer_id
"#;

const SALE_FILTER: &str = r#"
    WHERE s.user_id = $1
      AND ($2::uuid IS NULL OR s.customer_id = $2)
      AND ($3::date IS NULL OR s.sale_date >= $3)
      AND ($4::date IS NULL OR s.sale_date <= $4)
"#;

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
}

impl SaleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List sales, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: SaleFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Sale>> {
        shared::validate_date_range(filter.from, filter.to)
            .map_err(|m| AppError::validation("from", m))?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM sales s {}",
            SALE_FILTER
        ))
        .bind(user_id)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{} {} ORDER BY s.sale_date DESC, s.created_at DESC LIMIT $5 OFFSET $6",
            SALE_SELECT, SALE_FILTER
        ))
        .bind(user_id)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(sales, &pagination, total))
    }

    /// Get a sale with its items
    pub async fn get(&self, user_id: Uuid, sale_id: Uuid) -> AppResult<SaleWithItems> {
        let sale = fetch_sale(&self.db, user_id, sale_id).await?;
        let items = fetch_items(&self.db, sale_id).await?;
        Ok(SaleWithItems { sale, items })
    }

    /// Record a sale and issue its stock
    pub async fn create(&self, user_id: Uuid, input: CreateSaleInput) -> AppResult<SaleWithItems> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let customer_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1 AND user_id = $2)",
        )
        .bind(input.customer_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if !customer_exists {
            return Err(AppError::NotFound("Customer".to_string()));
        }

        let demand =
            aggregate_quantities(input.items.iter().map(|i| (i.product_id, i.quantity)))?;
        let product_ids: Vec<Uuid> = demand.keys().copied().collect();
        let locked = lock_products(&mut tx, user_id, &product_ids).await?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = locked
                .get(&item.product_id)
                .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
            lines.push(SaleLineInput {
                product_id: item.product_id,
                quantity: item.quantity,
                cost_price: product.purchase_price,
                sale_price: item.sale_price.unwrap_or(product.sale_price),
            });
        }

        let (priced, totals) = price_sale(&lines, input.paid_amount.unwrap_or(Decimal::ZERO))?;
        let levels = plan(StockMovement::Issue, &demand, &locked)?;

        let sale_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sales (user_id, customer_id, sale_date, total_amount, paid_amount,
                               due_amount, total_profit, note)
            VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.customer_id)
        .bind(input.sale_date)
        .bind(totals.total_amount)
        .bind(totals.paid_amount)
        .bind(totals.due_amount)
        .bind(totals.total_profit)
        .bind(trimmed(input.note))
        .fetch_one(&mut *tx)
        .await?;

        for line in &priced {
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_id, product_id, quantity, cost_price, sale_price,
                                        line_total, profit)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.cost_price)
            .bind(line.sale_price)
            .bind(line.line_total)
            .bind(line.profit)
            .execute(&mut *tx)
            .await?;
        }

        write_stock(&mut tx, &locked, &levels).await?;

        let sale = fetch_sale(&mut *tx, user_id, sale_id).await?;
        let items = fetch_items(&mut *tx, sale_id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            sale_id = %sale_id,
            total = %sale.total_amount,
            profit = %sale.total_profit,
            items = items.len(),
            "Sale recorded"
        );

        Ok(SaleWithItems { sale, items })
    }

    /// Delete a sale and return its goods to stock
    pub async fn delete(&self, user_id: Uuid, sale_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM sales WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(sale_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        let items = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT product_id, quantity FROM sale_items WHERE sale_id = $1",
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        let returned = aggregate_quantities(items)?;
        let product_ids: Vec<Uuid> = returned.keys().copied().collect();
        let locked = lock_products(&mut tx, user_id, &product_ids).await?;
        let levels = plan(StockMovement::Receive, &returned, &locked)?;
        write_stock(&mut tx, &locked, &levels).await?;

        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, sale_id = %sale_id, "Sale deleted, stock restored");
        Ok(())
    }

    /// Add a customer payment to a sale
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        sale_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<Sale> {
        let mut tx = self.db.begin().await?;

        let (total, already_paid) = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT total_amount, paid_amount FROM sales WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(sale_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        let (paid, due) = apply_payment(total, already_paid, input.amount)?;

        sqlx::query(
            "UPDATE sales SET paid_amount = $1, due_amount = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(paid)
        .bind(due)
        .bind(sale_id)
        .execute(&mut *tx)
        .await?;

        let sale = fetch_sale(&mut *tx, user_id, sale_id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            sale_id = %sale_id,
            amount = %input.amount,
            due = %due,
            "Sale payment recorded"
        );

        Ok(sale)
    }
}

async fn fetch_sale<'e>(db: impl PgExecutor<'e>, user_id: Uuid, sale_id: Uuid) -> AppResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!("{} WHERE s.id = $1 AND s.user_id = $2", SALE_SELECT))
        .bind(sale_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))
}

async fn fetch_items<'e>(db: impl PgExecutor<'e>, sale_id: Uuid) -> AppResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT si.id, si.product_id, p.name AS product_name, p.unit, si.quantity,
               si.cost_price, si.sale_price, si.line_total, si.profit
        FROM sale_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.sale_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(sale_id)
    .fetch_all(db)
    .await?;

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sale_requires_items() {
        let input = CreateSaleInput {
            customer_id: Uuid::new_v4(),
            sale_date: None,
            paid_amount: None,
            note: None,
            items: vec![],
        };
        let err: AppError = input.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_sale_input_deserializes_without_optional_prices() {
        let json = serde_json::json!({
            "customer_id": Uuid::new_v4(),
            "items": [{ "product_id": Uuid::new_v4(), "quantity": "2.5" }]
        });
        let input: CreateSaleInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.items[0].quantity, Decimal::new(25, 1));
        assert!(input.items[0].sale_price.is_none());
        assert!(input.paid_amount.is_none());
    }
}
