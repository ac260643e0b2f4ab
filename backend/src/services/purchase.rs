//! Purchase service
//!
//! A purchase receives stock from a provider. Deleting one issues the same
//! quantities back out, which fails if the goods have since been sold.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    aggregate_quantities, apply_payment, price_purchase, Pagination, PaginatedResponse,
    PurchaseLineInput, StockMovement,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::trimmed;
use crate::services::stock::{lock_products, plan, write_stock};
use crate::services::RecordPaymentInput;

/// Purchase header
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub purchase_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PurchaseItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseWithItems {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

/// Input for creating a purchase
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    pub provider_id: Uuid,
    pub purchase_date: Option<NaiveDate>,
    pub paid_amount: Option<Decimal>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<CreatePurchaseItemInput>,
}

/// One line of a new purchase; `unit_price` falls back to the product's purchase price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PurchaseFilter {
    pub provider_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const PURCHASE_SELECT: &str = r#"
    SELECT pu.id, pu.provider_id, pr.name AS provider_name, pu.purchase_date,
           pu.total_amount, pu.paid_amount, pu.due_amount, pu.note,
           pu.created_at, pu.updated_at
    FROM purchases pu
    JOIN providers pr ON pr.id = pu.provider_id
"#;

const PURCHASE_FILTER: &str = r#"
    WHERE pu.user_id = $1
      AND ($2::uuid IS NULL OR pu.provider_id = $2)
      AND ($3::date IS NULL OR pu.purchase_date >= $3)
      AND ($4::date IS NULL OR pu.purchase_date <= $4)
"#;

/// Purchase service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

impl PurchaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List purchases, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: PurchaseFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Purchase>> {
        shared::validate_date_range(filter.from, filter.to)
            .map_err(|m| AppError::validation("from", m))?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM purchases pu {}",
            PURCHASE_FILTER
        ))
        .bind(user_id)
        .bind(filter.provider_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "{} {} ORDER BY pu.purchase_date DESC, pu.created_at DESC LIMIT $5 OFFSET $6",
            PURCHASE_SELECT, PURCHASE_FILTER
        ))
        .bind(user_id)
        .bind(filter.provider_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(purchases, &pagination, total))
    }

    pub async fn get(&self, user_id: Uuid, purchase_id: Uuid) -> AppResult<PurchaseWithItems> {
        let purchase = fetch_purchase(&self.db, user_id, purchase_id).await?;
        let items = fetch_items(&self.db, purchase_id).await?;
        Ok(PurchaseWithItems { purchase, items })
    }

    /// Record a purchase and receive its stock
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreatePurchaseInput,
    ) -> AppResult<PurchaseWithItems> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let provider_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM providers WHERE id = $1 AND user_id = $2)",
        )
        .bind(input.provider_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if !provider_exists {
            return Err(AppError::NotFound("Provider".to_string()));
        }

        let received =
            aggregate_quantities(input.items.iter().map(|i| (i.product_id, i.quantity)))?;
        let product_ids: Vec<Uuid> = received.keys().copied().collect();
        let locked = lock_products(&mut tx, user_id, &product_ids).await?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = locked
                .get(&item.product_id)
                .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
            lines.push(PurchaseLineInput {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.unwrap_or(product.purchase_price),
            });
        }

        let (priced, totals) = price_purchase(&lines, input.paid_amount.unwrap_or(Decimal::ZERO))?;
        let levels = plan(StockMovement::Receive, &received, &locked)?;

        let purchase_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchases (user_id, provider_id, purchase_date, total_amount,
                                   paid_amount, due_amount, note)
            VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.provider_id)
        .bind(input.purchase_date)
        .bind(totals.total_amount)
        .bind(totals.paid_amount)
        .bind(totals.due_amount)
        .bind(trimmed(input.note))
        .fetch_one(&mut *tx)
        .await?;

        for line in &priced {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, product_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(purchase_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        write_stock(&mut tx, &locked, &levels).await?;

        let purchase = fetch_purchase(&mut *tx, user_id, purchase_id).await?;
        let items = fetch_items(&mut *tx, purchase_id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            purchase_id = %purchase_id,
            total = %purchase.total_amount,
            items = items.len(),
            "Purchase recorded"
        );

        Ok(PurchaseWithItems { purchase, items })
    }

    /// Delete a purchase and take its goods back out of stock
    pub async fn delete(&self, user_id: Uuid, purchase_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM purchases WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(purchase_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        let items = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT product_id, quantity FROM purchase_items WHERE purchase_id = $1",
        )
        .bind(purchase_id)
        .fetch_all(&mut *tx)
        .await?;

        let reversed = aggregate_quantities(items)?;
        let product_ids: Vec<Uuid> = reversed.keys().copied().collect();
        let locked = lock_products(&mut tx, user_id, &product_ids).await?;
        // Fails when part of the purchase has already been sold
        let levels = plan(StockMovement::Issue, &reversed, &locked)?;
        write_stock(&mut tx, &locked, &levels).await?;

        sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            purchase_id = %purchase_id,
            "Purchase deleted, stock reversed"
        );
        Ok(())
    }

    /// Add a payment to a provider against a purchase
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        purchase_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<Purchase> {
        let mut tx = self.db.begin().await?;

        let (total, already_paid) = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT total_amount, paid_amount FROM purchases WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(purchase_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        let (paid, due) = apply_payment(total, already_paid, input.amount)?;

        sqlx::query(
            "UPDATE purchases SET paid_amount = $1, due_amount = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(paid)
        .bind(due)
        .bind(purchase_id)
        .execute(&mut *tx)
        .await?;

        let purchase = fetch_purchase(&mut *tx, user_id, purchase_id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            purchase_id = %purchase_id,
            amount = %input.amount,
            due = %due,
            "Purchase payment recorded"
        );

        Ok(purchase)
    }
}

async fn fetch_purchase<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    purchase_id: Uuid,
) -> AppResult<Purchase> {
    sqlx::query_as::<_, Purchase>(&format!(
        "{} WHERE pu.id = $1 AND pu.user_id = $2",
        PURCHASE_SELECT
    ))
    .bind(purchase_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase".to_string()))
}

async fn fetch_items<'e>(
    db: impl PgExecutor<'e>,
    purchase_id: Uuid,
) -> AppResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        r#"
        SELECT pi.id, pi.product_id, p.name AS product_name, p.unit, pi.quantity,
               pi.unit_price, pi.line_total
        FROM purchase_items pi
        JOIN products p ON p.id = pi.product_id
        WHERE pi.purchase_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(purchase_id)
    .fetch_all(db)
    .await?;

    Ok(items)
}
