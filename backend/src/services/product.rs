//! Product catalogue
//!
//! `current_stock` is read-only here. It starts at zero and only moves
//! through purchases and sales.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{Pagination, PaginatedResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::{patch_text, trimmed};
use crate::services::contact::search_pattern;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub description: Option<String>,
    pub current_stock: Decimal,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub reorder_level: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Unit is required"))]
    pub unit: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
}

/// Input for updating a product; stock is not writable
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Unit cannot be empty"))]
    pub unit: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
}

const PRODUCT_COLUMNS: &str = "id, name, unit, description, current_stock, purchase_price, \
                               sale_price, reorder_level, created_at, updated_at";

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        search: Option<String>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let pattern = search_pattern(search);
        let filter = r#"
            WHERE user_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM products {}", filter))
                .bind(user_id)
                .bind(pattern.as_deref())
                .fetch_one(&self.db)
                .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products {} ORDER BY name, created_at LIMIT $3 OFFSET $4",
            PRODUCT_COLUMNS, filter
        ))
        .bind(user_id)
        .bind(pattern.as_deref())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(products, &pagination, total))
    }

    pub async fn get(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND user_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Create a product with empty stock
    pub async fn create(&self, user_id: Uuid, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        shared::validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;
        shared::validate_unit(&input.unit).map_err(|m| AppError::validation("unit", m))?;
        check_amounts(input.purchase_price, input.sale_price, input.reorder_level)?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (user_id, name, unit, description, current_stock,
                                  purchase_price, sale_price, reorder_level)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.unit.trim())
        .bind(trimmed(input.description))
        .bind(input.purchase_price.unwrap_or(Decimal::ZERO))
        .bind(input.sale_price.unwrap_or(Decimal::ZERO))
        .bind(input.reorder_level.unwrap_or(Decimal::ZERO))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            user_id = %user_id,
            product_id = %product.id,
            name = %product.name,
            "Product created"
        );
        Ok(product)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        if let Some(name) = input.name.as_deref() {
            shared::validate_name(name).map_err(|m| AppError::validation("name", m))?;
        }
        if let Some(unit) = input.unit.as_deref() {
            shared::validate_unit(unit).map_err(|m| AppError::validation("unit", m))?;
        }
        check_amounts(input.purchase_price, input.sale_price, input.reorder_level)?;

        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                unit = COALESCE($2, unit),
                description = CASE WHEN $3::text IS NULL THEN description
                                   ELSE NULLIF($3, '') END,
                purchase_price = COALESCE($4, purchase_price),
                sale_price = COALESCE($5, sale_price),
                reorder_level = COALESCE($6, reorder_level),
                updated_at = NOW()
            WHERE id = $7 AND user_id = $8
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.unit.as_deref().map(str::trim))
        .bind(patch_text(input.description))
        .bind(input.purchase_price)
        .bind(input.sale_price)
        .bind(input.reorder_level)
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Delete a product that appears on no sale or purchase
    pub async fn delete(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        // No row means the product belongs to someone else or does not exist
        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM sale_items WHERE product_id = p.id)
                OR EXISTS(SELECT 1 FROM purchase_items WHERE product_id = p.id)
            FROM products p
            WHERE p.id = $1 AND p.user_id = $2
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        if referenced {
            return Err(AppError::conflict(
                "Product",
                "Product appears on recorded sales or purchases and cannot be deleted",
            ));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND user_id = $2")
            .bind(product_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(AppError::on_reference_violation(
                "Product",
                "Product appears on recorded sales or purchases and cannot be deleted",
            ))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        tracing::info!(user_id = %user_id, product_id = %product_id, "Product deleted");
        Ok(())
    }

    /// Products at or below their reorder level, or below `threshold` when given
    pub async fn low_stock(
        &self,
        user_id: Uuid,
        threshold: Option<Decimal>,
    ) -> AppResult<Vec<Product>> {
        if let Some(threshold) = threshold {
            if threshold < Decimal::ZERO {
                return Err(AppError::validation("threshold", "Threshold cannot be negative"));
            }
        }

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {} FROM products
            WHERE user_id = $1 AND current_stock <= COALESCE($2, reorder_level)
            ORDER BY current_stock, name
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(user_id)
        .bind(threshold)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }
}

fn check_amounts(
    purchase_price: Option<Decimal>,
    sale_price: Option<Decimal>,
    reorder_level: Option<Decimal>,
) -> AppResult<()> {
    for (field, value) in [
        ("purchase_price", purchase_price),
        ("sale_price", sale_price),
        ("reorder_level", reorder_level),
    ] {
        if let Some(value) = value {
            shared::validate_price(value).map_err(|m| AppError::validation(field, m))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_amounts() {
        assert!(check_amounts(Some(Decimal::from(40)), None, Some(Decimal::ZERO)).is_ok());

        let err = check_amounts(None, Some(Decimal::from(-1)), None).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "sale_price"));
    }

    #[test]
    fn test_update_input_ignores_stock() {
        // Unknown fields such as current_stock are dropped, never applied
        let input: UpdateProductInput =
            serde_json::from_str(r#"{ "name": "Potato", "current_stock": "999" }"#).unwrap();
        assert_eq!(input.name.as_deref(), Some("Potato"));
        assert!(input.purchase_price.is_none());
    }
}
