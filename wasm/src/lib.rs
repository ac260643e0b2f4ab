//! WebAssembly module for the Crop Trade Platform
//!
//! Lets the browser preview what the server will compute for a sale or
//! purchase form, using the same ledger rules:
//! - line totals, sale totals and profit
//! - due amounts and payment limits
//! - stock checks against the quantities on screen
//! - form field validation

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript glue code
pub use shared::ledger::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("crop-trade-wasm loaded"));
}

#[derive(Debug, Deserialize)]
struct SalePreviewRequest {
    items: Vec<SaleLineInput>,
    #[serde(default)]
    paid_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct PurchasePreviewRequest {
    items: Vec<PurchaseLineInput>,
    #[serde(default)]
    paid_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct StockCheckRequest {
    /// Current stock per product
    stock: BTreeMap<Uuid, Decimal>,
    /// Form lines as `(product_id, quantity)`
    items: Vec<StockCheckLine>,
}

#[derive(Debug, Deserialize)]
struct StockCheckLine {
    product_id: Uuid,
    quantity: Decimal,
}

fn preview_sale_json(request_json: &str) -> Result<String, String> {
    let request: SalePreviewRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid sale JSON: {}", e))?;
    let (lines, totals) =
        price_sale(&request.items, request.paid_amount).map_err(|e| e.to_string())?;

    serde_json::to_string(&serde_json::json!({ "items": lines, "totals": totals }))
        .map_err(|e| e.to_string())
}

fn preview_purchase_json(request_json: &str) -> Result<String, String> {
    let request: PurchasePreviewRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid purchase JSON: {}", e))?;
    let (lines, totals) =
        price_purchase(&request.items, request.paid_amount).map_err(|e| e.to_string())?;

    serde_json::to_string(&serde_json::json!({ "items": lines, "totals": totals }))
        .map_err(|e| e.to_string())
}

fn check_stock_json(request_json: &str) -> Result<String, String> {
    let request: StockCheckRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;
    let demand = aggregate_quantities(request.items.iter().map(|i| (i.product_id, i.quantity)))
        .map_err(|e| e.to_string())?;
    let remaining =
        plan_movement(StockMovement::Issue, &demand, &request.stock).map_err(|e| e.to_string())?;

    serde_json::to_string(&remaining).map_err(|e| e.to_string())
}

fn parse_decimal(value: &str) -> Result<Decimal, String> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|_| format!("'{}' is not a number", value))
}

fn due_after_payment_str(total: &str, paid: &str, amount: &str) -> Result<String, String> {
    let total = parse_decimal(total)?;
    let paid = parse_decimal(paid)?;
    let amount = parse_decimal(amount)?;
    let (_, due) = apply_payment(total, paid, amount).map_err(|e| e.to_string())?;
    Ok(due.to_string())
}

/// Price a sale form: `{ items: [{product_id, quantity, cost_price, sale_price}], paid_amount }`
#[wasm_bindgen]
pub fn preview_sale(request_json: &str) -> Result<String, JsValue> {
    preview_sale_json(request_json).map_err(|e| js_sys::Error::new(&e).into())
}

/// Price a purchase form: `{ items: [{product_id, quantity, unit_price}], paid_amount }`
#[wasm_bindgen]
pub fn preview_purchase(request_json: &str) -> Result<String, JsValue> {
    preview_purchase_json(request_json).map_err(|e| js_sys::Error::new(&e).into())
}

/// Check form quantities against stock and return the stock left per product
#[wasm_bindgen]
pub fn check_stock(request_json: &str) -> Result<String, JsValue> {
    check_stock_json(request_json).map_err(|e| js_sys::Error::new(&e).into())
}

/// Due amount after adding a payment; decimals travel as strings
#[wasm_bindgen]
pub fn due_after_payment(total: &str, paid: &str, amount: &str) -> Result<String, JsValue> {
    due_after_payment_str(total, paid, amount).map_err(|e| js_sys::Error::new(&e).into())
}

/// Validate a phone number field
#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_phone(phone).is_ok()
}

/// Validate an email field
#[wasm_bindgen]
pub fn is_valid_email(email: &str) -> bool {
    validate_email(email).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_sale() {
        let id = Uuid::new_v4();
        let request = format!(
            r#"{{"items":[{{"product_id":"{id}","quantity":"4","cost_price":"30","sale_price":"35.5"}}],"paid_amount":"100"}}"#
        );
        let out: serde_json::Value =
            serde_json::from_str(&preview_sale_json(&request).unwrap()).unwrap();
        let totals = &out["totals"];
        assert_eq!(totals["total_amount"], "142.0");
        assert_eq!(totals["total_profit"], "22.0");
        assert_eq!(totals["due_amount"], "42.0");
    }

    #[test]
    fn test_preview_purchase_rejects_overpayment() {
        let id = Uuid::new_v4();
        let request = format!(
            r#"{{"items":[{{"product_id":"{id}","quantity":"2","unit_price":"10"}}],"paid_amount":"25"}}"#
        );
        let err = preview_purchase_json(&request).unwrap_err();
        assert!(err.contains("exceeds total"));
    }

    #[test]
    fn test_check_stock_aggregates_lines() {
        let id = Uuid::new_v4();
        let request = format!(
            r#"{{"stock":{{"{id}":"5"}},"items":[{{"product_id":"{id}","quantity":"3"}},{{"product_id":"{id}","quantity":"3"}}]}}"#
        );
        let err = check_stock_json(&request).unwrap_err();
        assert!(err.contains("insufficient stock"));
    }

    #[test]
    fn test_preview_sale_with_huge_quantity_is_an_error() {
        let id = Uuid::new_v4();
        let request = format!(
            r#"{{"items":[{{"product_id":"{id}","quantity":"79228162514264337593543950335","cost_price":"1","sale_price":"2"}}]}}"#
        );
        let err = preview_sale_json(&request).unwrap_err();
        assert!(err.contains("too large"));
    }

    #[test]
    fn test_due_after_payment() {
        assert_eq!(due_after_payment_str("100", "40", "25.5").unwrap(), "34.5");
        assert!(due_after_payment_str("100", "40", "61").is_err());
        assert!(due_after_payment_str("abc", "0", "1").is_err());
    }

    #[test]
    fn test_field_validation() {
        assert!(is_valid_phone("+880 1711-000000"));
        assert!(!is_valid_email("nobody"));
    }
}
