//! Browser tests, run with `wasm-pack test --headless --firefox`

#![cfg(target_arch = "wasm32")]

use crop_trade_wasm::{due_after_payment, is_valid_email, preview_sale};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn sale_preview_reports_profit() {
    let request = r#"{"items":[{"product_id":"5f0c1c1e-6a4e-4c55-9d4b-2f1d3c2b1a00","quantity":"10","cost_price":"18","sale_price":"21"}]}"#;
    let out = preview_sale(request).unwrap();
    assert!(out.contains(r#""total_profit":"30""#));
    assert!(out.contains(r#""due_amount":"210""#));
}

#[wasm_bindgen_test]
fn overpayment_throws() {
    assert!(due_after_payment("50", "50", "1").is_err());
    assert!(is_valid_email("buyer@example.com"));
}
