//! Validation utilities for the Crop Trade platform

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.ends_with('.') && email.len() >= 5
        }
        None => false,
    };
    if !valid {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if password.len() > 72 {
        // bcrypt ignores everything past 72 bytes
        return Err("Password must be at most 72 characters");
    }
    Ok(())
}

/// Validate phone number: digits with optional leading `+`, spaces or dashes
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);
    if !body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(6..=15).contains(&digits) {
        return Err("Phone number must have 6 to 15 digits");
    }
    Ok(())
}

/// Validate a required display name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name cannot be empty");
    }
    if name.chars().count() > 200 {
        return Err("Name must be at most 200 characters");
    }
    Ok(())
}

// ============================================================================
// Trading Validations
// ============================================================================

/// Validate a unit label such as "kg", "maund" or "bag"
pub fn validate_unit(unit: &str) -> Result<(), &'static str> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("Unit cannot be empty");
    }
    if unit.chars().count() > 32 {
        return Err("Unit must be at most 32 characters");
    }
    Ok(())
}

/// Validate a price (zero allowed, e.g. free samples)
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate a traded quantity
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate optional list date bounds
pub fn validate_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err("Start date must not be after end date"),
        _ => Ok(()),
    }
}
