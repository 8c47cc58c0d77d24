//! # Validation Module
//!
//! Local checks run by the mutation controllers before a request is built.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE - obvious mistakes caught without a round trip   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Server - 400/422 with field messages                         │
//! │                                                                         │
//! │  Both surface to callers as ClientError::Validation                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use courier_core::validation::{validate_name, validate_time_of_day};
//!
//! assert!(validate_name("name", "Drinks").is_ok());
//! assert!(validate_time_of_day("start_time", "25:00").is_err());
//! ```

use chrono::NaiveTime;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CategoryInput, DriverInput, ProductInput, StoreInput};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_PLATE_LEN: usize = 12;

// =============================================================================
// Field Validators
// =============================================================================

/// Non-empty after trimming, at most 200 characters.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Prices must be strictly positive.
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Accepts `HH:MM` or `HH:MM:SS` (24h clock).
pub fn validate_time_of_day(field: &str, value: &str) -> ValidationResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected HH:MM".to_string(),
        })
}

/// Letters, digits, spaces and hyphens; 2 to 12 characters.
pub fn validate_license_plate(value: &str) -> ValidationResult<()> {
    let value = value.trim();
    let field = "vehicle_license_plate";

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_PLATE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_PLATE_LEN,
        });
    }

    let valid = value.len() >= 2
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ' ');
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, spaces and hyphens".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

pub fn validate_category(input: &CategoryInput) -> ValidationResult<()> {
    validate_name("name", &input.name)
}

pub fn validate_product(input: &ProductInput) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    validate_price(input.price)
}

pub fn validate_driver(input: &DriverInput) -> ValidationResult<()> {
    validate_name("vehicle_type", &input.vehicle_type)?;
    validate_license_plate(&input.vehicle_license_plate)?;
    validate_name("vehicle_color", &input.vehicle_color)
}

/// Also checks that the store does not close before it opens, unless the
/// hours wrap past midnight (`end < start` is allowed, `end == start` is not).
pub fn validate_store(input: &StoreInput) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    validate_name("address", &input.address)?;
    validate_name("phone", &input.phone)?;
    let start = validate_time_of_day("start_time", &input.start_time)?;
    let end = validate_time_of_day("end_time", &input.end_time)?;
    if start == end {
        return Err(ValidationError::InvalidFormat {
            field: "end_time".to_string(),
            reason: "must differ from start_time".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
