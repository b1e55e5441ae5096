//! Unit counts (stock levels, line and cart quantities).

use crate::error::{DomainError, DomainResult};

/// Largest unit count the persisted schema can hold (a Postgres `INTEGER`).
pub const MAX_UNITS: u32 = i32::MAX as u32;

/// Reject a unit count above [`MAX_UNITS`].
pub fn ensure_units(field: &str, value: u32) -> DomainResult<u32> {
    if value > MAX_UNITS {
        return Err(DomainError::validation(format!("{field} cannot exceed {MAX_UNITS}")));
    }
    Ok(value)
}
