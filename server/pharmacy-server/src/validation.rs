//! Request validation utilities shared by the handlers
//!
//! Request types implement `RequestValidation`; the macros below keep the
//! error messages uniform.

use crate::error::ApiError;

/// Trait for validating request payloads
///
/// # Example
///
/// ```rust,ignore
/// impl RequestValidation for AddStockRequest {
///     fn validate(&self) -> Result<(), ApiError> {
///         validate_positive_id!(self.drug_id, "drug_id must be a positive integer");
///         validate_field!(self.quantity, self.quantity > 0, "quantity must be positive");
///         Ok(())
///     }
/// }
/// ```
pub trait RequestValidation {
    fn validate(&self) -> Result<(), ApiError>;
}

/// Return a validation error unless `$predicate` holds.
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::validation($message));
        }
    };
}

/// Non-empty after trimming.
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        $crate::validate_field!($field, !$field.trim().is_empty(), $message);
    };
}

/// Database ids are positive integers.
#[macro_export]
macro_rules! validate_positive_id {
    ($field:expr, $message:expr) => {
        $crate::validate_field!($field, $field > 0, $message);
    };
}

#[macro_export]
macro_rules! validate_range {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        $crate::validate_field!($field, $field >= $min && $field <= $max, $message);
    };
}
