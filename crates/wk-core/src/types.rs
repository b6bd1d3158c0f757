//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// An hourly rate was negative or not a number.
    #[error("hourly rate must be a non-negative number, got {value}")]
    InvalidRate { value: f64 },
}

/// Generates an integer ID newtype with common trait implementations.
///
/// IDs are SQLite rowids and serialize as plain integers.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw rowid.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw rowid.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(
    /// An organization (tenant) identifier.
    ///
    /// Every aggregation is scoped to exactly one organization.
    OrgId
);

define_id!(
    /// A worker identifier.
    WorkerId
);

define_id!(
    /// A location (job site) identifier.
    LocationId
);

define_id!(
    /// A shift identifier.
    ShiftId
);

define_id!(
    /// A shift segment identifier.
    SegmentId
);

/// Validates a display name, returning the trimmed value.
pub fn validate_name(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.to_string())
}

/// Validates an hourly rate.
///
/// Rates must be finite and non-negative. Reporting tolerates bad stored
/// rates, but new writes must not introduce them.
pub fn validate_rate(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidRate { value });
    }
    Ok(value)
}
