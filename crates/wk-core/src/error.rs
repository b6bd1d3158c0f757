//! Errors surfaced by report queries.

use chrono::NaiveDate;
use thiserror::Error;

use crate::interval::InvalidInterval;

/// The kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Worker,
    Location,
}

impl Entity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Location => "location",
        }
    }
}

/// Report query errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A stored interval ends before it starts.
    #[error("invalid stored interval: {0}")]
    InvalidInterval(#[from] InvalidInterval),

    /// The requested identity does not exist in the organization.
    #[error("{} not found: {id}", entity.as_str())]
    NotFound { entity: Entity, id: i64 },

    /// A date range whose first day comes after its last.
    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    /// The store could not produce a snapshot.
    #[error("storage unavailable")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ReportError {
    pub(crate) fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StorageUnavailable(Box::new(err))
    }
}
