//! Stored entities: workers, locations, shifts and their segments.
//!
//! These are read-only snapshots handed to the aggregation engine by a
//! [`ShiftStore`](crate::ShiftStore). All of them carry their organization.

use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::types::{LocationId, OrgId, SegmentId, ShiftId, WorkerId};

/// A person who clocks in and out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub org_id: OrgId,
    pub name: String,
    pub email: String,
    /// Hourly pay rate. Missing or negative rates cost nothing.
    pub hourly_rate: Option<f64>,
    pub active: bool,
}

impl Worker {
    /// Returns the rate used for cost computations.
    pub fn effective_rate(&self) -> f64 {
        self.hourly_rate
            .filter(|rate| rate.is_finite() && *rate >= 0.0)
            .unwrap_or(0.0)
    }
}

/// A job site a worker can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub org_id: OrgId,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
}

/// The portion of a shift spent at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub shift_id: ShiftId,
    pub location_id: LocationId,
    pub interval: Interval,
}

/// A worker's clock-in/clock-out interval and its location segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub org_id: OrgId,
    pub worker_id: WorkerId,
    pub interval: Interval,
    pub segments: Vec<Segment>,
}

impl Shift {
    pub const fn is_open(&self) -> bool {
        self.interval.is_open()
    }
}
