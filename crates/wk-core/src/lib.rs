//! Core domain logic for workclock.
//!
//! This crate contains the fundamental types and logic for:
//! - Intervals: open and closed time spans, day overlap in a reference zone
//! - Aggregation: hours, cost, per-worker totals, site ranking, daily summaries
//! - Reports: named queries over a [`ShiftStore`] snapshot

pub mod aggregate;
mod error;
pub mod interval;
mod model;
mod report;
pub mod types;

pub use aggregate::{DailySummary, RateTable, SiteActivity, WorkerTotals};
pub use error::{Entity, ReportError};
pub use interval::{CloseError, Interval, InvalidInterval};
pub use model::{Location, Segment, Shift, Worker};
pub use report::{
    ActiveWorkerRow, Earnings, Overview, PayrollRow, QueryContext, Reports, SegmentReport,
    SegmentReportRow, ShiftStore, ShiftSummary, SiteBusynessRow, TimelineEntry, TodaySummary,
    WorkerDetail, round2,
};
pub use types::{LocationId, OrgId, SegmentId, ShiftId, ValidationError, WorkerId};
