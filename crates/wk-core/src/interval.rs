//! Bounded and open-ended time intervals.
//!
//! Shifts and segments share this representation. An interval without an
//! end is still in progress; every computation that needs an end closes it
//! at the caller-supplied `now` instead of sampling the clock.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// A stored interval whose end precedes its start.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("interval ends at {end} before it starts at {start}")]
pub struct InvalidInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Errors from the open-to-closed transition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CloseError {
    /// The interval already has an end.
    #[error("interval was already closed at {0}")]
    AlreadyClosed(DateTime<Utc>),

    /// The requested end precedes the start.
    #[error(transparent)]
    Invalid(#[from] InvalidInterval),
}

/// A span of time with a required start and an optional end.
///
/// Intervals loaded from storage are kept exactly as stored. A reversed
/// interval is only reported when a duration is computed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Interval {
    /// Creates an in-progress interval.
    pub const fn open(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Creates a finished interval, rejecting `end < start`.
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidInterval> {
        if end < start {
            return Err(InvalidInterval { start, end });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Returns true iff the interval has no recorded end.
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Records the end of an open interval.
    ///
    /// An interval closes exactly once and is never re-opened.
    pub fn close(&mut self, end: DateTime<Utc>) -> Result<(), CloseError> {
        if let Some(existing) = self.end {
            return Err(CloseError::AlreadyClosed(existing));
        }
        if end < self.start {
            return Err(InvalidInterval {
                start: self.start,
                end,
            }
            .into());
        }
        self.end = Some(end);
        Ok(())
    }

    /// Returns the effective end: the recorded end, or `now` when open.
    ///
    /// An open interval that starts after `now` is treated as empty.
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or_else(|| now.max(self.start))
    }

    /// Elapsed time, closing an open interval at `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Result<Duration, InvalidInterval> {
        match self.end {
            Some(end) if end < self.start => Err(InvalidInterval {
                start: self.start,
                end,
            }),
            _ => Ok(self.effective_end(now) - self.start),
        }
    }

    /// Elapsed time in fractional hours.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_hours(&self, now: DateTime<Utc>) -> Result<f64, InvalidInterval> {
        Ok(self.elapsed(now)?.num_milliseconds() as f64 / MS_PER_HOUR)
    }

    /// Returns true iff the interval starts on `day` in the reference zone.
    pub fn starts_on(&self, day: NaiveDate, offset: FixedOffset) -> bool {
        local_date(self.start, offset) == day
    }

    /// Returns true iff `[start, end or now]` intersects `day` in the reference zone.
    pub fn overlaps_day(&self, day: NaiveDate, offset: FixedOffset, now: DateTime<Utc>) -> bool {
        let (day_start, day_end) = day_bounds(day, offset);
        self.start < day_end && self.effective_end(now) >= day_start
    }
}

/// Returns the calendar date of `instant` in the reference zone.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Returns `[midnight, next midnight)` of `day` in the reference zone, as UTC.
pub fn day_bounds(day: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = (day.and_time(NaiveTime::MIN) - shift).and_utc();
    (start, start + Duration::days(1))
}
