//! Aggregation engine.
//!
//! Turns snapshots of shifts (with their segments) into numeric facts:
//! elapsed hours, cost, per-worker totals, per-site activity and daily
//! summaries. Nothing here rounds; rounding belongs to the report rows.
//!
//! # Rules
//!
//! 1. Open intervals are closed at the caller's `now`, never at the wall clock
//! 2. Empty input yields empty or zero-valued output, never an error
//! 3. A reversed interval (`end < start`) aborts the computation with
//!    [`InvalidInterval`]; it is never skipped or corrected

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::interval::InvalidInterval;
use crate::model::{Location, Segment, Shift};
use crate::types::{LocationId, WorkerId};

/// Summed hours and cost for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkerTotals {
    pub total_hours: f64,
    pub total_cost: f64,
    pub shift_count: usize,
}

/// Current activity at one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteActivity {
    pub location_id: LocationId,
    /// Distinct workers with an open segment here inside an open shift.
    pub active_worker_count: usize,
    /// Hours of segments at this location that started today.
    pub hours_today: f64,
}

/// Totals for shifts that started on one day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailySummary {
    pub total_hours: f64,
    pub distinct_workers: usize,
    /// Open shifts regardless of the day they started.
    pub currently_active: usize,
    pub total_cost: f64,
}

/// Hourly rates keyed by worker. Workers without an entry cost nothing.
pub type RateTable = HashMap<WorkerId, f64>;

/// Elapsed hours of a shift, closing it at `now` if still open.
pub fn elapsed_hours(shift: &Shift, now: DateTime<Utc>) -> Result<f64, InvalidInterval> {
    shift.interval.duration_hours(now)
}

/// Cost of a shift at the given hourly rate.
///
/// Missing, negative or non-finite rates cost nothing.
pub fn cost(
    shift: &Shift,
    hourly_rate: Option<f64>,
    now: DateTime<Utc>,
) -> Result<f64, InvalidInterval> {
    let hours = elapsed_hours(shift, now)?;
    let rate = hourly_rate
        .filter(|rate| rate.is_finite() && *rate >= 0.0)
        .unwrap_or(0.0);
    Ok(hours * rate)
}

/// Start of the trailing window `[now - days, now]`.
///
/// Windows reaching past the earliest representable instant cover everything.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Shifts starting at or after `window_start`, in input order.
pub fn filter_by_window(shifts: &[Shift], window_start: DateTime<Utc>) -> Vec<&Shift> {
    shifts
        .iter()
        .filter(|shift| shift.interval.start >= window_start)
        .collect()
}

/// Sums hours, cost and shift count per worker.
///
/// Workers with no shifts in the input do not appear in the result.
pub fn group_sum_by_worker<'a, I>(
    shifts: I,
    rates: &RateTable,
    now: DateTime<Utc>,
) -> Result<BTreeMap<WorkerId, WorkerTotals>, InvalidInterval>
where
    I: IntoIterator<Item = &'a Shift>,
{
    let mut totals: BTreeMap<WorkerId, WorkerTotals> = BTreeMap::new();
    for shift in shifts {
        let rate = rates.get(&shift.worker_id).copied();
        let hours = elapsed_hours(shift, now)?;
        let shift_cost = cost(shift, rate, now)?;
        let entry = totals.entry(shift.worker_id).or_default();
        entry.total_hours += hours;
        entry.total_cost += shift_cost;
        entry.shift_count += 1;
    }
    Ok(totals)
}

/// The segment a worker is currently in, if any.
///
/// Only one segment per shift should be open. If several are, the one that
/// started last wins, with the higher segment ID breaking exact ties.
pub fn current_location_of(shift: &Shift) -> Option<&Segment> {
    let mut open = shift.segments.iter().filter(|segment| segment.interval.is_open());
    let first = open.next()?;
    let mut current = first;
    let mut extra = 0usize;
    for segment in open {
        extra += 1;
        if (segment.interval.start, segment.id) > (current.interval.start, current.id) {
            current = segment;
        }
    }
    if extra > 0 {
        tracing::warn!(
            shift_id = %shift.id,
            open_segments = extra + 1,
            chosen = %current.id,
            "shift has more than one open segment"
        );
    }
    Some(current)
}

/// Ranks active locations by current head count, then by hours today.
///
/// Every active location appears, zero-filled when idle. Locations with
/// equal keys keep ascending ID order.
pub fn rank_sites_by_activity(
    locations: &[Location],
    shifts: &[Shift],
    today: NaiveDate,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<Vec<SiteActivity>, InvalidInterval> {
    let mut active_workers: HashMap<LocationId, HashSet<WorkerId>> = HashMap::new();
    let mut hours_today: HashMap<LocationId, f64> = HashMap::new();

    for shift in shifts {
        for segment in &shift.segments {
            if segment.interval.is_open() && shift.is_open() {
                active_workers
                    .entry(segment.location_id)
                    .or_default()
                    .insert(shift.worker_id);
            }
            if segment.interval.starts_on(today, offset) {
                *hours_today.entry(segment.location_id).or_default() +=
                    segment.interval.duration_hours(now)?;
            }
        }
    }

    let mut active: Vec<&Location> = locations.iter().filter(|location| location.active).collect();
    active.sort_by_key(|location| location.id);

    let mut ranked: Vec<SiteActivity> = active
        .into_iter()
        .map(|location| SiteActivity {
            location_id: location.id,
            active_worker_count: active_workers.get(&location.id).map_or(0, HashSet::len),
            hours_today: hours_today.get(&location.id).copied().unwrap_or(0.0),
        })
        .collect();

    // Stable sort keeps ID order among equal keys.
    ranked.sort_by(|a, b| {
        b.active_worker_count
            .cmp(&a.active_worker_count)
            .then_with(|| b.hours_today.total_cmp(&a.hours_today))
    });
    Ok(ranked)
}

/// Summarizes shifts that started on `today`.
pub fn daily_summary(
    shifts: &[Shift],
    rates: &RateTable,
    today: NaiveDate,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<DailySummary, InvalidInterval> {
    let mut summary = DailySummary {
        currently_active: shifts.iter().filter(|shift| shift.is_open()).count(),
        ..DailySummary::default()
    };
    let mut workers = HashSet::new();

    for shift in shifts.iter().filter(|shift| shift.interval.starts_on(today, offset)) {
        summary.total_hours += elapsed_hours(shift, now)?;
        summary.total_cost += cost(shift, rates.get(&shift.worker_id).copied(), now)?;
        workers.insert(shift.worker_id);
    }
    summary.distinct_workers = workers.len();
    Ok(summary)
}
