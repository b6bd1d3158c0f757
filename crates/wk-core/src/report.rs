//! Report queries over stored shifts.
//!
//! [`Reports`] binds the aggregation engine to one [`ShiftStore`] snapshot
//! and one [`QueryContext`]. Every row it returns is rounded to two
//! decimals here and nowhere earlier.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregate::{self, RateTable};
use crate::error::{Entity, ReportError};
use crate::interval::local_date;
use crate::model::{Location, Shift, Worker};
use crate::types::{LocationId, OrgId, SegmentId, ShiftId, WorkerId};

/// Source of shift, worker and location snapshots for one organization.
///
/// Implementations return every record of the organization, including
/// inactive workers and locations. `since` lets the store skip shifts that
/// started before a window; returning extra shifts is harmless.
pub trait ShiftStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_shifts(
        &self,
        org: OrgId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Shift>, Self::Error>;

    fn fetch_workers(&self, org: OrgId) -> Result<Vec<Worker>, Self::Error>;

    fn fetch_locations(&self, org: OrgId) -> Result<Vec<Location>, Self::Error>;
}

/// The fixed inputs of one report invocation.
///
/// `now` is sampled once by the caller so all numbers in a response agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryContext {
    pub org: OrgId,
    pub now: DateTime<Utc>,
    /// Reference zone for calendar-day questions.
    pub offset: FixedOffset,
}

impl QueryContext {
    pub const fn new(org: OrgId, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { org, now, offset }
    }

    /// The current calendar day in the reference zone.
    pub fn today(&self) -> NaiveDate {
        local_date(self.now, self.offset)
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A worker who is clocked in right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveWorkerRow {
    pub worker_id: WorkerId,
    pub name: String,
    pub email: String,
    pub location_id: LocationId,
    pub location_name: String,
    pub location_address: Option<String>,
    pub clocked_in_at: DateTime<Utc>,
    /// Hours since clock-in.
    pub hours_today: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollRow {
    pub worker_id: WorkerId,
    pub name: String,
    pub email: String,
    pub hourly_rate: f64,
    pub total_hours: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerDetail {
    pub worker_id: WorkerId,
    pub name: String,
    pub email: String,
    pub total_hours: f64,
    pub total_cost: f64,
    pub shift_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteBusynessRow {
    pub location_id: LocationId,
    pub name: String,
    pub address: Option<String>,
    pub active_worker_count: usize,
    pub hours_today: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub total_hours: f64,
    pub distinct_workers: usize,
    pub currently_active: usize,
    pub total_cost: f64,
}

/// Head counts for the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub active_workers: usize,
    pub active_sites: usize,
    pub currently_clocked_in: usize,
}

/// Estimated take-home pay over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Earnings {
    pub worker_id: WorkerId,
    pub name: String,
    pub period_hours: f64,
    pub hourly_rate: f64,
    pub gross_pay: f64,
    pub tax_amount: f64,
    pub net_pay: f64,
}

/// One segment on a worker's timeline for a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub segment_id: SegmentId,
    pub shift_id: ShiftId,
    pub location_id: LocationId,
    pub location_name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub hours: f64,
}

/// One segment in a date-range report, priced at its worker's rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReportRow {
    pub segment_id: SegmentId,
    pub shift_id: ShiftId,
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub hourly_rate: f64,
    pub location_id: LocationId,
    pub location_name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub hours: f64,
    pub cost: f64,
}

/// Segments started within `[from, to]` with their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub segments: Vec<SegmentReportRow>,
    pub total_hours: f64,
    pub total_cost: f64,
}

/// One of a worker's shifts, labelled with the site it began at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftSummary {
    pub shift_id: ShiftId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub first_location: Option<String>,
    pub hours: f64,
}

/// Named read-only report queries.
pub struct Reports<'a, S> {
    store: &'a S,
    ctx: QueryContext,
}

impl<'a, S: ShiftStore> Reports<'a, S> {
    pub const fn new(store: &'a S, ctx: QueryContext) -> Self {
        Self { store, ctx }
    }

    pub const fn context(&self) -> &QueryContext {
        &self.ctx
    }

    /// Workers with an open shift and the site they are at.
    ///
    /// An open shift without an open segment has no current site and is
    /// left out. Rows are ordered by most recent clock-in first.
    pub fn active_workers(&self) -> Result<Vec<ActiveWorkerRow>, ReportError> {
        let workers = self.workers()?;
        let locations = self.locations()?;
        let mut open: Vec<Shift> = self
            .shifts(None)?
            .into_iter()
            .filter(Shift::is_open)
            .collect();
        open.sort_by(|a, b| b.interval.start.cmp(&a.interval.start).then(a.id.cmp(&b.id)));

        let mut rows = Vec::new();
        for shift in &open {
            let Some(worker) = workers.get(&shift.worker_id) else {
                continue;
            };
            let Some(segment) = aggregate::current_location_of(shift) else {
                tracing::warn!(
                    shift_id = %shift.id,
                    worker_id = %shift.worker_id,
                    "open shift has no open segment"
                );
                continue;
            };
            let Some(location) = locations.get(&segment.location_id) else {
                continue;
            };
            rows.push(ActiveWorkerRow {
                worker_id: worker.id,
                name: worker.name.clone(),
                email: worker.email.clone(),
                location_id: location.id,
                location_name: location.name.clone(),
                location_address: location.address.clone(),
                clocked_in_at: shift.interval.start,
                hours_today: round2(aggregate::elapsed_hours(shift, self.ctx.now)?),
            });
        }
        tracing::debug!(org = %self.ctx.org, rows = rows.len(), "active workers");
        Ok(rows)
    }

    /// Hours and cost per worker over the trailing `window_days`.
    ///
    /// Workers without shifts in the window are omitted. Rows are ordered
    /// by total hours, highest first.
    pub fn payroll(&self, window_days: u32) -> Result<Vec<PayrollRow>, ReportError> {
        let workers = self.workers()?;
        let since = aggregate::window_start(self.ctx.now, window_days);
        let shifts = self.shifts(Some(since))?;
        let in_window = aggregate::filter_by_window(&shifts, since)
            .into_iter()
            .filter(|shift| workers.contains_key(&shift.worker_id));
        let totals =
            aggregate::group_sum_by_worker(in_window, &rate_table(&workers), self.ctx.now)?;

        let mut ranked: Vec<_> = totals
            .into_iter()
            .filter_map(|(id, totals)| workers.get(&id).map(|worker| (worker, totals)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_hours.total_cmp(&a.1.total_hours));

        let rows: Vec<PayrollRow> = ranked
            .into_iter()
            .map(|(worker, totals)| PayrollRow {
                worker_id: worker.id,
                name: worker.name.clone(),
                email: worker.email.clone(),
                hourly_rate: round2(worker.effective_rate()),
                total_hours: round2(totals.total_hours),
                total_cost: round2(totals.total_cost),
            })
            .collect();
        tracing::debug!(org = %self.ctx.org, window_days, rows = rows.len(), "payroll");
        Ok(rows)
    }

    /// Totals for one worker over the trailing `window_days`.
    ///
    /// An existing worker with no shifts gets a zero-valued record.
    pub fn worker_detail(
        &self,
        worker_id: WorkerId,
        window_days: u32,
    ) -> Result<WorkerDetail, ReportError> {
        let worker = self.worker(worker_id)?;
        let since = aggregate::window_start(self.ctx.now, window_days);
        let shifts = self.shifts(Some(since))?;
        let mine = aggregate::filter_by_window(&shifts, since)
            .into_iter()
            .filter(|shift| shift.worker_id == worker_id);
        let rates = RateTable::from([(worker.id, worker.effective_rate())]);
        let totals = aggregate::group_sum_by_worker(mine, &rates, self.ctx.now)?
            .remove(&worker_id)
            .unwrap_or_default();

        Ok(WorkerDetail {
            worker_id: worker.id,
            name: worker.name,
            email: worker.email,
            total_hours: round2(totals.total_hours),
            total_cost: round2(totals.total_cost),
            shift_count: totals.shift_count,
        })
    }

    /// Active sites ranked by head count, then hours today.
    pub fn site_busyness(&self) -> Result<Vec<SiteBusynessRow>, ReportError> {
        let locations: Vec<Location> = self.locations()?.into_values().collect();
        let shifts = self.shifts(None)?;
        let ranked = aggregate::rank_sites_by_activity(
            &locations,
            &shifts,
            self.ctx.today(),
            self.ctx.offset,
            self.ctx.now,
        )?;

        let by_id: HashMap<LocationId, &Location> =
            locations.iter().map(|location| (location.id, location)).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|activity| {
                let location = by_id.get(&activity.location_id)?;
                Some(SiteBusynessRow {
                    location_id: location.id,
                    name: location.name.clone(),
                    address: location.address.clone(),
                    active_worker_count: activity.active_worker_count,
                    hours_today: round2(activity.hours_today),
                })
            })
            .collect())
    }

    /// Totals for shifts that started today.
    pub fn today_summary(&self) -> Result<TodaySummary, ReportError> {
        let workers = self.workers()?;
        let shifts = self.shifts(None)?;
        let today = self.ctx.today();
        let summary = aggregate::daily_summary(
            &shifts,
            &rate_table(&workers),
            today,
            self.ctx.offset,
            self.ctx.now,
        )?;

        Ok(TodaySummary {
            date: today,
            total_hours: round2(summary.total_hours),
            distinct_workers: summary.distinct_workers,
            currently_active: summary.currently_active,
            total_cost: round2(summary.total_cost),
        })
    }

    /// Counts of active workers, active sites and open shifts.
    pub fn overview(&self) -> Result<Overview, ReportError> {
        let workers = self.workers()?;
        let locations = self.locations()?;
        let open = self.shifts(None)?.iter().filter(|shift| shift.is_open()).count();
        Ok(Overview {
            active_workers: workers.values().filter(|worker| worker.active).count(),
            active_sites: locations.values().filter(|location| location.active).count(),
            currently_clocked_in: open,
        })
    }

    /// Gross pay over the window with an estimated flat tax withheld.
    pub fn earnings(
        &self,
        worker_id: WorkerId,
        window_days: u32,
        tax_rate: f64,
    ) -> Result<Earnings, ReportError> {
        let worker = self.worker(worker_id)?;
        let since = aggregate::window_start(self.ctx.now, window_days);
        let shifts = self.shifts(Some(since))?;
        let rate = worker.effective_rate();

        let mut hours = 0.0;
        let mut gross = 0.0;
        for shift in aggregate::filter_by_window(&shifts, since) {
            if shift.worker_id != worker_id {
                continue;
            }
            hours += aggregate::elapsed_hours(shift, self.ctx.now)?;
            gross += aggregate::cost(shift, Some(rate), self.ctx.now)?;
        }
        let tax = gross * tax_rate;

        Ok(Earnings {
            worker_id: worker.id,
            name: worker.name,
            period_hours: round2(hours),
            hourly_rate: round2(rate),
            gross_pay: round2(gross),
            tax_amount: round2(tax),
            net_pay: round2(gross - tax),
        })
    }

    /// Segments of one worker that overlap `day`, ordered by start.
    pub fn worker_timeline(
        &self,
        worker_id: WorkerId,
        day: NaiveDate,
    ) -> Result<Vec<TimelineEntry>, ReportError> {
        self.worker(worker_id)?;
        let locations = self.locations()?;
        let shifts = self.shifts(None)?;

        let mut entries = Vec::new();
        for shift in shifts.iter().filter(|shift| shift.worker_id == worker_id) {
            for segment in &shift.segments {
                if !segment.interval.overlaps_day(day, self.ctx.offset, self.ctx.now) {
                    continue;
                }
                entries.push(TimelineEntry {
                    segment_id: segment.id,
                    shift_id: shift.id,
                    location_id: segment.location_id,
                    location_name: location_name(&locations, segment.location_id),
                    start: segment.interval.start,
                    end: segment.interval.end,
                    hours: round2(segment.interval.duration_hours(self.ctx.now)?),
                });
            }
        }
        entries.sort_by(|a, b| a.start.cmp(&b.start).then(a.segment_id.cmp(&b.segment_id)));
        Ok(entries)
    }

    /// Every segment whose start falls on a day in `[from, to]`, ordered by start.
    ///
    /// Segments of workers outside the organization are left out.
    pub fn segment_report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<SegmentReport, ReportError> {
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        let workers = self.workers()?;
        let locations = self.locations()?;
        let shifts = self.shifts(None)?;

        let mut total_hours = 0.0;
        let mut total_cost = 0.0;
        let mut segments = Vec::new();
        for shift in &shifts {
            let Some(worker) = workers.get(&shift.worker_id) else {
                continue;
            };
            let rate = worker.effective_rate();
            for segment in &shift.segments {
                let day = local_date(segment.interval.start, self.ctx.offset);
                if day < from || day > to {
                    continue;
                }
                let hours = segment.interval.duration_hours(self.ctx.now)?;
                total_hours += hours;
                total_cost += hours * rate;
                segments.push(SegmentReportRow {
                    segment_id: segment.id,
                    shift_id: shift.id,
                    worker_id: worker.id,
                    worker_name: worker.name.clone(),
                    hourly_rate: round2(rate),
                    location_id: segment.location_id,
                    location_name: location_name(&locations, segment.location_id),
                    start: segment.interval.start,
                    end: segment.interval.end,
                    hours: round2(hours),
                    cost: round2(hours * rate),
                });
            }
        }
        segments.sort_by(|a, b| a.start.cmp(&b.start).then(a.segment_id.cmp(&b.segment_id)));
        tracing::debug!(org = %self.ctx.org, %from, %to, rows = segments.len(), "segment report");

        Ok(SegmentReport {
            from,
            to,
            segments,
            total_hours: round2(total_hours),
            total_cost: round2(total_cost),
        })
    }

    /// A worker's shifts started on a day in `[from, to]`, most recent first.
    pub fn worker_shifts(
        &self,
        worker_id: WorkerId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftSummary>, ReportError> {
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        self.worker(worker_id)?;
        let locations = self.locations()?;
        let shifts = self.shifts(None)?;

        let mut rows = Vec::new();
        for shift in shifts.iter().filter(|shift| shift.worker_id == worker_id) {
            let day = local_date(shift.interval.start, self.ctx.offset);
            if day < from || day > to {
                continue;
            }
            let first = shift
                .segments
                .iter()
                .min_by_key(|segment| (segment.interval.start, segment.id));
            rows.push(ShiftSummary {
                shift_id: shift.id,
                start: shift.interval.start,
                end: shift.interval.end,
                first_location: first.map(|segment| location_name(&locations, segment.location_id)),
                hours: round2(aggregate::elapsed_hours(shift, self.ctx.now)?),
            });
        }
        rows.sort_by(|a, b| b.start.cmp(&a.start).then(b.shift_id.cmp(&a.shift_id)));
        Ok(rows)
    }

    fn shifts(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Shift>, ReportError> {
        let shifts = self
            .store
            .fetch_shifts(self.ctx.org, since)
            .map_err(ReportError::storage)?;
        Ok(shifts
            .into_iter()
            .filter(|shift| shift.org_id == self.ctx.org)
            .collect())
    }

    fn workers(&self) -> Result<HashMap<WorkerId, Worker>, ReportError> {
        let workers = self.store.fetch_workers(self.ctx.org).map_err(ReportError::storage)?;
        Ok(workers
            .into_iter()
            .filter(|worker| worker.org_id == self.ctx.org)
            .map(|worker| (worker.id, worker))
            .collect())
    }

    fn locations(&self) -> Result<HashMap<LocationId, Location>, ReportError> {
        let locations = self.store.fetch_locations(self.ctx.org).map_err(ReportError::storage)?;
        Ok(locations
            .into_iter()
            .filter(|location| location.org_id == self.ctx.org)
            .map(|location| (location.id, location))
            .collect())
    }

    fn worker(&self, worker_id: WorkerId) -> Result<Worker, ReportError> {
        self.workers()?
            .remove(&worker_id)
            .ok_or(ReportError::NotFound {
                entity: Entity::Worker,
                id: worker_id.get(),
            })
    }
}

/// Name of a location, or `#<id>` when it is not in the snapshot.
fn location_name(locations: &HashMap<LocationId, Location>, id: LocationId) -> String {
    locations
        .get(&id)
        .map_or_else(|| format!("#{id}"), |location| location.name.clone())
}

fn rate_table(workers: &HashMap<WorkerId, Worker>) -> RateTable {
    workers
        .values()
        .map(|worker| (worker.id, worker.effective_rate()))
        .collect()
}
