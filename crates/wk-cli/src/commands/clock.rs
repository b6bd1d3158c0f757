//! Clock-in, site switch and clock-out commands.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

use wk_core::{LocationId, OrgId, WorkerId};
use wk_db::Database;

use super::util::{format_local, parse_datetime};

/// Where and when a clock event happens.
#[derive(Debug, Clone, Copy)]
pub struct ClockContext {
    pub org: OrgId,
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl ClockContext {
    fn resolve(&self, at: Option<&str>) -> Result<DateTime<Utc>> {
        at.map_or(Ok(self.now), |at| parse_datetime(at, self.now))
    }
}

pub fn clock_in<W: Write>(
    writer: &mut W,
    db: &mut Database,
    ctx: &ClockContext,
    worker: WorkerId,
    site: LocationId,
    at: Option<&str>,
) -> Result<()> {
    let at = ctx.resolve(at)?;
    let shift = db.clock_in(ctx.org, worker, site, at)?;
    writeln!(
        writer,
        "Worker {worker} clocked in at site {site} ({}), shift {shift}",
        format_local(at, ctx.offset)
    )?;
    Ok(())
}

pub fn switch<W: Write>(
    writer: &mut W,
    db: &mut Database,
    ctx: &ClockContext,
    worker: WorkerId,
    site: LocationId,
    at: Option<&str>,
) -> Result<()> {
    let at = ctx.resolve(at)?;
    db.switch_location(ctx.org, worker, site, at)?;
    writeln!(
        writer,
        "Worker {worker} moved to site {site} ({})",
        format_local(at, ctx.offset)
    )?;
    Ok(())
}

pub fn clock_out<W: Write>(
    writer: &mut W,
    db: &mut Database,
    ctx: &ClockContext,
    worker: WorkerId,
    at: Option<&str>,
) -> Result<()> {
    let at = ctx.resolve(at)?;
    let shift = db.clock_out(ctx.org, worker, at)?;
    writeln!(
        writer,
        "Worker {worker} clocked out ({}), shift {shift}",
        format_local(at, ctx.offset)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;
    use wk_db::NewWorker;

    fn setup() -> (Database, ClockContext, WorkerId, LocationId, LocationId) {
        let mut db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let worker = db
            .add_worker(
                org,
                &NewWorker {
                    name: "Ana".to_string(),
                    email: "ana@example.com".to_string(),
                    hourly_rate: 20.0,
                },
            )
            .unwrap();
        let depot = db.add_location(org, "Depot", None).unwrap();
        let yard = db.add_location(org, "Yard", None).unwrap();
        let ctx = ClockContext {
            org,
            now: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(3600).unwrap(),
        };
        (db, ctx, worker, depot, yard)
    }

    #[test]
    fn full_shift_flow() {
        let (mut db, ctx, worker, depot, yard) = setup();
        let mut buf = Vec::new();
        clock_in(&mut buf, &mut db, &ctx, worker, depot, Some("3 hours ago")).unwrap();
        switch(&mut buf, &mut db, &ctx, worker, yard, Some("1 hour ago")).unwrap();
        clock_out(&mut buf, &mut db, &ctx, worker, None).unwrap();

        assert_snapshot!(String::from_utf8(buf).unwrap(), @r"
        Worker 1 clocked in at site 1 (2025-03-10 10:00), shift 1
        Worker 1 moved to site 2 (2025-03-10 12:00)
        Worker 1 clocked out (2025-03-10 13:00), shift 1
        ");

        let shifts = db.list_shifts(ctx.org, None).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].segments.len(), 2);
        assert!(!shifts[0].is_open());
    }

    #[test]
    fn double_clock_in_fails() {
        let (mut db, ctx, worker, depot, _) = setup();
        let mut buf = Vec::new();
        clock_in(&mut buf, &mut db, &ctx, worker, depot, None).unwrap();
        let err = clock_in(&mut buf, &mut db, &ctx, worker, depot, None).unwrap_err();
        assert_eq!(err.to_string(), "worker 1 is already clocked in");
    }

    #[test]
    fn clock_out_without_shift_fails() {
        let (mut db, ctx, worker, _, _) = setup();
        let mut buf = Vec::new();
        let err = clock_out(&mut buf, &mut db, &ctx, worker, None).unwrap_err();
        assert_eq!(err.to_string(), "worker 1 is not clocked in");
    }

    #[test]
    fn clock_out_before_start_fails() {
        let (mut db, ctx, worker, depot, _) = setup();
        let mut buf = Vec::new();
        clock_in(&mut buf, &mut db, &ctx, worker, depot, None).unwrap();
        assert!(clock_out(&mut buf, &mut db, &ctx, worker, Some("1 hour ago")).is_err());
        assert!(db.list_shifts(ctx.org, None).unwrap()[0].is_open());
    }

    #[test]
    fn bad_time_is_rejected_before_writing() {
        let (mut db, ctx, worker, depot, _) = setup();
        let mut buf = Vec::new();
        assert!(clock_in(&mut buf, &mut db, &ctx, worker, depot, Some("soonish")).is_err());
        assert!(db.list_shifts(ctx.org, None).unwrap().is_empty());
    }
}
