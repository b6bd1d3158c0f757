//! Storage layer for workclock.
//!
//! Provides persistence for organizations, workers, locations, shifts and
//! shift segments using `rusqlite`, and implements [`ShiftStore`] so report
//! queries can read consistent snapshots.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision, always in UTC (e.g., `2025-03-10T09:00:00.000Z`). This keeps
//! lexicographic ordering identical to chronological ordering, so window
//! filters can compare strings directly.
//!
//! ## Open Intervals
//!
//! `shifts.end_at` and `shift_segments.end_at` are NULL while the worker is
//! still clocked in or still at the site. Rows are closed exactly once by
//! [`Database::switch_location`] or [`Database::clock_out`].

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use thiserror::Error;

use wk_core::{
    CloseError, Interval, Location, LocationId, OrgId, Segment, SegmentId, Shift, ShiftId,
    ShiftStore, ValidationError, Worker, WorkerId,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The referenced row does not exist in the organization.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    /// The worker already has an open shift.
    #[error("worker {0} is already clocked in")]
    AlreadyClockedIn(WorkerId),
    /// The worker has no open shift.
    #[error("worker {0} is not clocked in")]
    NotClockedIn(WorkerId),
    /// The worker exists but has been deactivated.
    #[error("worker {0} is not active")]
    InactiveWorker(WorkerId),
    /// The location exists but has been deactivated.
    #[error("location {0} is not active")]
    InactiveLocation(LocationId),
    /// A write would end an interval before it started.
    #[error("cannot close interval: {0}")]
    InvalidInterval(#[from] CloseError),
    /// A unique name or email is already taken.
    #[error("{entity} already exists: {value}")]
    Duplicate { entity: &'static str, value: String },
    /// Input rejected before reaching the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A worker to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorker {
    pub name: String,
    pub email: String,
    pub hourly_rate: f64,
}

/// Changes to a worker. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub hourly_rate: Option<f64>,
}

/// Changes to a location. `None` fields are left as they are; a blank
/// address clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// An organization row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                hourly_rate REAL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (org_id, email),
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                address TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (org_id, name),
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            -- Shifts: one row per clock-in; end_at is NULL while clocked in
            CREATE TABLE IF NOT EXISTS shifts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                worker_id INTEGER NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT,
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE,
                FOREIGN KEY (worker_id) REFERENCES workers(id) ON DELETE CASCADE
            );

            -- Segments: the part of a shift spent at one location
            CREATE TABLE IF NOT EXISTS shift_segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                shift_id INTEGER NOT NULL,
                location_id INTEGER NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT,
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE,
                FOREIGN KEY (shift_id) REFERENCES shifts(id) ON DELETE CASCADE,
                FOREIGN KEY (location_id) REFERENCES locations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_workers_org ON workers(org_id);
            CREATE INDEX IF NOT EXISTS idx_locations_org ON locations(org_id);
            CREATE INDEX IF NOT EXISTS idx_shifts_worker ON shifts(worker_id);
            CREATE INDEX IF NOT EXISTS idx_shifts_org_start ON shifts(org_id, start_at);
            CREATE INDEX IF NOT EXISTS idx_segments_shift ON shift_segments(shift_id);
            CREATE INDEX IF NOT EXISTS idx_segments_location ON shift_segments(location_id);
            ",
        )?;
        Ok(())
    }

    // ========== Organizations ==========

    /// Creates an organization with a unique name.
    pub fn create_organization(&mut self, name: &str) -> Result<OrgId, DbError> {
        let name = wk_core::types::validate_name(name, "organization name")?;
        self.conn
            .execute(
                "INSERT INTO organizations (name, created_at) VALUES (?, ?)",
                params![name, format_timestamp(Utc::now())],
            )
            .map_err(|err| unique_violation(err, "organization", &name))?;
        let id = OrgId::new(self.conn.last_insert_rowid());
        tracing::debug!(org = %id, %name, "created organization");
        Ok(id)
    }

    /// Lists organizations ordered by ID.
    pub fn list_organizations(&self) -> Result<Vec<Organization>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM organizations ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Organization {
                id: OrgId::new(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        let mut orgs = Vec::new();
        for row in rows {
            orgs.push(row?);
        }
        Ok(orgs)
    }

    // ========== Workers and Locations ==========

    /// Adds a worker to an organization. Emails are unique per organization.
    pub fn add_worker(&mut self, org: OrgId, worker: &NewWorker) -> Result<WorkerId, DbError> {
        let name = wk_core::types::validate_name(&worker.name, "worker name")?;
        let email = wk_core::types::validate_name(&worker.email, "worker email")?;
        let rate = wk_core::types::validate_rate(worker.hourly_rate)?;
        self.require_org(org)?;
        self.conn
            .execute(
                "
                INSERT INTO workers (org_id, name, email, hourly_rate, is_active, created_at)
                VALUES (?, ?, ?, ?, 1, ?)
                ",
                params![org.get(), name, email, rate, format_timestamp(Utc::now())],
            )
            .map_err(|err| unique_violation(err, "worker", &email))?;
        let id = WorkerId::new(self.conn.last_insert_rowid());
        tracing::debug!(%org, worker = %id, "added worker");
        Ok(id)
    }

    /// Adds a location to an organization. Names are unique per organization.
    pub fn add_location(
        &mut self,
        org: OrgId,
        name: &str,
        address: Option<&str>,
    ) -> Result<LocationId, DbError> {
        let name = wk_core::types::validate_name(name, "location name")?;
        let address = address.map(str::trim).filter(|a| !a.is_empty());
        self.require_org(org)?;
        self.conn
            .execute(
                "
                INSERT INTO locations (org_id, name, address, is_active, created_at)
                VALUES (?, ?, ?, 1, ?)
                ",
                params![org.get(), name, address, format_timestamp(Utc::now())],
            )
            .map_err(|err| unique_violation(err, "location", &name))?;
        let id = LocationId::new(self.conn.last_insert_rowid());
        tracing::debug!(%org, location = %id, "added location");
        Ok(id)
    }

    /// Activates or deactivates a worker.
    pub fn set_worker_active(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        active: bool,
    ) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE workers SET is_active = ? WHERE id = ? AND org_id = ?",
            params![active, worker.get(), org.get()],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: "worker",
                id: worker.get(),
            });
        }
        Ok(())
    }

    /// Activates or deactivates a location.
    pub fn set_location_active(
        &mut self,
        org: OrgId,
        location: LocationId,
        active: bool,
    ) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE locations SET is_active = ? WHERE id = ? AND org_id = ?",
            params![active, location.get(), org.get()],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: "location",
                id: location.get(),
            });
        }
        Ok(())
    }

    /// Renames a worker or changes their email or rate.
    pub fn update_worker(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        update: &WorkerUpdate,
    ) -> Result<(), DbError> {
        let name = update
            .name
            .as_deref()
            .map(|name| wk_core::types::validate_name(name, "worker name"))
            .transpose()?;
        let email = update
            .email
            .as_deref()
            .map(|email| wk_core::types::validate_name(email, "worker email"))
            .transpose()?;
        let rate = update
            .hourly_rate
            .map(wk_core::types::validate_rate)
            .transpose()?;

        let changed = self
            .conn
            .execute(
                "
                UPDATE workers
                SET name = COALESCE(?1, name),
                    email = COALESCE(?2, email),
                    hourly_rate = COALESCE(?3, hourly_rate)
                WHERE id = ?4 AND org_id = ?5
                ",
                params![name, email, rate, worker.get(), org.get()],
            )
            .map_err(|err| unique_violation(err, "worker", email.as_deref().unwrap_or_default()))?;
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: "worker",
                id: worker.get(),
            });
        }
        tracing::debug!(%org, %worker, "updated worker");
        Ok(())
    }

    /// Renames a location or changes its address.
    pub fn update_location(
        &mut self,
        org: OrgId,
        location: LocationId,
        update: &LocationUpdate,
    ) -> Result<(), DbError> {
        let name = update
            .name
            .as_deref()
            .map(|name| wk_core::types::validate_name(name, "location name"))
            .transpose()?;
        let address = update.address.as_deref().map(str::trim);

        let changed = self
            .conn
            .execute(
                "
                UPDATE locations
                SET name = COALESCE(?1, name),
                    address = CASE
                        WHEN ?2 IS NULL THEN address
                        WHEN ?2 = '' THEN NULL
                        ELSE ?2
                    END
                WHERE id = ?3 AND org_id = ?4
                ",
                params![name, address, location.get(), org.get()],
            )
            .map_err(|err| unique_violation(err, "location", name.as_deref().unwrap_or_default()))?;
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: "location",
                id: location.get(),
            });
        }
        tracing::debug!(%org, %location, "updated location");
        Ok(())
    }

    /// Lists all workers of an organization, active or not, ordered by ID.
    pub fn list_workers(&self, org: OrgId) -> Result<Vec<Worker>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, org_id, name, email, hourly_rate, is_active
            FROM workers
            WHERE org_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([org.get()], |row| {
            Ok(Worker {
                id: WorkerId::new(row.get(0)?),
                org_id: OrgId::new(row.get(1)?),
                name: row.get(2)?,
                email: row.get(3)?,
                hourly_rate: row.get(4)?,
                active: row.get(5)?,
            })
        })?;
        let mut workers = Vec::new();
        for row in rows {
            workers.push(row?);
        }
        Ok(workers)
    }

    /// Lists all locations of an organization, active or not, ordered by ID.
    pub fn list_locations(&self, org: OrgId) -> Result<Vec<Location>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, org_id, name, address, is_active
            FROM locations
            WHERE org_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([org.get()], |row| {
            Ok(Location {
                id: LocationId::new(row.get(0)?),
                org_id: OrgId::new(row.get(1)?),
                name: row.get(2)?,
                address: row.get(3)?,
                active: row.get(4)?,
            })
        })?;
        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    // ========== Clock ==========

    /// Starts a shift for a worker at a location.
    ///
    /// Creates the shift and its first segment, both starting at `at`.
    pub fn clock_in(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        location: LocationId,
        at: DateTime<Utc>,
    ) -> Result<ShiftId, DbError> {
        let tx = self.conn.transaction()?;
        require_active_worker(&tx, org, worker)?;
        require_active_location(&tx, org, location)?;
        if open_shift(&tx, org, worker)?.is_some() {
            return Err(DbError::AlreadyClockedIn(worker));
        }

        let start = format_timestamp(at);
        tx.execute(
            "INSERT INTO shifts (org_id, worker_id, start_at) VALUES (?, ?, ?)",
            params![org.get(), worker.get(), start],
        )?;
        let shift = ShiftId::new(tx.last_insert_rowid());
        tx.execute(
            "INSERT INTO shift_segments (org_id, shift_id, location_id, start_at) VALUES (?, ?, ?, ?)",
            params![org.get(), shift.get(), location.get(), start],
        )?;
        tx.commit()?;

        tracing::debug!(%org, %worker, %location, %shift, "clocked in");
        Ok(shift)
    }

    /// Moves a clocked-in worker to another location.
    ///
    /// Closes the open segment at `at` and opens a new one at `location`.
    pub fn switch_location(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        location: LocationId,
        at: DateTime<Utc>,
    ) -> Result<SegmentId, DbError> {
        let tx = self.conn.transaction()?;
        require_active_location(&tx, org, location)?;
        let (shift, _) = open_shift(&tx, org, worker)?.ok_or(DbError::NotClockedIn(worker))?;

        close_open_segments(&tx, shift, at)?;
        tx.execute(
            "INSERT INTO shift_segments (org_id, shift_id, location_id, start_at) VALUES (?, ?, ?, ?)",
            params![org.get(), shift.get(), location.get(), format_timestamp(at)],
        )?;
        let segment = SegmentId::new(tx.last_insert_rowid());
        tx.commit()?;

        tracing::debug!(%org, %worker, %location, %segment, "switched location");
        Ok(segment)
    }

    /// Ends a worker's open shift and its open segment at `at`.
    pub fn clock_out(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        at: DateTime<Utc>,
    ) -> Result<ShiftId, DbError> {
        let tx = self.conn.transaction()?;
        let (shift, mut interval) =
            open_shift(&tx, org, worker)?.ok_or(DbError::NotClockedIn(worker))?;

        interval.close(at)?;
        close_open_segments(&tx, shift, at)?;
        tx.execute(
            "UPDATE shifts SET end_at = ? WHERE id = ?",
            params![format_timestamp(at), shift.get()],
        )?;
        tx.commit()?;

        tracing::debug!(%org, %worker, %shift, "clocked out");
        Ok(shift)
    }

    // ========== Backfill ==========

    /// Inserts a shift with explicit bounds.
    ///
    /// Only foreign keys are checked; bounds are stored as given.
    pub fn insert_shift(
        &mut self,
        org: OrgId,
        worker: WorkerId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ShiftId, DbError> {
        self.conn.execute(
            "INSERT INTO shifts (org_id, worker_id, start_at, end_at) VALUES (?, ?, ?, ?)",
            params![
                org.get(),
                worker.get(),
                format_timestamp(start),
                end.map(format_timestamp)
            ],
        )?;
        Ok(ShiftId::new(self.conn.last_insert_rowid()))
    }

    /// Inserts a segment with explicit bounds.
    ///
    /// Only foreign keys are checked; bounds are stored as given.
    pub fn insert_segment(
        &mut self,
        org: OrgId,
        shift: ShiftId,
        location: LocationId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<SegmentId, DbError> {
        self.conn.execute(
            "
            INSERT INTO shift_segments (org_id, shift_id, location_id, start_at, end_at)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                org.get(),
                shift.get(),
                location.get(),
                format_timestamp(start),
                end.map(format_timestamp)
            ],
        )?;
        Ok(SegmentId::new(self.conn.last_insert_rowid()))
    }

    // ========== Snapshot reads ==========

    /// Lists shifts with their segments, optionally only those starting at or after `since`.
    ///
    /// Shifts are ordered by start then ID; segments within a shift likewise.
    /// Both tables are read inside one transaction so a concurrent clock-out
    /// cannot land between them.
    pub fn list_shifts(
        &self,
        org: OrgId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Shift>, DbError> {
        let since = since.map(format_timestamp);
        let tx = self.conn.unchecked_transaction()?;
        let mut shifts = read_shifts(&tx, org, since.as_deref())?;
        attach_segments(&tx, org, since.as_deref(), &mut shifts)?;
        tx.commit()?;

        tracing::debug!(%org, shifts = shifts.len(), "loaded shifts");
        Ok(shifts)
    }

    fn require_org(&self, org: OrgId) -> Result<(), DbError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM organizations WHERE id = ?",
                [org.get()],
                |row| row.get(0),
            )
            .optional()?;
        exists.map(|_| ()).ok_or(DbError::NotFound {
            entity: "organization",
            id: org.get(),
        })
    }
}

impl ShiftStore for Database {
    type Error = DbError;

    fn fetch_shifts(
        &self,
        org: OrgId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Shift>, DbError> {
        self.list_shifts(org, since)
    }

    fn fetch_workers(&self, org: OrgId) -> Result<Vec<Worker>, DbError> {
        self.list_workers(org)
    }

    fn fetch_locations(&self, org: OrgId) -> Result<Vec<Location>, DbError> {
        self.list_locations(org)
    }
}

/// An interval row before timestamp parsing.
struct RawInterval {
    id: i64,
    parent: i64,
    start: String,
    end: Option<String>,
}

impl RawInterval {
    fn interval(&self, table: &'static str) -> Result<Interval, DbError> {
        Ok(Interval {
            start: parse_timestamp(&self.start, table, self.id)?,
            end: self
                .end
                .as_deref()
                .map(|end| parse_timestamp(end, table, self.id))
                .transpose()?,
        })
    }
}

fn read_shifts(conn: &Connection, org: OrgId, since: Option<&str>) -> Result<Vec<Shift>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, worker_id, start_at, end_at
        FROM shifts
        WHERE org_id = ?1 AND (?2 IS NULL OR start_at >= ?2)
        ORDER BY start_at ASC, id ASC
        ",
    )?;
    let rows = stmt.query_map(params![org.get(), since], |row| {
        Ok(RawInterval {
            id: row.get(0)?,
            parent: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
        })
    })?;
    let mut shifts = Vec::new();
    for row in rows {
        let raw = row?;
        shifts.push(Shift {
            id: ShiftId::new(raw.id),
            org_id: org,
            worker_id: WorkerId::new(raw.parent),
            interval: raw.interval("shifts")?,
            segments: Vec::new(),
        });
    }
    Ok(shifts)
}

fn attach_segments(
    conn: &Connection,
    org: OrgId,
    since: Option<&str>,
    shifts: &mut [Shift],
) -> Result<(), DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT seg.id, seg.shift_id, seg.location_id, seg.start_at, seg.end_at
        FROM shift_segments seg
        JOIN shifts s ON seg.shift_id = s.id
        WHERE s.org_id = ?1 AND (?2 IS NULL OR s.start_at >= ?2)
        ORDER BY seg.start_at ASC, seg.id ASC
        ",
    )?;
    let rows = stmt.query_map(params![org.get(), since], |row| {
        let location: i64 = row.get(2)?;
        Ok((
            location,
            RawInterval {
                id: row.get(0)?,
                parent: row.get(1)?,
                start: row.get(3)?,
                end: row.get(4)?,
            },
        ))
    })?;

    let index: HashMap<ShiftId, usize> = shifts
        .iter()
        .enumerate()
        .map(|(i, shift)| (shift.id, i))
        .collect();
    for row in rows {
        let (location, raw) = row?;
        let shift_id = ShiftId::new(raw.parent);
        let Some(&i) = index.get(&shift_id) else {
            continue;
        };
        shifts[i].segments.push(Segment {
            id: SegmentId::new(raw.id),
            shift_id,
            location_id: LocationId::new(location),
            interval: raw.interval("shift_segments")?,
        });
    }
    Ok(())
}

fn require_active_worker(
    tx: &Transaction<'_>,
    org: OrgId,
    worker: WorkerId,
) -> Result<(), DbError> {
    let active: Option<bool> = tx
        .query_row(
            "SELECT is_active FROM workers WHERE id = ? AND org_id = ?",
            params![worker.get(), org.get()],
            |row| row.get(0),
        )
        .optional()?;
    match active {
        None => Err(DbError::NotFound {
            entity: "worker",
            id: worker.get(),
        }),
        Some(false) => Err(DbError::InactiveWorker(worker)),
        Some(true) => Ok(()),
    }
}

fn require_active_location(
    tx: &Transaction<'_>,
    org: OrgId,
    location: LocationId,
) -> Result<(), DbError> {
    let active: Option<bool> = tx
        .query_row(
            "SELECT is_active FROM locations WHERE id = ? AND org_id = ?",
            params![location.get(), org.get()],
            |row| row.get(0),
        )
        .optional()?;
    match active {
        None => Err(DbError::NotFound {
            entity: "location",
            id: location.get(),
        }),
        Some(false) => Err(DbError::InactiveLocation(location)),
        Some(true) => Ok(()),
    }
}

/// Returns the worker's open shift, latest first if several are open.
fn open_shift(
    tx: &Transaction<'_>,
    org: OrgId,
    worker: WorkerId,
) -> Result<Option<(ShiftId, Interval)>, DbError> {
    let row: Option<(i64, String)> = tx
        .query_row(
            "
            SELECT id, start_at FROM shifts
            WHERE worker_id = ? AND org_id = ? AND end_at IS NULL
            ORDER BY start_at DESC, id DESC
            LIMIT 1
            ",
            params![worker.get(), org.get()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(id, start)| -> Result<_, DbError> {
        Ok((
            ShiftId::new(id),
            Interval::open(parse_timestamp(&start, "shifts", id)?),
        ))
    })
    .transpose()
}

/// Closes every open segment of a shift at `at`.
fn close_open_segments(
    tx: &Transaction<'_>,
    shift: ShiftId,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let open: Vec<(i64, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, start_at FROM shift_segments WHERE shift_id = ? AND end_at IS NULL",
        )?;
        let rows = stmt.query_map([shift.get()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut open = Vec::new();
        for row in rows {
            open.push(row?);
        }
        open
    };

    let end = format_timestamp(at);
    for (id, start) in open {
        let mut interval = Interval::open(parse_timestamp(&start, "shift_segments", id)?);
        interval.close(at)?;
        tx.execute(
            "UPDATE shift_segments SET end_at = ? WHERE id = ?",
            params![end, id],
        )?;
    }
    Ok(())
}

fn unique_violation(err: rusqlite::Error, entity: &'static str, value: &str) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            DbError::Duplicate {
                entity,
                value: value.to_string(),
            }
        }
        other => DbError::Sqlite(other),
    }
}

fn parse_timestamp(
    timestamp: &str,
    table: &'static str,
    id: i64,
) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::{Duration, FixedOffset, TimeZone};
    use wk_core::{QueryContext, ReportError, Reports};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(Result::unwrap)
            .filter(|name| name.starts_with("idx_"))
            .collect()
    }

    /// One org with worker "Ana" ($25/h) and two sites.
    struct Fixture {
        db: Database,
        org: OrgId,
        ana: WorkerId,
        depot: LocationId,
        yard: LocationId,
    }

    fn fixture() -> Fixture {
        let mut db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let ana = db
            .add_worker(
                org,
                &NewWorker {
                    name: "Ana".to_string(),
                    email: "ana@example.com".to_string(),
                    hourly_rate: 25.0,
                },
            )
            .unwrap();
        let depot = db.add_location(org, "Depot", Some("1 Main St")).unwrap();
        let yard = db.add_location(org, "Yard", None).unwrap();
        Fixture {
            db,
            org,
            ana,
            depot,
            yard,
        }
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "shifts"),
            vec!["id", "org_id", "worker_id", "start_at", "end_at"]
        );
        assert_eq!(
            table_columns(&db.conn, "shift_segments"),
            vec!["id", "org_id", "shift_id", "location_id", "start_at", "end_at"]
        );
        assert_eq!(
            table_columns(&db.conn, "workers"),
            vec!["id", "org_id", "name", "email", "hourly_rate", "is_active", "created_at"]
        );

        let shift_indexes = index_names(&db.conn, "shifts");
        let expected: HashSet<String> = ["idx_shifts_worker", "idx_shifts_org_start"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(shift_indexes, expected);
    }

    #[test]
    fn init_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wk.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.create_organization("Acme").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_organizations().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut f = fixture();
        let err = f.db.create_organization("Acme").unwrap_err();
        assert!(matches!(err, DbError::Duplicate { entity: "organization", .. }));

        let err = f.db.add_location(f.org, "Depot", None).unwrap_err();
        assert!(matches!(err, DbError::Duplicate { entity: "location", .. }));
    }

    #[test]
    fn add_worker_validates_input() {
        let mut f = fixture();
        let negative = NewWorker {
            name: "Ben".to_string(),
            email: "ben@example.com".to_string(),
            hourly_rate: -5.0,
        };
        assert!(matches!(
            f.db.add_worker(f.org, &negative).unwrap_err(),
            DbError::Validation(_)
        ));

        let missing_org = NewWorker {
            hourly_rate: 5.0,
            ..negative
        };
        assert!(matches!(
            f.db.add_worker(OrgId::new(99), &missing_org).unwrap_err(),
            DbError::NotFound { entity: "organization", .. }
        ));
    }

    #[test]
    fn clock_in_creates_shift_and_first_segment() {
        let mut f = fixture();
        let shift = f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();

        let shifts = f.db.list_shifts(f.org, None).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].id, shift);
        assert!(shifts[0].is_open());
        assert_eq!(shifts[0].segments.len(), 1);
        assert_eq!(shifts[0].segments[0].location_id, f.depot);
        assert_eq!(shifts[0].segments[0].interval.start, at(9, 0));
    }

    #[test]
    fn clock_in_twice_is_rejected() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        let err = f.db.clock_in(f.org, f.ana, f.yard, at(9, 5)).unwrap_err();
        assert!(matches!(err, DbError::AlreadyClockedIn(w) if w == f.ana));
    }

    #[test]
    fn clock_in_rejects_inactive_or_foreign_location() {
        let mut f = fixture();
        f.db.set_location_active(f.org, f.yard, false).unwrap();
        assert!(matches!(
            f.db.clock_in(f.org, f.ana, f.yard, at(9, 0)).unwrap_err(),
            DbError::InactiveLocation(_)
        ));

        let other = f.db.create_organization("Other").unwrap();
        let foreign = f.db.add_location(other, "Elsewhere", None).unwrap();
        assert!(matches!(
            f.db.clock_in(f.org, f.ana, foreign, at(9, 0)).unwrap_err(),
            DbError::NotFound { entity: "location", .. }
        ));
    }

    #[test]
    fn clock_in_rejects_inactive_worker_until_reactivated() {
        let mut f = fixture();
        f.db.set_worker_active(f.org, f.ana, false).unwrap();
        assert!(matches!(
            f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap_err(),
            DbError::InactiveWorker(w) if w == f.ana
        ));
        assert!(f.db.list_shifts(f.org, None).unwrap().is_empty());

        f.db.set_worker_active(f.org, f.ana, true).unwrap();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
    }

    #[test]
    fn update_worker_changes_only_given_fields() {
        let mut f = fixture();
        f.db.update_worker(
            f.org,
            f.ana,
            &WorkerUpdate {
                hourly_rate: Some(30.0),
                ..WorkerUpdate::default()
            },
        )
        .unwrap();
        f.db.update_worker(
            f.org,
            f.ana,
            &WorkerUpdate {
                name: Some("  Ana Lima ".to_string()),
                ..WorkerUpdate::default()
            },
        )
        .unwrap();

        let workers = f.db.list_workers(f.org).unwrap();
        assert_eq!(workers[0].name, "Ana Lima");
        assert_eq!(workers[0].email, "ana@example.com");
        assert_eq!(workers[0].hourly_rate, Some(30.0));
    }

    #[test]
    fn update_worker_rejects_bad_input() {
        let mut f = fixture();
        let ben = f
            .db
            .add_worker(
                f.org,
                &NewWorker {
                    name: "Ben".to_string(),
                    email: "ben@example.com".to_string(),
                    hourly_rate: 20.0,
                },
            )
            .unwrap();

        let taken = WorkerUpdate {
            email: Some("ana@example.com".to_string()),
            ..WorkerUpdate::default()
        };
        assert!(matches!(
            f.db.update_worker(f.org, ben, &taken).unwrap_err(),
            DbError::Duplicate { entity: "worker", .. }
        ));

        let negative = WorkerUpdate {
            hourly_rate: Some(-1.0),
            ..WorkerUpdate::default()
        };
        assert!(matches!(
            f.db.update_worker(f.org, ben, &negative).unwrap_err(),
            DbError::Validation(_)
        ));

        let other = f.db.create_organization("Other").unwrap();
        assert!(matches!(
            f.db.update_worker(other, ben, &WorkerUpdate::default()).unwrap_err(),
            DbError::NotFound { entity: "worker", .. }
        ));
    }

    #[test]
    fn update_location_renames_and_clears_address() {
        let mut f = fixture();
        f.db.update_location(
            f.org,
            f.depot,
            &LocationUpdate {
                name: Some("North Depot".to_string()),
                address: None,
            },
        )
        .unwrap();
        let locations = f.db.list_locations(f.org).unwrap();
        assert_eq!(locations[0].name, "North Depot");
        assert_eq!(locations[0].address.as_deref(), Some("1 Main St"));

        f.db.update_location(
            f.org,
            f.depot,
            &LocationUpdate {
                name: None,
                address: Some("  ".to_string()),
            },
        )
        .unwrap();
        assert_eq!(f.db.list_locations(f.org).unwrap()[0].address, None);

        let clash = LocationUpdate {
            name: Some("Yard".to_string()),
            address: None,
        };
        assert!(matches!(
            f.db.update_location(f.org, f.depot, &clash).unwrap_err(),
            DbError::Duplicate { entity: "location", .. }
        ));
    }

    #[test]
    fn switch_location_closes_previous_segment() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        f.db.switch_location(f.org, f.ana, f.yard, at(11, 0)).unwrap();

        let shifts = f.db.list_shifts(f.org, None).unwrap();
        let segments = &shifts[0].segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].interval.end, Some(at(11, 0)));
        assert_eq!(segments[1].location_id, f.yard);
        assert!(segments[1].interval.is_open());
    }

    #[test]
    fn switch_location_requires_open_shift() {
        let mut f = fixture();
        let err = f.db.switch_location(f.org, f.ana, f.yard, at(11, 0)).unwrap_err();
        assert!(matches!(err, DbError::NotClockedIn(_)));
    }

    #[test]
    fn clock_out_closes_shift_and_segment() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        f.db.clock_out(f.org, f.ana, at(13, 30)).unwrap();

        let shifts = f.db.list_shifts(f.org, None).unwrap();
        assert_eq!(shifts[0].interval.end, Some(at(13, 30)));
        assert_eq!(shifts[0].segments[0].interval.end, Some(at(13, 30)));

        let err = f.db.clock_out(f.org, f.ana, at(14, 0)).unwrap_err();
        assert!(matches!(err, DbError::NotClockedIn(_)));
    }

    #[test]
    fn clock_out_before_clock_in_is_rejected() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        let err = f.db.clock_out(f.org, f.ana, at(8, 0)).unwrap_err();
        assert!(matches!(err, DbError::InvalidInterval(_)));
        assert!(f.db.list_shifts(f.org, None).unwrap()[0].is_open());
    }

    #[test]
    fn list_shifts_filters_by_since() {
        let mut f = fixture();
        let old = at(9, 0) - Duration::days(10);
        let s1 = f.db.insert_shift(f.org, f.ana, old, Some(old + Duration::hours(2))).unwrap();
        f.db.insert_segment(f.org, s1, f.depot, old, Some(old + Duration::hours(2))).unwrap();
        let s2 = f.db.insert_shift(f.org, f.ana, at(9, 0), None).unwrap();
        f.db.insert_segment(f.org, s2, f.yard, at(9, 0), None).unwrap();

        let recent = f.db.list_shifts(f.org, Some(at(0, 0))).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, s2);
        assert_eq!(recent[0].segments.len(), 1);

        assert_eq!(f.db.list_shifts(f.org, None).unwrap().len(), 2);
    }

    #[test]
    fn list_shifts_leaves_no_transaction_open() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        f.db.list_shifts(f.org, None).unwrap();
        assert!(f.db.conn.is_autocommit());

        f.db.conn
            .execute(
                "INSERT INTO shifts (org_id, worker_id, start_at) VALUES (?, ?, 'yesterday')",
                params![f.org.get(), f.ana.get()],
            )
            .unwrap();
        assert!(f.db.list_shifts(f.org, None).is_err());
        assert!(f.db.conn.is_autocommit());
    }

    #[test]
    fn unbounded_window_reads_every_shift() {
        let mut f = fixture();
        let ancient = Utc.with_ymd_and_hms(1900, 1, 1, 8, 0, 0).unwrap();
        f.db.insert_shift(f.org, f.ana, ancient, Some(ancient + Duration::hours(1))).unwrap();

        let ctx = QueryContext::new(f.org, at(18, 0), FixedOffset::east_opt(0).unwrap());
        let rows = Reports::new(&f.db, ctx).payroll(u32::MAX).unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].total_hours - 1.0).abs() < 1e-9);
    }

    #[test]
    fn list_shifts_is_scoped_to_org() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        let other = f.db.create_organization("Other").unwrap();
        assert!(f.db.list_shifts(other, None).unwrap().is_empty());
    }

    #[test]
    fn reports_read_through_store() {
        let mut f = fixture();
        f.db.clock_in(f.org, f.ana, f.depot, at(9, 0)).unwrap();
        f.db.clock_out(f.org, f.ana, at(13, 30)).unwrap();

        let ctx = QueryContext::new(f.org, at(18, 0), FixedOffset::east_opt(0).unwrap());
        let rows = Reports::new(&f.db, ctx).payroll(7).unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].total_hours - 4.5).abs() < 1e-9);
        assert!((rows[0].total_cost - 112.5).abs() < 1e-9);
    }

    #[test]
    fn reversed_stored_shift_surfaces_invalid_interval() {
        let mut f = fixture();
        f.db.insert_shift(f.org, f.ana, at(10, 0), Some(at(9, 0))).unwrap();

        let ctx = QueryContext::new(f.org, at(18, 0), FixedOffset::east_opt(0).unwrap());
        let err = Reports::new(&f.db, ctx).payroll(7).unwrap_err();
        assert!(matches!(err, ReportError::InvalidInterval(_)));
    }

    #[test]
    fn corrupt_timestamp_is_reported() {
        let f = fixture();
        f.db.conn
            .execute(
                "INSERT INTO shifts (org_id, worker_id, start_at) VALUES (?, ?, 'yesterday')",
                params![f.org.get(), f.ana.get()],
            )
            .unwrap();
        let err = f.db.list_shifts(f.org, None).unwrap_err();
        assert!(matches!(err, DbError::TimestampParse { table: "shifts", .. }));
    }
}
