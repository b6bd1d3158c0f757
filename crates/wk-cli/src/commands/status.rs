//! Status command for showing organization head counts.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use wk_core::{Reports, ShiftStore};

use super::report::write_json;

pub fn run<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    database_path: &Path,
    json: bool,
) -> Result<()> {
    let overview = reports.overview()?;
    if json {
        return write_json(writer, &overview);
    }

    writeln!(writer, "Workclock status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Organization: {}", reports.context().org)?;
    writeln!(writer)?;
    writeln!(writer, "Active workers:  {}", overview.active_workers)?;
    writeln!(writer, "Active sites:    {}", overview.active_sites)?;
    writeln!(writer, "Clocked in now:  {}", overview.currently_clocked_in)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, TimeZone, Utc};
    use insta::assert_snapshot;
    use wk_core::QueryContext;
    use wk_db::{Database, NewWorker};

    #[test]
    fn status_counts_active_rows_and_open_shifts() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("wk.db");
        let mut db = Database::open(&db_path).unwrap();
        let org = db.create_organization("Acme").unwrap();
        for (name, email) in [("Ana", "ana@example.com"), ("Ben", "ben@example.com")] {
            db.add_worker(
                org,
                &NewWorker {
                    name: name.to_string(),
                    email: email.to_string(),
                    hourly_rate: 20.0,
                },
            )
            .unwrap();
        }
        let depot = db.add_location(org, "Depot", None).unwrap();
        let yard = db.add_location(org, "Yard", None).unwrap();
        db.set_location_active(org, yard, false).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        db.clock_in(org, wk_core::WorkerId::new(1), depot, now).unwrap();

        let ctx = QueryContext::new(org, now, FixedOffset::east_opt(0).unwrap());
        let reports = Reports::new(&db, ctx);
        let mut output = Vec::new();
        run(&mut output, &reports, Path::new("/data/wk.db"), false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Workclock status
        Database: /data/wk.db
        Organization: 1

        Active workers:  2
        Active sites:    1
        Clocked in now:  1
        ");
    }
}
