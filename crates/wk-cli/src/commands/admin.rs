//! Worker and job site administration commands.

use std::io::Write;

use anyhow::{Result, bail};

use wk_core::{LocationId, OrgId, WorkerId};
use wk_db::{Database, LocationUpdate, NewWorker, WorkerUpdate};

use super::report::write_json;
use crate::cli::{SiteAction, WorkerAction};

pub fn run_worker<W: Write>(
    writer: &mut W,
    db: &mut Database,
    org: OrgId,
    action: &WorkerAction,
) -> Result<()> {
    match action {
        WorkerAction::Add { name, email, rate } => {
            let id = db.add_worker(
                org,
                &NewWorker {
                    name: name.clone(),
                    email: email.clone(),
                    hourly_rate: *rate,
                },
            )?;
            writeln!(writer, "Added worker {id}: {}", name.trim())?;
        }
        WorkerAction::Update {
            id,
            name,
            email,
            rate,
        } => {
            if name.is_none() && email.is_none() && rate.is_none() {
                bail!("nothing to update: pass --name, --email or --rate");
            }
            let id = WorkerId::new(*id);
            let update = WorkerUpdate {
                name: name.clone(),
                email: email.clone(),
                hourly_rate: *rate,
            };
            db.update_worker(org, id, &update)?;
            writeln!(writer, "Updated worker {id}")?;
        }
        WorkerAction::List { json } => {
            let workers = db.list_workers(org)?;
            if *json {
                return write_json(writer, &workers);
            }
            if workers.is_empty() {
                writeln!(writer, "No workers.")?;
                return Ok(());
            }
            for worker in &workers {
                let status = if worker.active { "" } else { " (inactive)" };
                writeln!(
                    writer,
                    "{:>4}  {} <{}>  {:.2}/h{status}",
                    worker.id,
                    worker.name,
                    worker.email,
                    worker.effective_rate()
                )?;
            }
        }
        WorkerAction::Activate { id } => {
            let id = WorkerId::new(*id);
            db.set_worker_active(org, id, true)?;
            writeln!(writer, "Activated worker {id}")?;
        }
        WorkerAction::Deactivate { id } => {
            let id = WorkerId::new(*id);
            db.set_worker_active(org, id, false)?;
            writeln!(writer, "Deactivated worker {id}")?;
        }
    }
    Ok(())
}

pub fn run_site<W: Write>(
    writer: &mut W,
    db: &mut Database,
    org: OrgId,
    action: &SiteAction,
) -> Result<()> {
    match action {
        SiteAction::Add { name, address } => {
            let id = db.add_location(org, name, address.as_deref())?;
            writeln!(writer, "Added site {id}: {}", name.trim())?;
        }
        SiteAction::Update { id, name, address } => {
            if name.is_none() && address.is_none() {
                bail!("nothing to update: pass --name or --address");
            }
            let id = LocationId::new(*id);
            let update = LocationUpdate {
                name: name.clone(),
                address: address.clone(),
            };
            db.update_location(org, id, &update)?;
            writeln!(writer, "Updated site {id}")?;
        }
        SiteAction::List { json } => {
            let locations = db.list_locations(org)?;
            if *json {
                return write_json(writer, &locations);
            }
            if locations.is_empty() {
                writeln!(writer, "No sites.")?;
                return Ok(());
            }
            for location in &locations {
                let status = if location.active { "" } else { " (inactive)" };
                match &location.address {
                    Some(address) => writeln!(
                        writer,
                        "{:>4}  {} ({address}){status}",
                        location.id, location.name
                    )?,
                    None => writeln!(writer, "{:>4}  {}{status}", location.id, location.name)?,
                }
            }
        }
        SiteAction::Activate { id } => {
            let id = LocationId::new(*id);
            db.set_location_active(org, id, true)?;
            writeln!(writer, "Activated site {id}")?;
        }
        SiteAction::Deactivate { id } => {
            let id = LocationId::new(*id);
            db.set_location_active(org, id, false)?;
            writeln!(writer, "Deactivated site {id}")?;
        }
    }
    Ok(())
}
