//! Init command for creating an organization.

use std::io::Write;

use anyhow::Result;

use wk_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, name: &str) -> Result<()> {
    let org = db.create_organization(name)?;
    writeln!(writer, "Created organization {org}: {}", name.trim())?;
    Ok(())
}
