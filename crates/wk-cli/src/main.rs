use std::io;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wk_cli::commands::clock::ClockContext;
use wk_cli::commands::util::parse_datetime;
use wk_cli::commands::{admin, clock, init, report, status};
use wk_cli::{Cli, Commands, Config};
use wk_core::{LocationId, OrgId, QueryContext, Reports, WorkerId};
use wk_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(cli: &Cli) -> Result<(Database, Config)> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

/// Resolves the organization, clock and reference zone for this invocation.
fn query_context(cli: &Cli, config: &Config) -> Result<QueryContext> {
    let now = match &cli.now {
        Some(now) => parse_datetime(now, Utc::now()).context("invalid --now")?,
        None => Utc::now(),
    };
    let offset: FixedOffset = config
        .offset()
        .with_context(|| format!("invalid utc_offset '{}'", config.utc_offset))?;
    let org = OrgId::new(cli.org.unwrap_or(config.organization_id));
    Ok(QueryContext::new(org, now, offset))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(&cli)?;
    let ctx = query_context(&cli, &config)?;
    let mut out = io::stdout().lock();

    match command {
        Commands::Init { name } => init::run(&mut out, &mut db, name)?,
        Commands::Worker(action) => admin::run_worker(&mut out, &mut db, ctx.org, action)?,
        Commands::Site(action) => admin::run_site(&mut out, &mut db, ctx.org, action)?,
        Commands::ClockIn { worker, site, at } => {
            let clock_ctx = clock_context(&ctx);
            clock::clock_in(
                &mut out,
                &mut db,
                &clock_ctx,
                WorkerId::new(*worker),
                LocationId::new(*site),
                at.as_deref(),
            )?;
        }
        Commands::Switch { worker, site, at } => {
            let clock_ctx = clock_context(&ctx);
            clock::switch(
                &mut out,
                &mut db,
                &clock_ctx,
                WorkerId::new(*worker),
                LocationId::new(*site),
                at.as_deref(),
            )?;
        }
        Commands::ClockOut { worker, at } => {
            let clock_ctx = clock_context(&ctx);
            clock::clock_out(
                &mut out,
                &mut db,
                &clock_ctx,
                WorkerId::new(*worker),
                at.as_deref(),
            )?;
        }
        Commands::Status { json } => {
            let reports = Reports::new(&db, ctx);
            status::run(&mut out, &reports, &config.database_path, *json)?;
        }
        Commands::Active { json } => {
            report::active(&mut out, &Reports::new(&db, ctx), *json)?;
        }
        Commands::Payroll { days, json } => {
            let days = days.unwrap_or(config.payroll_window_days);
            report::payroll(&mut out, &Reports::new(&db, ctx), days, *json)?;
        }
        Commands::Hours { worker, days, json } => {
            let days = days.unwrap_or(config.detail_window_days);
            report::hours(
                &mut out,
                &Reports::new(&db, ctx),
                WorkerId::new(*worker),
                days,
                *json,
            )?;
        }
        Commands::Sites { json } => {
            report::sites(&mut out, &Reports::new(&db, ctx), *json)?;
        }
        Commands::Today { json } => {
            report::today(&mut out, &Reports::new(&db, ctx), *json)?;
        }
        Commands::Earnings { worker, days, json } => {
            let days = days.unwrap_or(config.payroll_window_days);
            report::earnings(
                &mut out,
                &Reports::new(&db, ctx),
                WorkerId::new(*worker),
                days,
                config.tax_rate,
                *json,
            )?;
        }
        Commands::Timeline { worker, date, json } => {
            let day: NaiveDate = date.unwrap_or_else(|| ctx.today());
            report::timeline(
                &mut out,
                &Reports::new(&db, ctx),
                WorkerId::new(*worker),
                day,
                *json,
            )?;
        }
        Commands::Report { from, to, json } => {
            let today = ctx.today();
            let (from, to) = (from.unwrap_or(today), to.unwrap_or(today));
            report::range_report(&mut out, &Reports::new(&db, ctx), from, to, *json)?;
        }
        Commands::Shifts {
            worker,
            from,
            to,
            json,
        } => {
            let today = ctx.today();
            let (from, to) = (from.unwrap_or(today), to.unwrap_or(today));
            report::shifts(
                &mut out,
                &Reports::new(&db, ctx),
                WorkerId::new(*worker),
                from,
                to,
                *json,
            )?;
        }
    }

    Ok(())
}

const fn clock_context(ctx: &QueryContext) -> ClockContext {
    ClockContext {
        org: ctx.org,
        now: ctx.now,
        offset: ctx.offset,
    }
}
