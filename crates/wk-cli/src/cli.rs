//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Shift clock and payroll reports.
///
/// Records when workers clock in, move between job sites and clock out,
/// and reports hours, cost and site activity from those records.
#[derive(Debug, Parser)]
#[command(name = "wk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Organization ID (overrides `organization_id` in config).
    #[arg(long, global = true)]
    pub org: Option<i64>,

    /// Time to treat as "now" (ISO 8601 or e.g. '2 hours ago').
    #[arg(long, global = true)]
    pub now: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an organization.
    Init {
        /// Organization name.
        name: String,
    },

    /// Manage workers.
    #[command(subcommand)]
    Worker(WorkerAction),

    /// Manage job sites.
    #[command(subcommand)]
    Site(SiteAction),

    /// Start a shift at a site.
    ClockIn {
        #[arg(long)]
        worker: i64,
        #[arg(long)]
        site: i64,
        /// When the shift started (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Move a clocked-in worker to another site.
    Switch {
        #[arg(long)]
        worker: i64,
        #[arg(long)]
        site: i64,
        /// When the move happened (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// End a worker's shift.
    ClockOut {
        #[arg(long)]
        worker: i64,
        /// When the shift ended (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Show head counts for the organization.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List workers who are clocked in right now.
    Active {
        #[arg(long)]
        json: bool,
    },

    /// Hours and cost per worker over the last N days.
    Payroll {
        /// Window length in days (defaults to `payroll_window_days`).
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },

    /// Hours and cost for one worker over the last N days.
    Hours {
        /// Worker ID.
        worker: i64,
        /// Window length in days (defaults to `detail_window_days`).
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },

    /// Rank active sites by head count and hours today.
    Sites {
        #[arg(long)]
        json: bool,
    },

    /// Summarize today's shifts.
    Today {
        #[arg(long)]
        json: bool,
    },

    /// Estimated take-home pay for one worker.
    Earnings {
        /// Worker ID.
        worker: i64,
        /// Window length in days (defaults to `payroll_window_days`).
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },

    /// Every segment started in a date range, with cost and totals.
    Report {
        /// First day, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// A worker's shifts started in a date range.
    Shifts {
        /// Worker ID.
        worker: i64,
        /// First day, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// A worker's site segments on one day.
    Timeline {
        /// Worker ID.
        worker: i64,
        /// Day to show, YYYY-MM-DD (defaults to today).
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
}

/// Worker administration.
#[derive(Debug, Subcommand)]
pub enum WorkerAction {
    /// Add a worker.
    Add {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Contact email, unique within the organization.
        #[arg(long)]
        email: String,
        /// Hourly pay rate.
        #[arg(long, default_value_t = 0.0)]
        rate: f64,
    },
    /// Change a worker's name, email or rate.
    Update {
        /// Worker ID.
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        rate: Option<f64>,
    },
    /// List workers.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Mark a worker active again.
    Activate {
        /// Worker ID.
        id: i64,
    },
    /// Mark a worker inactive.
    Deactivate {
        /// Worker ID.
        id: i64,
    },
}

/// Job site administration.
#[derive(Debug, Subcommand)]
pub enum SiteAction {
    /// Add a job site.
    Add {
        /// Display name, unique within the organization.
        #[arg(long)]
        name: String,
        /// Street address.
        #[arg(long)]
        address: Option<String>,
    },
    /// Rename a job site or change its address.
    Update {
        /// Site ID.
        id: i64,
        #[arg(long)]
        name: Option<String>,
        /// New address; pass an empty string to clear it.
        #[arg(long)]
        address: Option<String>,
    },
    /// List job sites.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Mark a job site active again.
    Activate {
        /// Site ID.
        id: i64,
    },
    /// Mark a job site inactive.
    Deactivate {
        /// Site ID.
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["wk", "payroll", "--days", "14", "--org", "3", "--json"])
            .unwrap();
        assert_eq!(cli.org, Some(3));
        match cli.command {
            Some(Commands::Payroll { days, json }) => {
                assert_eq!(days, Some(14));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_worker_update() {
        let cli = Cli::try_parse_from(["wk", "worker", "update", "3", "--rate", "22.5"]).unwrap();
        match cli.command {
            Some(Commands::Worker(WorkerAction::Update { id, name, email, rate })) => {
                assert_eq!(id, 3);
                assert_eq!(name, None);
                assert_eq!(email, None);
                assert_eq!(rate, Some(22.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_report_range() {
        let args = ["wk", "report", "--from", "2025-03-01", "--to", "2025-03-07"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Report { from, to, json }) => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 3, 1));
                assert_eq!(to, NaiveDate::from_ymd_opt(2025, 3, 7));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_timeline_date() {
        let cli = Cli::try_parse_from(["wk", "timeline", "4", "--date", "2025-03-10"]).unwrap();
        match cli.command {
            Some(Commands::Timeline { worker, date, .. }) => {
                assert_eq!(worker, 4);
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
