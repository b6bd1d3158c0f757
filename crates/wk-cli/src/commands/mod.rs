//! CLI subcommand implementations.

pub mod admin;
pub mod clock;
pub mod init;
pub mod report;
pub mod status;
pub mod util;
