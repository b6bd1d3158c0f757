//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Organization used when `--org` is not given.
    pub organization_id: i64,

    /// Reference zone for calendar days, as a UTC offset (e.g. `+02:00`).
    pub utc_offset: String,

    /// Default window for `wk payroll` and `wk earnings`.
    pub payroll_window_days: u32,

    /// Default window for `wk hours`.
    pub detail_window_days: u32,

    /// Flat tax rate used by `wk earnings`.
    pub tax_rate: f64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("organization_id", &self.organization_id)
            .field("utc_offset", &self.utc_offset)
            .field("payroll_window_days", &self.payroll_window_days)
            .field("detail_window_days", &self.detail_window_days)
            .field("tax_rate", &self.tax_rate)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("workclock.db"),
            organization_id: 1,
            utc_offset: "+00:00".to_string(),
            payroll_window_days: 7,
            detail_window_days: 30,
            tax_rate: 0.22,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WK_*)
        figment = figment.merge(Env::prefixed("WK_"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the reference zone offset.
    ///
    /// Always succeeds for a config returned by [`Config::load_from`].
    pub fn offset(&self) -> Option<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }

    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    fn validate(&self) -> Result<(), figment::Error> {
        if self.offset().is_none() {
            return Err(format!(
                "invalid utc_offset '{}': expected Z or +HH:MM / -HH:MM",
                self.utc_offset
            )
            .into());
        }
        if !self.tax_rate.is_finite() || !(0.0..=1.0).contains(&self.tax_rate) {
            return Err(format!("tax_rate must be between 0 and 1, got {}", self.tax_rate).into());
        }
        Ok(())
    }
}

/// Parses `Z`, `UTC`, `+HH`, `+HH:MM` or `+HHMM` (and `-` forms).
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let (hours, minutes) = match rest.len() {
        2 => (rest, "00"),
        4 => rest.split_at_checked(2)?,
        5 if rest.as_bytes()[2] == b':' => (&rest[..2], &rest[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Returns the platform-specific config directory for workclock.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("workclock"))
}

/// Returns the platform-specific data directory for workclock.
///
/// On Linux: `~/.local/share/workclock`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("workclock"))
}
