use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Longest a ledger transaction waits on a row lock.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Longest any single statement inside a ledger transaction may run.
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_ms: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout() -> u64 { 3 }
fn default_lock_timeout() -> u64 { 2_000 }
fn default_statement_timeout() -> u64 { 5_000 }

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// IANA zone the schedule dates and times are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_grace")]
    pub grace_minutes: i64,
    #[serde(default = "default_history_window")]
    pub history_window_minutes: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            grace_minutes: default_grace(),
            history_window_minutes: default_history_window(),
        }
    }
}

fn default_timezone() -> String { "Asia/Dhaka".into() }
fn default_grace() -> i64 { 15 }
fn default_history_window() -> i64 { 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct ReaperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_seconds: default_interval(),
        }
    }
}

fn default_enabled() -> bool { true }
fn default_interval() -> u64 { 60 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `BUSLINE__REAPER__INTERVAL_SECONDS=30`
            .add_source(config::Environment::with_prefix("BUSLINE").separator("__"))
            .build()?;

        let cfg: Self = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.booking.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(config::ConfigError::Message(format!(
                "booking.timezone: unknown time zone {:?}",
                self.booking.timezone
            )));
        }
        if self.booking.grace_minutes < 0 || self.booking.history_window_minutes < 0 {
            return Err(config::ConfigError::Message(
                "booking windows must not be negative".into(),
            ));
        }
        if self.reaper.interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "reaper.interval_seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
