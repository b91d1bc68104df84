use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default look-ahead horizon of the scheduler, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 14;

/// Default period of the background trigger: once a day.
pub const DEFAULT_TICK_SECS: u64 = 24 * 60 * 60;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON database file.
    pub db_path: PathBuf,
    /// How many days past today the scheduler keeps populated.
    pub window_days: u32,
    /// Period between daemon runs.
    pub tick_interval: Duration,
}

impl Config {
    /// Builds the config from environment variables, loading `.env` first
    /// (a missing file is ignored).
    ///
    /// - `CHORUST_DB`: database path.
    /// - `CHORUST_WINDOW_DAYS`: look-ahead window.
    /// - `CHORUST_TICK_SECS`: daemon tick period.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            db_path: db_path(),
            window_days: env_parse("CHORUST_WINDOW_DAYS").unwrap_or(DEFAULT_WINDOW_DAYS),
            tick_interval: Duration::from_secs(
                env_parse("CHORUST_TICK_SECS").filter(|s| *s > 0).unwrap_or(DEFAULT_TICK_SECS),
            ),
        }
    }
}

/// Returns the path to the database file (`chorust.json`).
///
/// The path is determined in the following order:
/// 1. `CHORUST_DB` environment variable.
/// 2. `~/.local/share/chorust/chorust.json` (on Linux).
/// 3. `./chorust.json` (fallback).
pub fn db_path() -> PathBuf {
    env::var("CHORUST_DB").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("chorust");
        if !p.exists() {
            let _ = fs::create_dir_all(&p);
        }
        p.push("chorust.json");
        p
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
