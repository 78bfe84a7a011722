use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Process-level configuration read from the environment:
/// - `TIMETABLED_LOG`: tracing filter (falls back to `RUST_LOG`, then `info`)
/// - `TIMETABLED_WORKSPACE`: workspace to open at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            log_filter: env::var("TIMETABLED_LOG")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            workspace: env::var_os("TIMETABLED_WORKSPACE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Logs go to stderr; stdout carries IPC responses only.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
