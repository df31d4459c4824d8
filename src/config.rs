use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runs a CSV script of loan requests through the billing engine.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Request script: CSV with `method, path, body` columns
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "BILLING_ENGINE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Deadline for each request, in milliseconds
    #[arg(long, env = "BILLING_ENGINE_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Number of synthetic borrowers to create before processing requests
    #[arg(long, default_value_t = 0)]
    pub seed_borrowers: u32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
