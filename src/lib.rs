// Matchgate - concurrent order-processing engine for trading venues
// Core library module

use chrono::Datelike;

pub mod book;
pub mod common;
pub mod error;
pub mod model;
pub mod persist;
pub mod process;
pub mod queues;
pub mod runtime;
pub mod sequencer;
pub mod store;
pub mod subscription;
pub mod tasks;

pub use error::{EngineError, Result};
pub use runtime::Runtime;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Session date (`yyyymmdd`) stamped into every identifier.
    pub session_date: u32,
    pub event_workers: usize,
    pub transaction_workers: usize,
    pub data_dir: String,
    /// Record-log file name inside `data_dir`.
    pub record_log_file: String,
    pub enable_record_log: bool,
    /// Mirror connection string; `None` disables the write-behind pipeline.
    pub postgres_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let today = chrono::Utc::now();
        let session_date =
            today.year() as u32 * 10_000 + today.month() * 100 + today.day();
        let cores = num_cpus::get().max(1);
        Self {
            session_date,
            event_workers: cores,
            transaction_workers: cores,
            data_dir: "./data".to_string(),
            record_log_file: "records.log".to_string(),
            enable_record_log: true,
            postgres_url: None,
        }
    }
}
