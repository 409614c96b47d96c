pub mod config;
pub mod course_store;
pub mod migrations;

pub use config::Config;
pub use course_store::{
    BatchReceipt, CourseStore, EventRecord, ModuleItemRecord, ModuleRecord, NewEvent, OwnerCounts,
    SyncStore,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `COURSESYNC_HOME` wins when set. Otherwise `~/.config/coursesync[-dev]/`
/// based on `COURSESYNC_ENV` (set `COURSESYNC_ENV=dev` for a scratch
/// directory).
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("COURSESYNC_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("COURSESYNC_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("coursesync-dev")
            } else {
                base_dir.join("coursesync")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
