use std::path::PathBuf;

use coursesync_core::{Config, CourseStore};

pub mod auth;
pub mod config;
pub mod courses;
pub mod events;
pub mod sync;
pub mod wipe;

/// Options shared by every command.
pub struct Context {
    pub db: Option<PathBuf>,
}

impl Context {
    /// Open the course store at `--db`, or the default location.
    pub fn store(&self) -> Result<CourseStore, Box<dyn std::error::Error>> {
        let store = match &self.db {
            Some(path) => CourseStore::open_at(path)?,
            None => CourseStore::open()?,
        };
        Ok(store)
    }

    /// Owner whose rows local commands read and write.
    pub fn owner(&self) -> Result<String, Box<dyn std::error::Error>> {
        Ok(Config::load()?.lms.owner)
    }
}
