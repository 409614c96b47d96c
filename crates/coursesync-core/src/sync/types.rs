//! Core types for course synchronization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::lms::FetchError;

/// Calendar entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Assignment,
    Quiz,
    Test,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Assignment => "assignment",
            EventKind::Quiz => "quiz",
            EventKind::Test => "test",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignment" => Ok(EventKind::Assignment),
            "quiz" => Ok(EventKind::Quiz),
            "test" => Ok(EventKind::Test),
            other => Err(format!("unknown event kind '{other}' (expected assignment, quiz or test)")),
        }
    }
}

/// Batch-local identifier tying a pending module to its persisted row.
pub type BatchKey = usize;

/// An event ready to be written.
///
/// `due_at` is always present: assignments without a parseable due date never
/// become a `PendingEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub owner: String,
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub kind: EventKind,
    pub course_name: String,
    pub custom: bool,
}

/// A module ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingModule {
    pub key: BatchKey,
    pub owner: String,
    pub course_name: String,
    pub title: String,
    pub description: String,
}

/// Work item for the item-fetch phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleJob {
    pub key: BatchKey,
    pub course_remote_id: i64,
    pub course_name: String,
    pub module_remote_id: i64,
    pub module_title: String,
}

/// A module item attached to an already persisted module row.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingModuleItem {
    pub module_id: i64,
    pub title: String,
    pub item_type: String,
    pub external_url: String,
    pub content: String,
}

/// Where a sync run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    FetchingCourses,
    NoCourses,
    FetchingCourseData,
    Merging,
    FetchingItems,
    Done,
    Failed,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub events_created: usize,
    pub modules_created: usize,
    pub items_created: usize,
    /// Active courses returned by the LMS.
    pub courses: usize,
    /// Assignments excluded by the due-date filter.
    pub assignments_dropped: usize,
    /// Isolated fetches that failed and were treated as empty.
    pub failed_fetches: usize,
    /// Module jobs with no persisted row to attach items to.
    pub unresolved_modules: usize,
}

/// Snapshot of the engine's most recent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
}

/// Errors that abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Error fetching courses: {0}")]
    CoursesFetch(#[source] FetchError),

    #[error("Failed to write synced data: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Sync worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Worker(err.to_string())
    }
}
