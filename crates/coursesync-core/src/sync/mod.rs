//! Course synchronization.
//!
//! Pulls courses, assignments, modules and module items from the LMS and
//! merges them into the local course store for one owner.

pub mod engine;
pub mod types;

#[cfg(test)]
mod engine_tests;

pub use engine::{pending_event, plan_batch, BatchPlan, CourseFetch, SyncEngine};
pub use types::{
    BatchKey, EventKind, ModuleJob, PendingEvent, PendingModule, PendingModuleItem, SyncError,
    SyncPhase, SyncReport, SyncStatus,
};
