//! # coursesync core library
//!
//! Pulls a student's course data from a Canvas-style LMS and keeps it in a
//! local SQLite store. The `coursesync` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **LMS client**: authenticated, retrying JSON fetches over a pooled
//!   HTTP client, plus typed endpoint wrappers
//! - **Sync engine**: phased orchestrator with bounded concurrent fetches and
//!   a transactional event/module write
//! - **Storage**: SQLite course store and TOML configuration
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: runs one sync pass for an owner
//! - [`CourseStore`]: events, modules and module items persistence
//! - [`Config`]: application configuration management
//! - [`Credential`]: LMS base URL and access token

pub mod credentials;
pub mod dates;
pub mod error;
pub mod lms;
pub mod storage;
pub mod sync;

pub use credentials::Credential;
pub use error::{ConfigError, CoreError, CredentialError, DatabaseError, ValidationError};
pub use lms::{FetchClient, FetchError, LmsApi};
pub use storage::{Config, CourseStore, EventRecord, ModuleItemRecord, ModuleRecord, NewEvent, SyncStore};
pub use sync::{EventKind, SyncEngine, SyncError, SyncPhase, SyncReport, SyncStatus};
