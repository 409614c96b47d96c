//! SQLite-backed storage for synced course data.
//!
//! Provides persistent storage for:
//! - Calendar events (synced assignments and user-entered custom events)
//! - Course modules and their items
//!
//! Every row is scoped to an owner; module items hang off their module and
//! disappear with it.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Params, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError};
use crate::sync::types::{BatchKey, EventKind, PendingEvent, PendingModule, PendingModuleItem};

/// Persistence seam used by the sync orchestrator.
pub trait SyncStore {
    /// Write events and modules in one transaction.
    ///
    /// Either every row is written or none is. The receipt maps each pending
    /// module's batch key to its new row id.
    fn write_batch(
        &mut self,
        events: &[PendingEvent],
        modules: &[PendingModule],
    ) -> Result<BatchReceipt, DatabaseError>;

    /// Write module items in one transaction, returning how many were written.
    fn write_module_items(&mut self, items: &[PendingModuleItem]) -> Result<usize, DatabaseError>;
}

/// Result of [`SyncStore::write_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub events_created: usize,
    pub module_ids: HashMap<BatchKey, i64>,
}

impl BatchReceipt {
    pub fn modules_created(&self) -> usize {
        self.module_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub kind: EventKind,
    pub course_name: Option<String>,
    pub custom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: i64,
    pub owner: String,
    pub course_name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleItemRecord {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub item_type: String,
    pub external_url: String,
    pub content: String,
}

/// A user-entered calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub kind: EventKind,
    pub course_name: Option<String>,
}

/// Row counts for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCounts {
    pub events: usize,
    pub modules: usize,
    pub items: usize,
}

const EVENT_COLUMNS: &str = "id, owner, title, description, due_at, kind, course_name, custom";
const MODULE_COLUMNS: &str = "id, owner, course_name, title, description";
const ITEM_COLUMNS: &str = "id, module_id, title, item_type, external_url, content";

/// SQLite database holding synced course data.
pub struct CourseStore {
    conn: Connection,
}

impl CourseStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/coursesync.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("coursesync.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn events_for_owner(&self, owner: &str) -> Result<Vec<EventRecord>, DatabaseError> {
        self.query_events(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE owner = ?1 ORDER BY due_at, id"),
            params![owner],
        )
    }

    /// Assignments due at or after `now`, soonest first.
    pub fn upcoming_assignments(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DatabaseError> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE owner = ?1 AND kind = 'assignment' AND due_at >= ?2
                 ORDER BY due_at, id"
            ),
            params![owner, encode_time(now)],
        )
    }

    pub fn course_assignments(
        &self,
        owner: &str,
        course_name: &str,
    ) -> Result<Vec<EventRecord>, DatabaseError> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE owner = ?1 AND course_name = ?2 AND kind = 'assignment'
                 ORDER BY due_at, id"
            ),
            params![owner, course_name],
        )
    }

    pub fn event(&self, owner: &str, id: i64) -> Result<Option<EventRecord>, DatabaseError> {
        Ok(self
            .query_events(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE owner = ?1 AND id = ?2"),
                params![owner, id],
            )?
            .pop())
    }

    /// Distinct course names that have modules, alphabetically.
    pub fn course_names(&self, owner: &str) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT course_name FROM modules WHERE owner = ?1 ORDER BY course_name",
        )?;
        let rows = stmt.query_map(params![owner], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn course_modules(
        &self,
        owner: &str,
        course_name: &str,
    ) -> Result<Vec<ModuleRecord>, DatabaseError> {
        self.query_modules(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules WHERE owner = ?1 AND course_name = ?2 ORDER BY id"
            ),
            params![owner, course_name],
        )
    }

    /// Modules matching a (course name, title) pair; several rows can match.
    pub fn find_modules(
        &self,
        owner: &str,
        course_name: &str,
        title: &str,
    ) -> Result<Vec<ModuleRecord>, DatabaseError> {
        self.query_modules(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules
                 WHERE owner = ?1 AND course_name = ?2 AND title = ?3 ORDER BY id"
            ),
            params![owner, course_name, title],
        )
    }

    pub fn module_items(&self, module_id: i64) -> Result<Vec<ModuleItemRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM module_items WHERE module_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(ModuleItemRecord {
                id: row.get(0)?,
                module_id: row.get(1)?,
                title: row.get(2)?,
                item_type: row.get(3)?,
                external_url: row.get(4)?,
                content: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn counts(&self, owner: &str) -> Result<OwnerCounts, DatabaseError> {
        let count = |sql: &str| -> Result<usize, DatabaseError> {
            let n: i64 = self.conn.query_row(sql, params![owner], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(OwnerCounts {
            events: count("SELECT COUNT(*) FROM events WHERE owner = ?1")?,
            modules: count("SELECT COUNT(*) FROM modules WHERE owner = ?1")?,
            items: count(
                "SELECT COUNT(*) FROM module_items
                 WHERE module_id IN (SELECT id FROM modules WHERE owner = ?1)",
            )?,
        })
    }

    /// Delete every event belonging to `owner`. Modules are kept.
    pub fn clear_events(&self, owner: &str) -> Result<usize, DatabaseError> {
        Ok(self
            .conn
            .execute("DELETE FROM events WHERE owner = ?1", params![owner])?)
    }

    /// Delete all of `owner`'s events, modules and module items.
    pub fn wipe_owner(&mut self, owner: &str) -> Result<OwnerCounts, DatabaseError> {
        let before = self.counts(owner)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM events WHERE owner = ?1", params![owner])?;
        tx.execute("DELETE FROM modules WHERE owner = ?1", params![owner])?;
        tx.commit()?;
        Ok(before)
    }

    /// Insert a user-entered event, flagged as custom.
    pub fn add_custom_event(&self, owner: &str, event: &NewEvent) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO events (owner, title, description, due_at, kind, course_name, custom)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![
                owner,
                event.title,
                event.description,
                encode_time(event.due_at),
                event.kind.as_str(),
                event.course_name,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Delete a custom event. Synced events and other owners' rows are untouched.
    pub fn delete_custom_event(&self, owner: &str, id: i64) -> Result<bool, DatabaseError> {
        let deleted = self.conn.execute(
            "DELETE FROM events WHERE id = ?1 AND owner = ?2 AND custom = 1",
            params![id, owner],
        )?;
        Ok(deleted > 0)
    }

    pub fn custom_events(&self, owner: &str) -> Result<Vec<EventRecord>, DatabaseError> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE owner = ?1 AND custom = 1 ORDER BY due_at, id"
            ),
            params![owner],
        )
    }

    fn query_events<P: Params>(&self, sql: &str, params: P) -> Result<Vec<EventRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, RawEventRow::from_row)?;
        rows.map(|row| -> Result<EventRecord, DatabaseError> { row?.into_record() })
            .collect()
    }

    fn query_modules<P: Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ModuleRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(ModuleRecord {
                id: row.get(0)?,
                owner: row.get(1)?,
                course_name: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl SyncStore for CourseStore {
    fn write_batch(
        &mut self,
        events: &[PendingEvent],
        modules: &[PendingModule],
    ) -> Result<BatchReceipt, DatabaseError> {
        let tx = self.conn.transaction()?;
        let mut receipt = BatchReceipt::default();

        {
            let mut insert_event = tx.prepare(
                "INSERT INTO events (owner, title, description, due_at, kind, course_name, custom)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for event in events {
                insert_event.execute(params![
                    event.owner,
                    event.title,
                    event.description,
                    encode_time(event.due_at),
                    event.kind.as_str(),
                    event.course_name,
                    event.custom,
                ])?;
                receipt.events_created += 1;
            }

            let mut insert_module = tx.prepare(
                "INSERT INTO modules (owner, course_name, title, description)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for module in modules {
                let id = insert_module.insert(params![
                    module.owner,
                    module.course_name,
                    module.title,
                    module.description,
                ])?;
                receipt.module_ids.insert(module.key, id);
            }
        }

        tx.commit()?;
        Ok(receipt)
    }

    fn write_module_items(&mut self, items: &[PendingModuleItem]) -> Result<usize, DatabaseError> {
        if items.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO module_items (module_id, title, item_type, external_url, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for item in items {
                insert.execute(params![
                    item.module_id,
                    item.title,
                    item.item_type,
                    item.external_url,
                    item.content,
                ])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }
}

/// Event row before text columns are validated.
struct RawEventRow {
    id: i64,
    owner: String,
    title: String,
    description: String,
    due_at: String,
    kind: String,
    course_name: Option<String>,
    custom: bool,
}

impl RawEventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            due_at: row.get(4)?,
            kind: row.get(5)?,
            course_name: row.get(6)?,
            custom: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<EventRecord, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            table: "events",
            message,
        };
        let due_at = DateTime::parse_from_rfc3339(&self.due_at)
            .map_err(|e| corrupt(format!("id {}: due_at '{}': {e}", self.id, self.due_at)))?
            .with_timezone(&Utc);
        let kind = self
            .kind
            .parse::<EventKind>()
            .map_err(|e| corrupt(format!("id {}: {e}", self.id)))?;

        Ok(EventRecord {
            id: self.id,
            owner: self.owner,
            title: self.title,
            description: self.description,
            due_at,
            kind,
            course_name: self.course_name,
            custom: self.custom,
        })
    }
}

/// Fixed-width RFC 3339 so text comparison matches time order.
fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
