//! Tests for engine module.

use super::engine::*;
use super::types::{EventKind, PendingEvent, PendingModule, PendingModuleItem, SyncError, SyncPhase};
use crate::credentials::Credential;
use crate::error::DatabaseError;
use crate::lms::{Course, FetchError, RawAssignment, RawModule};
use crate::storage::config::Config;
use crate::storage::{BatchReceipt, SyncStore};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn course(id: i64, name: &str) -> Course {
    Course {
        remote_id: id,
        name: name.into(),
    }
}

fn assignment(name: &str, due_at: Option<&str>) -> RawAssignment {
    RawAssignment {
        name: Some(name.into()),
        due_at: due_at.map(str::to_string),
        description: Some(format!("{name} description")),
    }
}

fn module(id: i64, name: &str) -> RawModule {
    RawModule {
        id,
        name: Some(name.into()),
        description: None,
    }
}

fn fixed_2025() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

#[test]
fn pending_event_keeps_only_current_year() {
    let c = course(1, "Math");
    let in_year = pending_event("alice", &c, &assignment("HW 1", Some("2025-03-15T23:59:00Z")), 2025)
        .unwrap();
    assert_eq!(in_year.kind, EventKind::Assignment);
    assert!(!in_year.custom);
    assert_eq!(in_year.course_name, "Math");
    assert_eq!(in_year.description, "HW 1 description");

    assert!(pending_event("alice", &c, &assignment("Old", Some("2024-12-31T23:59:59Z")), 2025).is_none());
    assert!(pending_event("alice", &c, &assignment("Next", Some("2026-01-01T00:00:00")), 2025).is_none());
    assert!(pending_event("alice", &c, &assignment("Undated", None), 2025).is_none());
    assert!(pending_event("alice", &c, &assignment("Garbled", Some("soon")), 2025).is_none());
}

#[test]
fn pending_event_uses_year_as_written() {
    let c = course(1, "Math");
    let late = pending_event("alice", &c, &assignment("Final", Some("2025-12-31T20:00:00-05:00")), 2025)
        .unwrap();
    assert_eq!(late.due_at, Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap());
    assert_eq!(late.due_at.year(), 2026);

    assert!(pending_event("alice", &c, &assignment("Early", Some("2026-01-01T02:00:00+05:00")), 2025).is_none());
}

#[test]
fn pending_event_defaults_missing_strings() {
    let raw = RawAssignment {
        name: None,
        due_at: Some("2025-04-01T00:00:00Z".into()),
        description: None,
    };
    let event = pending_event("alice", &course(1, "Math"), &raw, 2025).unwrap();
    assert_eq!(event.title, "Untitled Assignment");
    assert_eq!(event.description, "");
}

#[test]
fn plan_batch_isolates_failed_fetches() {
    let fetched = vec![
        CourseFetch {
            course: course(1, "Math"),
            assignments: Err(FetchError::Status {
                status: 500,
                message: String::new(),
            }),
            modules: Ok(vec![module(10, "Week 1")]),
        },
        CourseFetch {
            course: course(2, "Bio"),
            assignments: Ok(vec![
                assignment("Lab 1", Some("2025-02-01T10:00:00Z")),
                assignment("Lab 0", Some("2024-09-01T10:00:00Z")),
            ]),
            modules: Err(FetchError::Decode("bad".into())),
        },
    ];

    let plan = plan_batch("alice", 2025, fetched);

    assert_eq!(plan.events.len(), 1);
    assert_eq!(plan.events[0].title, "Lab 1");
    assert_eq!(plan.assignments_dropped, 1);
    assert_eq!(plan.failed_fetches, 2);
    assert_eq!(plan.modules.len(), 1);
    assert_eq!(plan.modules[0].course_name, "Math");
    assert_eq!(plan.jobs[0].module_remote_id, 10);
    assert_eq!(plan.jobs[0].course_remote_id, 1);
}

#[test]
fn plan_batch_gives_duplicate_titles_distinct_keys() {
    let fetched = vec![CourseFetch {
        course: course(1, "Math"),
        assignments: Ok(vec![]),
        modules: Ok(vec![module(10, "Review"), module(11, "Review")]),
    }];
    let plan = plan_batch("alice", 2025, fetched);
    let keys: Vec<_> = plan.modules.iter().map(|m| m.key).collect();
    assert_eq!(keys, vec![0, 1]);
    assert_eq!(plan.jobs[1].key, 1);
    assert_eq!(plan.jobs[1].module_remote_id, 11);
}

#[tokio::test]
async fn run_bounded_respects_limit() {
    static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
    static PEAK: AtomicUsize = AtomicUsize::new(0);

    let jobs = (0..12).map(|i| async move {
        let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
        PEAK.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
        i
    });

    let mut out = run_bounded(3, jobs).await.unwrap();
    out.sort();
    assert_eq!(out, (0..12).collect::<Vec<_>>());
    assert!(PEAK.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn run_bounded_reports_panicked_worker() {
    let jobs = (0..2).map(|i| async move {
        if i == 1 {
            panic!("worker blew up");
        }
        i
    });
    let err = run_bounded(2, jobs).await.unwrap_err();
    assert!(matches!(err, SyncError::Worker(_)));
}

/// Store whose batch write always fails.
struct BrokenStore {
    item_writes: usize,
}

impl SyncStore for BrokenStore {
    fn write_batch(
        &mut self,
        _events: &[PendingEvent],
        _modules: &[PendingModule],
    ) -> Result<BatchReceipt, DatabaseError> {
        Err(DatabaseError::Locked)
    }

    fn write_module_items(&mut self, _items: &[PendingModuleItem]) -> Result<usize, DatabaseError> {
        self.item_writes += 1;
        Ok(0)
    }
}

/// Store that loses module ids, so every job is unresolved.
struct ForgetfulStore;

impl SyncStore for ForgetfulStore {
    fn write_batch(
        &mut self,
        events: &[PendingEvent],
        _modules: &[PendingModule],
    ) -> Result<BatchReceipt, DatabaseError> {
        Ok(BatchReceipt {
            events_created: events.len(),
            module_ids: Default::default(),
        })
    }

    fn write_module_items(&mut self, items: &[PendingModuleItem]) -> Result<usize, DatabaseError> {
        Ok(items.len())
    }
}

fn engine() -> SyncEngine {
    let config = Config {
        http: crate::storage::config::HttpConfig {
            max_retries: 0,
            ..Default::default()
        },
        ..Config::default()
    };
    SyncEngine::from_config(&config).unwrap().with_clock(fixed_2025)
}

async fn one_course_server() -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/courses")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id": 1, "name": "Math"}]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/courses/1/assignments")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"name": "HW 1", "due_at": "2025-03-15T23:59:00Z"}]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/courses/1/modules")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id": 10, "name": "Week 1"}]"#)
        .create_async()
        .await;
    server
}

#[tokio::test]
async fn persistence_failure_aborts_before_items() {
    let mut server = one_course_server().await;
    let items = server
        .mock("GET", "/api/v1/courses/1/modules/10/items")
        .with_status(200)
        .with_body("[]")
        .expect(0)
        .create_async()
        .await;

    let engine = engine();
    let mut store = BrokenStore { item_writes: 0 };
    let cred = Credential::new(server.url(), "tok");

    let err = engine.sync(&mut store, &cred, "alice").await.unwrap_err();

    assert!(matches!(err, SyncError::Persistence(DatabaseError::Locked)));
    assert_eq!(store.item_writes, 0);
    assert_eq!(engine.status().phase, SyncPhase::Failed);
    items.assert_async().await;
}

#[tokio::test]
async fn unresolved_modules_are_skipped_not_fatal() {
    let mut server = one_course_server().await;
    let items = server
        .mock("GET", "/api/v1/courses/1/modules/10/items")
        .with_status(200)
        .with_body(r#"[{"title": "Syllabus"}]"#)
        .expect(0)
        .create_async()
        .await;

    let engine = engine();
    let cred = Credential::new(server.url(), "tok");
    let report = engine.sync(&mut ForgetfulStore, &cred, "alice").await.unwrap();

    assert_eq!(report.events_created, 1);
    assert_eq!(report.modules_created, 0);
    assert_eq!(report.unresolved_modules, 1);
    assert_eq!(report.items_created, 0);
    assert_eq!(engine.status().phase, SyncPhase::Done);
    items.assert_async().await;
}
