//! Sync orchestrator: pull courses, assignments, modules and module items
//! from the LMS and merge them into local storage.
//!
//! Phases run in order; within a phase, fetches run on a bounded pool and
//! results are matched back by key, not completion order:
//!
//! 1. list active courses (failure aborts the run)
//! 2. per course, assignments and modules concurrently (failures become empty)
//! 3. build pending events (current-year due dates only) and pending modules
//! 4. write events and modules in one transaction
//! 5. per persisted module, fetch items concurrently (failures become empty)
//! 6. write module items

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Utc};
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::credentials::Credential;
use crate::dates::parse_optional_date;
use crate::lms::{Course, FetchClient, FetchError, LmsApi, RawAssignment, RawItem, RawModule};
use crate::storage::config::{Config, SyncConfig};
use crate::storage::SyncStore;
use crate::sync::types::{
    BatchKey, EventKind, ModuleJob, PendingEvent, PendingModule, PendingModuleItem, SyncError,
    SyncPhase, SyncReport, SyncStatus,
};

/// Everything fetched for one course in phase 2.
#[derive(Debug)]
pub struct CourseFetch {
    pub course: Course,
    pub assignments: Result<Vec<RawAssignment>, FetchError>,
    pub modules: Result<Vec<RawModule>, FetchError>,
}

/// Rows to write in the transactional batch, plus the item-fetch jobs.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub events: Vec<PendingEvent>,
    pub modules: Vec<PendingModule>,
    pub jobs: Vec<ModuleJob>,
    pub assignments_dropped: usize,
    pub failed_fetches: usize,
}

/// Runs sync passes against one LMS.
pub struct SyncEngine {
    api: LmsApi,
    settings: SyncConfig,
    clock: fn() -> DateTime<Utc>,
    status: Arc<Mutex<SyncStatus>>,
}

impl SyncEngine {
    pub fn new(api: LmsApi, settings: SyncConfig) -> Self {
        Self {
            api,
            settings,
            clock: Utc::now,
            status: Arc::new(Mutex::new(SyncStatus::default())),
        }
    }

    /// Build the fetch client and engine from configuration.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = FetchClient::new(&config.http)?;
        Ok(Self::new(
            LmsApi::new(client, config.http.page_size),
            config.sync.clone(),
        ))
    }

    /// Replace the wall clock used for the current-year filter.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Get current sync status.
    pub fn status(&self) -> SyncStatus {
        self.lock_status().clone()
    }

    /// Run one full sync for `owner`.
    ///
    /// Isolated fetch failures only lower the created counts. The run fails
    /// when the course listing fails or a write fails; a failed event/module
    /// write leaves no rows from this run behind.
    pub async fn sync<S: SyncStore + ?Sized>(
        &self,
        store: &mut S,
        credential: &Credential,
        owner: &str,
    ) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sync", %run_id, owner, base_url = %credential.base_url);

        let result = self
            .run(store, credential, owner)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        let mut status = self.lock_status();
        status.last_sync_at = Some((self.clock)());
        match &result {
            Ok(report) => {
                tracing::info!(
                    events = report.events_created,
                    modules = report.modules_created,
                    items = report.items_created,
                    failed_fetches = report.failed_fetches,
                    "sync finished"
                );
                status.last_report = Some(report.clone());
            }
            Err(e) => {
                tracing::error!(error = %e, "sync failed");
                status.phase = SyncPhase::Failed;
                status.last_report = None;
            }
        }
        result
    }

    async fn run<S: SyncStore + ?Sized>(
        &self,
        store: &mut S,
        cred: &Credential,
        owner: &str,
    ) -> Result<SyncReport, SyncError> {
        self.enter(SyncPhase::FetchingCourses);
        let courses = self
            .api
            .list_active_courses(cred)
            .await
            .map_err(SyncError::CoursesFetch)?;
        if courses.is_empty() {
            tracing::info!("no active courses");
            self.enter(SyncPhase::NoCourses);
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport {
            courses: courses.len(),
            ..SyncReport::default()
        };

        self.enter(SyncPhase::FetchingCourseData);
        let fetched = self.fetch_course_data(cred, courses).await?;

        self.enter(SyncPhase::Merging);
        let year = (self.clock)().year();
        let plan = plan_batch(owner, year, fetched);
        report.assignments_dropped = plan.assignments_dropped;
        report.failed_fetches = plan.failed_fetches;

        let receipt = store.write_batch(&plan.events, &plan.modules)?;
        report.events_created = receipt.events_created;
        report.modules_created = receipt.modules_created();

        self.enter(SyncPhase::FetchingItems);
        let (resolved, unresolved): (Vec<_>, Vec<_>) = plan
            .jobs
            .into_iter()
            .map(|job| (receipt.module_ids.get(&job.key).copied(), job))
            .partition(|(id, _)| id.is_some());
        for (_, job) in &unresolved {
            tracing::warn!(
                course = %job.course_name,
                module = %job.module_title,
                "no persisted module for job, skipping its items"
            );
        }
        report.unresolved_modules = unresolved.len();

        let resolved = resolved
            .into_iter()
            .filter_map(|(id, job)| id.map(|id| (id, job)));
        let (items, failed) = self.fetch_module_items(cred, resolved).await?;
        report.failed_fetches += failed;

        report.items_created = store.write_module_items(&items)?;

        self.enter(SyncPhase::Done);
        Ok(report)
    }

    async fn fetch_course_data(
        &self,
        cred: &Credential,
        courses: Vec<Course>,
    ) -> Result<Vec<CourseFetch>, SyncError> {
        let jobs = courses.into_iter().enumerate().map(|(idx, course)| {
            let api = self.api.clone();
            let cred = cred.clone();
            async move {
                let (assignments, modules) = tokio::join!(
                    api.list_assignments(&cred, course.remote_id),
                    api.list_modules(&cred, course.remote_id),
                );
                (idx, CourseFetch { course, assignments, modules })
            }
        });

        let mut fetched = run_bounded(self.settings.course_workers, jobs).await?;
        fetched.sort_by_key(|(idx, _)| *idx);
        Ok(fetched.into_iter().map(|(_, f)| f).collect())
    }

    /// Fetch items for resolved jobs; returns the pending items and how many
    /// module fetches failed.
    async fn fetch_module_items(
        &self,
        cred: &Credential,
        resolved: impl Iterator<Item = (i64, ModuleJob)>,
    ) -> Result<(Vec<PendingModuleItem>, usize), SyncError> {
        let jobs = resolved.map(|(module_id, job)| {
            let api = self.api.clone();
            let cred = cred.clone();
            async move {
                let items = api
                    .list_module_items(&cred, job.course_remote_id, job.module_remote_id)
                    .await;
                (job.key, module_id, job, items)
            }
        });

        let mut results = run_bounded(self.settings.item_workers, jobs).await?;
        results.sort_by_key(|(key, ..)| *key);

        let mut pending = Vec::new();
        let mut failed = 0;
        for (_, module_id, job, items) in results {
            match items {
                Ok(items) => pending.extend(items.iter().map(|it| pending_item(module_id, it))),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        course = %job.course_name,
                        module = %job.module_title,
                        error = %e,
                        "module items fetch failed, treating as empty"
                    );
                }
            }
        }
        Ok((pending, failed))
    }

    fn enter(&self, phase: SyncPhase) {
        tracing::debug!(?phase, "sync phase");
        self.lock_status().phase = phase;
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Turn fetched course data into the rows for the transactional batch.
///
/// Assignments survive only with a parseable due date in `year`. Modules are
/// kept unconditionally and numbered with batch keys in course order.
pub fn plan_batch(owner: &str, year: i32, fetched: Vec<CourseFetch>) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut next_key: BatchKey = 0;

    for CourseFetch {
        course,
        assignments,
        modules,
    } in fetched
    {
        match assignments {
            Ok(assignments) => {
                tracing::debug!(course = course.remote_id, count = assignments.len(), "assignments");
                for assignment in &assignments {
                    match pending_event(owner, &course, assignment, year) {
                        Some(event) => plan.events.push(event),
                        None => plan.assignments_dropped += 1,
                    }
                }
            }
            Err(e) => {
                plan.failed_fetches += 1;
                tracing::warn!(course = course.remote_id, error = %e, "assignments fetch failed, treating as empty");
            }
        }

        match modules {
            Ok(modules) => {
                tracing::debug!(course = course.remote_id, count = modules.len(), "modules");
                for module in modules {
                    let key = next_key;
                    next_key += 1;
                    plan.modules.push(PendingModule {
                        key,
                        owner: owner.to_string(),
                        course_name: course.name.clone(),
                        title: module.title().to_string(),
                        description: module.description.clone().unwrap_or_default(),
                    });
                    plan.jobs.push(ModuleJob {
                        key,
                        course_remote_id: course.remote_id,
                        course_name: course.name.clone(),
                        module_remote_id: module.id,
                        module_title: module.title().to_string(),
                    });
                }
            }
            Err(e) => {
                plan.failed_fetches += 1;
                tracing::warn!(course = course.remote_id, error = %e, "modules fetch failed, treating as empty");
            }
        }
    }

    plan
}

/// An assignment as a calendar event, or `None` when its due date is missing,
/// unparseable or outside `year`.
pub fn pending_event(
    owner: &str,
    course: &Course,
    assignment: &RawAssignment,
    year: i32,
) -> Option<PendingEvent> {
    // Year as written by the LMS, before shifting to UTC.
    let written = parse_optional_date(assignment.due_at.as_deref())?;
    if written.year() != year {
        return None;
    }
    let due_at = written.with_timezone(&Utc);
    Some(PendingEvent {
        owner: owner.to_string(),
        title: assignment.title().to_string(),
        description: assignment.description.clone().unwrap_or_default(),
        due_at,
        kind: EventKind::Assignment,
        course_name: course.name.clone(),
        custom: false,
    })
}

fn pending_item(module_id: i64, item: &RawItem) -> PendingModuleItem {
    PendingModuleItem {
        module_id,
        title: item.title().to_string(),
        item_type: item.item_type.clone().unwrap_or_default(),
        external_url: item.external_url.clone().unwrap_or_default(),
        content: item.content.clone().unwrap_or_default(),
    }
}

/// Run futures on the runtime with at most `limit` in flight, collecting
/// outputs in completion order.
pub(super) async fn run_bounded<T, F>(limit: usize, jobs: impl IntoIterator<Item = F>) -> Result<Vec<T>, SyncError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let limit = limit.max(1);
    let mut set = JoinSet::new();
    let mut out = Vec::new();

    for job in jobs {
        while set.len() >= limit {
            match set.join_next().await {
                Some(res) => out.push(res?),
                None => break,
            }
        }
        set.spawn(job);
    }
    while let Some(res) = set.join_next().await {
        out.push(res?);
    }
    Ok(out)
}
