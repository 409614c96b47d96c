//! Resource fetchers for the four LMS endpoints the sync pipeline reads.
//!
//! Every fetcher returns a typed `Result`; deciding whether a failure aborts
//! the run or is swallowed as "no records" is the orchestrator's job.

use crate::credentials::Credential;

use super::client::{FetchClient, FetchError};
use super::records::{decode_courses, decode_records, Course, RawAssignment, RawItem, RawModule};

/// Largest page the LMS honours.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Endpoint builder plus shared [`FetchClient`].
#[derive(Clone)]
pub struct LmsApi {
    client: FetchClient,
    page_size: u32,
}

impl LmsApi {
    pub fn new(client: FetchClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn courses_url(&self, base: &str) -> String {
        format!(
            "{base}/api/v1/courses?enrollment_state=active&per_page={}",
            self.page_size
        )
    }

    pub fn assignments_url(&self, base: &str, course_id: i64) -> String {
        format!(
            "{base}/api/v1/courses/{course_id}/assignments?per_page={}",
            self.page_size
        )
    }

    pub fn modules_url(&self, base: &str, course_id: i64) -> String {
        format!(
            "{base}/api/v1/courses/{course_id}/modules?per_page={}",
            self.page_size
        )
    }

    pub fn module_items_url(&self, base: &str, course_id: i64, module_id: i64) -> String {
        format!("{base}/api/v1/courses/{course_id}/modules/{module_id}/items")
    }

    /// Courses the credential's user is actively enrolled in.
    pub async fn list_active_courses(&self, cred: &Credential) -> Result<Vec<Course>, FetchError> {
        let body = self
            .client
            .get_json(&self.courses_url(&cred.base_url), cred)
            .await?;
        decode_courses(body)
    }

    pub async fn list_assignments(
        &self,
        cred: &Credential,
        course_id: i64,
    ) -> Result<Vec<RawAssignment>, FetchError> {
        let body = self
            .client
            .get_json(&self.assignments_url(&cred.base_url, course_id), cred)
            .await?;
        decode_records(body, "assignments")
    }

    pub async fn list_modules(
        &self,
        cred: &Credential,
        course_id: i64,
    ) -> Result<Vec<RawModule>, FetchError> {
        let body = self
            .client
            .get_json(&self.modules_url(&cred.base_url, course_id), cred)
            .await?;
        decode_records(body, "modules")
    }

    pub async fn list_module_items(
        &self,
        cred: &Credential,
        course_id: i64,
        module_id: i64,
    ) -> Result<Vec<RawItem>, FetchError> {
        let body = self
            .client
            .get_json(&self.module_items_url(&cred.base_url, course_id, module_id), cred)
            .await?;
        decode_records(body, "module items")
    }
}
