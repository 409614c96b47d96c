//! Wire records returned by the LMS.
//!
//! Only the fields the sync pipeline reads are modelled. Display strings are
//! optional on the wire; accessors supply the fallbacks.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::client::FetchError;

pub const UNKNOWN_COURSE: &str = "Unknown Course";
pub const UNTITLED_ASSIGNMENT: &str = "Untitled Assignment";
pub const UNTITLED_MODULE: &str = "Untitled Module";
pub const UNTITLED_ITEM: &str = "Untitled Item";

/// An active course. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub remote_id: i64,
    pub name: String,
}

#[derive(Deserialize)]
struct CourseWire {
    id: i64,
    #[serde(default)]
    name: Option<String>,
}

impl From<CourseWire> for Course {
    fn from(wire: CourseWire) -> Self {
        Self {
            remote_id: wire.id,
            name: wire.name.unwrap_or_else(|| UNKNOWN_COURSE.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAssignment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawAssignment {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(UNTITLED_ASSIGNMENT)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawModule {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawModule {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(UNTITLED_MODULE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl RawItem {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED_ITEM)
    }
}

/// Decode a JSON array element by element.
///
/// Elements that do not match `T` are dropped with a warning so one odd record
/// cannot hide the rest of the page.
pub(crate) fn decode_records<T: DeserializeOwned>(
    body: Value,
    resource: &'static str,
) -> Result<Vec<T>, FetchError> {
    let Value::Array(elements) = body else {
        return Err(FetchError::Decode(format!("{resource}: expected a JSON array")));
    };

    let mut records = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value(element) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(resource, index, error = %e, "skipping malformed record"),
        }
    }
    Ok(records)
}

pub(crate) fn decode_courses(body: Value) -> Result<Vec<Course>, FetchError> {
    Ok(decode_records::<CourseWire>(body, "courses")?
        .into_iter()
        .map(Course::from)
        .collect())
}
