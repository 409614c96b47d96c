//! Remote LMS access: a pooled HTTP fetch client and the resource fetchers
//! built on top of it (courses, assignments, modules, module items).

pub mod client;
pub mod fetchers;
pub mod records;

pub use client::{FetchClient, FetchError};
pub use fetchers::LmsApi;
pub use records::{Course, RawAssignment, RawItem, RawModule};
