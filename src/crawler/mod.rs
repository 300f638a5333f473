//! Crawler module for catalog traversal
//!
//! This module contains the core crawling logic, including:
//! - Catalog transport and typed request parameters
//! - Retry with exponential backoff
//! - Admission control for concurrent runs
//! - Overall traversal coordination

mod coordinator;
pub(crate) mod fetcher;
mod retry;
mod scheduler;

pub use coordinator::{Crawler, FetchMode, Lookup, RunOutcome};
pub use fetcher::{
    build_http_client, CatalogClient, ReqwestCatalogClient, RequestParams, RequestTarget,
    SearchQuery,
};
pub use retry::{get_with_retry, Backoff};
pub use scheduler::{AdmissionGate, ScheduledFetch, Scheduler};
