//! Bibliographic index clients
//!
//! Each index is reached through a trait so the cascade and fallback can be driven
//! by stubs in tests. Implementations report failures as errors; whether a failure
//! is swallowed is decided by the calling stage, not the client.

pub mod openalex;
pub mod semantic_scholar;

use crate::types::{CandidateWork, ResolveResult, SecondaryPaper, WorkType};
use async_trait::async_trait;

/// Inclusive publication-year range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub from: i32,
    pub to: i32,
}

impl YearWindow {
    pub fn around(year: i32, half_width: i32) -> Self {
        Self {
            from: year - half_width,
            to: year + half_width,
        }
    }
}

/// One query against the primary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkQuery {
    /// Exact title search (filter expression)
    pub title_search: Option<String>,
    /// Broad keyword search
    pub search: Option<String>,
    pub work_type: Option<WorkType>,
    pub year_window: Option<YearWindow>,
    /// Rank by descending citation count
    pub sort_by_citations: bool,
    pub per_page: u32,
}

#[async_trait]
pub trait PrimaryIndex: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ranked candidate list; empty when nothing matched
    async fn search_works(&self, query: &WorkQuery) -> ResolveResult<Vec<CandidateWork>>;
}

/// One query against the secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuery {
    pub query: String,
    pub year: Option<i32>,
    pub limit: u32,
}

#[async_trait]
pub trait SecondaryIndex: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ranked paper list
    ///
    /// # Errors
    /// `ResolveError::RateLimited` when the index asks the caller to back off,
    /// `ResolveError::Source` for any other failure.
    async fn search_papers(&self, query: &PaperQuery) -> ResolveResult<Vec<SecondaryPaper>>;
}
