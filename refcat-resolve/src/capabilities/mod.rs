//! Model-backed capabilities
//!
//! The pipeline depends only on these contracts; how a prompt is executed is an
//! implementation detail of [`model_client::ModelClient`] (or of a test stub).
//!
//! Contracts:
//! - [`FieldParser`]: reference text -> [`ParsedFields`]. Malformed list output is
//!   discarded field by field; only a failed call is an error.
//! - [`WorkTypeClassifier`]: reference text -> [`WorkType`], unmapped labels are `Unknown`.
//! - [`MatchComparator`]: reference + simplified candidates -> chosen id or none, plus
//!   rationale. Unparseable output must degrade to none.

pub mod model_client;
pub mod prompts;
pub mod schema;

use crate::types::{CandidateWork, ParsedFields, RawReference, ResolveResult, WorkType};
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait FieldParser: Send + Sync {
    async fn parse(&self, reference: &RawReference) -> ResolveResult<ParsedFields>;
}

#[async_trait]
pub trait WorkTypeClassifier: Send + Sync {
    async fn classify(&self, reference: &RawReference) -> ResolveResult<WorkType>;
}

#[async_trait]
pub trait MatchComparator: Send + Sync {
    async fn compare(&self, request: &ComparisonRequest) -> ResolveResult<ComparisonVerdict>;
}

/// Candidate reduced to what the comparator needs to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimplifiedCandidate {
    pub id: String,
    pub title: String,
    pub publication_year: Option<i32>,
    #[serde(rename = "type")]
    pub work_type: String,
    pub authors: Vec<String>,
}

impl From<&CandidateWork> for SimplifiedCandidate {
    fn from(work: &CandidateWork) -> Self {
        Self {
            id: work.id.clone(),
            title: work.title.clone(),
            publication_year: work.publication_year,
            work_type: work.work_type.clone(),
            authors: work.authors.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// Everything the comparator is shown for one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub reference_text: String,
    pub parsed_title: String,
    pub parsed_year: Option<i32>,
    pub parsed_authors: Vec<String>,
    pub work_type: WorkType,
    pub candidates: Vec<SimplifiedCandidate>,
}

/// Comparator decision: a candidate id, or `None` for "no confident match"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonVerdict {
    pub chosen_id: Option<String>,
    pub rationale: String,
}
