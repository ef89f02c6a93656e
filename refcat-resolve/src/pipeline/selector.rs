//! Candidate selection
//!
//! Hands the raw cascade candidates to the semantic comparator and trusts its verdict.
//! The only checks applied afterwards are structural: the chosen id must name one of
//! the candidates that were shown.

use crate::capabilities::{ComparisonRequest, MatchComparator, SimplifiedCandidate};
use crate::types::{CandidateWork, MatchResult, ParsedFields, RawReference, WorkType};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rationale used when the comparator is never consulted
pub const NO_CANDIDATES_RATIONALE: &str = "no candidates from primary index";

/// Selector output
///
/// A comparator failure still yields a (none) result; the failure text is reported
/// separately so it can be appended to the record notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub result: MatchResult,
    pub error: Option<String>,
}

pub struct CandidateSelector {
    comparator: Arc<dyn MatchComparator>,
}

impl CandidateSelector {
    pub fn new(comparator: Arc<dyn MatchComparator>) -> Self {
        Self { comparator }
    }

    pub async fn select(
        &self,
        reference: &RawReference,
        parsed: &ParsedFields,
        work_type: WorkType,
        candidates: &[CandidateWork],
    ) -> Selection {
        if candidates.is_empty() {
            debug!("No candidates, comparator skipped");
            return Selection {
                result: MatchResult::none(NO_CANDIDATES_RATIONALE),
                error: None,
            };
        }

        let request = ComparisonRequest {
            reference_text: reference.as_str().to_string(),
            parsed_title: parsed.title.clone(),
            parsed_year: parsed.year,
            parsed_authors: parsed.authors.clone(),
            work_type,
            candidates: candidates.iter().map(SimplifiedCandidate::from).collect(),
        };

        let verdict = match self.comparator.compare(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Comparator failed: {}", e);
                return Selection {
                    result: MatchResult::none("comparison unavailable"),
                    error: Some(format!("comparator: {}", e)),
                };
            }
        };

        let chosen = match verdict.chosen_id.as_deref() {
            Some(id) => {
                let found = find_candidate(candidates, id);
                if found.is_none() {
                    warn!(chosen_id = %id, "Comparator chose an id that was not offered");
                }
                found.cloned()
            }
            None => None,
        };

        debug!(chosen = ?chosen.as_ref().map(|c| &c.id), "Selection complete");

        Selection {
            result: MatchResult {
                chosen,
                rationale: verdict.rationale,
            },
            error: None,
        }
    }
}

/// Match an id exactly, or by its final path segment
fn find_candidate<'a>(candidates: &'a [CandidateWork], id: &str) -> Option<&'a CandidateWork> {
    let id = id.trim();
    candidates
        .iter()
        .find(|c| c.id == id)
        .or_else(|| {
            let wanted = last_segment(id);
            candidates.iter().find(|c| last_segment(&c.id) == wanted)
        })
}

fn last_segment(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}
