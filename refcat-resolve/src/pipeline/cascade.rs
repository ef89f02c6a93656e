//! Primary query cascade
//!
//! Four progressively broader queries against the primary index. A stage runs only
//! when every earlier stage came back empty; the first non-empty list wins.
//!
//! | Stage | Query                                   | Extra filter        | Ranking        |
//! |-------|-----------------------------------------|---------------------|----------------|
//! | 1a    | exact title search                      | work type (if any)  | citations desc |
//! | 1b    | exact title search                      | none                | citations desc |
//! | 2a    | keyword: title + first author last name | year +/- window     | relevance      |
//! | 2b    | keyword: title + first author last name | none                | relevance      |
//!
//! 1b is planned only when 1a carried a type filter, 2b only when 2a carried a year
//! window; otherwise they would repeat the previous query. Stage failures are logged,
//! recorded and treated as empty results.

use crate::sources::{PrimaryIndex, WorkQuery, YearWindow};
use crate::text::{last_name_token, normalize_title};
use crate::types::{CandidateWork, WorkType};
use refcat_common::config::PrimaryIndexConfig;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CascadeStage {
    #[serde(rename = "1a")]
    TitleWithType,
    #[serde(rename = "1b")]
    TitleOnly,
    #[serde(rename = "2a")]
    KeywordWithYear,
    #[serde(rename = "2b")]
    KeywordOnly,
}

impl CascadeStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::TitleWithType => "1a",
            Self::TitleOnly => "1b",
            Self::KeywordWithYear => "2a",
            Self::KeywordOnly => "2b",
        }
    }
}

impl fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the cascade produced for one reference
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    /// Raw, unfiltered candidates of the first non-empty stage
    pub candidates: Vec<CandidateWork>,
    /// Stage that produced `candidates`
    pub stage: Option<CascadeStage>,
    /// Stages actually executed, in order
    pub stages_run: Vec<CascadeStage>,
    /// Caught stage failures
    pub errors: Vec<String>,
}

pub struct QueryCascade {
    index: Arc<dyn PrimaryIndex>,
    per_page: u32,
    year_window: i32,
}

impl QueryCascade {
    pub fn new(index: Arc<dyn PrimaryIndex>, config: &PrimaryIndexConfig) -> Self {
        Self {
            index,
            per_page: config.per_page,
            year_window: config.year_window,
        }
    }

    /// Build the ordered stage queries for one reference
    ///
    /// Empty when the title normalizes to nothing (no query can be formed).
    pub fn plan(
        &self,
        title: &str,
        year: Option<i32>,
        first_author: Option<&str>,
        work_type: WorkType,
    ) -> Vec<(CascadeStage, WorkQuery)> {
        let clean_title = normalize_title(title);
        if clean_title.is_empty() {
            return Vec::new();
        }

        let type_filter = Some(work_type).filter(|t| t.is_known());
        let title_query = WorkQuery {
            title_search: Some(clean_title.clone()),
            search: None,
            work_type: type_filter,
            year_window: None,
            sort_by_citations: true,
            per_page: self.per_page,
        };

        let mut stages = vec![(CascadeStage::TitleWithType, title_query.clone())];
        if type_filter.is_some() {
            stages.push((
                CascadeStage::TitleOnly,
                WorkQuery {
                    work_type: None,
                    ..title_query
                },
            ));
        }

        let search = match first_author.and_then(last_name_token) {
            Some(last_name) => format!("{} {}", clean_title, last_name),
            None => clean_title,
        };
        let keyword_query = WorkQuery {
            title_search: None,
            search: Some(search),
            work_type: None,
            year_window: year.map(|y| YearWindow::around(y, self.year_window)),
            sort_by_citations: false,
            per_page: self.per_page,
        };

        let has_window = keyword_query.year_window.is_some();
        stages.push((CascadeStage::KeywordWithYear, keyword_query.clone()));
        if has_window {
            stages.push((
                CascadeStage::KeywordOnly,
                WorkQuery {
                    year_window: None,
                    ..keyword_query
                },
            ));
        }

        stages
    }

    /// Execute the cascade, short-circuiting on the first non-empty stage
    ///
    /// Never fails: failures are logged, recorded in `errors` and count as empty.
    pub async fn run(
        &self,
        title: &str,
        year: Option<i32>,
        first_author: Option<&str>,
        work_type: WorkType,
    ) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();

        for (stage, query) in self.plan(title, year, first_author, work_type) {
            outcome.stages_run.push(stage);
            debug!(stage = %stage, ?query, "Running primary index stage");

            match self.index.search_works(&query).await {
                Ok(candidates) if !candidates.is_empty() => {
                    info!(
                        stage = %stage,
                        count = candidates.len(),
                        "{} stage returned candidates",
                        self.index.name()
                    );
                    outcome.candidates = candidates;
                    outcome.stage = Some(stage);
                    return outcome;
                }
                Ok(_) => {
                    debug!(stage = %stage, "Stage returned no candidates");
                }
                Err(e) => {
                    warn!(stage = %stage, "{} stage failed: {}", self.index.name(), e);
                    outcome
                        .errors
                        .push(format!("{} stage {} failed: {}", self.index.name(), stage, e));
                }
            }
        }

        info!(stages = outcome.stages_run.len(), "Primary cascade found no candidates");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResolveError, ResolveResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays one scripted response per call and records every query
    struct ScriptedIndex {
        responses: Mutex<Vec<ResolveResult<Vec<CandidateWork>>>>,
        queries: Mutex<Vec<WorkQuery>>,
    }

    impl ScriptedIndex {
        fn new(mut responses: Vec<ResolveResult<Vec<CandidateWork>>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<WorkQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PrimaryIndex for ScriptedIndex {
        fn name(&self) -> &'static str {
            "Scripted"
        }

        async fn search_works(&self, query: &WorkQuery) -> ResolveResult<Vec<CandidateWork>> {
            self.queries.lock().unwrap().push(query.clone());
            self.responses.lock().unwrap().pop().unwrap_or(Ok(Vec::new()))
        }
    }

    fn work(id: &str) -> CandidateWork {
        CandidateWork {
            id: id.to_string(),
            title: "Some Title".to_string(),
            ..Default::default()
        }
    }

    fn cascade(index: Arc<ScriptedIndex>) -> QueryCascade {
        QueryCascade::new(index, &PrimaryIndexConfig::default())
    }

    #[tokio::test]
    async fn test_stage_1a_hit_short_circuits() {
        let index = ScriptedIndex::new(vec![Ok(vec![work("W1")])]);

        let outcome = cascade(index.clone())
            .run("Some Title", Some(1979), Some("J. Hill"), WorkType::Book)
            .await;

        assert_eq!(index.queries().len(), 1, "1b/2a/2b must not run");
        assert_eq!(outcome.stage, Some(CascadeStage::TitleWithType));
        assert_eq!(outcome.candidates[0].id, "W1");
    }

    #[tokio::test]
    async fn test_falls_through_to_year_window_stage() {
        let index = ScriptedIndex::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![work("W1")])]);

        let outcome = cascade(index.clone())
            .run("Some Title", Some(1979), Some("J. Hill"), WorkType::Book)
            .await;

        let queries = index.queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1].work_type, None, "1b drops the type filter");
        assert_eq!(queries[2].search.as_deref(), Some("Some Title Hill"));
        assert_eq!(queries[2].year_window, Some(YearWindow { from: 1976, to: 1982 }));
        assert_eq!(outcome.stage, Some(CascadeStage::KeywordWithYear));
        assert_eq!(
            outcome.stages_run,
            vec![
                CascadeStage::TitleWithType,
                CascadeStage::TitleOnly,
                CascadeStage::KeywordWithYear
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_count_as_empty() {
        let index = ScriptedIndex::new(vec![
            Err(ResolveError::Source("timeout".to_string())),
            Ok(vec![]),
            Err(ResolveError::Source("502".to_string())),
            Ok(vec![work("W9")]),
        ]);

        let outcome = cascade(index.clone())
            .run("Some Title", Some(2001), None, WorkType::JournalArticle)
            .await;

        assert_eq!(index.queries().len(), 4);
        assert_eq!(outcome.stage, Some(CascadeStage::KeywordOnly));
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("stage 1a"));
    }

    #[tokio::test]
    async fn test_all_empty_yields_empty_list() {
        let index = ScriptedIndex::new(vec![]);

        let outcome = cascade(index.clone())
            .run("Some Title", Some(2001), Some("A. B"), WorkType::Book)
            .await;

        assert_eq!(index.queries().len(), 4);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.stage, None);
    }

    #[test]
    fn test_plan_skips_redundant_stages() {
        let index = ScriptedIndex::new(vec![]);
        let plan = cascade(index).plan("Some Title", None, None, WorkType::Unknown);

        let stages: Vec<_> = plan.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![CascadeStage::TitleWithType, CascadeStage::KeywordWithYear]);
        assert_eq!(plan[0].1.work_type, None);
        assert_eq!(plan[1].1.search.as_deref(), Some("Some Title"));
        assert_eq!(plan[1].1.year_window, None);
    }

    #[test]
    fn test_plan_empty_for_blank_title() {
        let index = ScriptedIndex::new(vec![]);
        assert!(cascade(index).plan(" -- ", Some(1990), None, WorkType::Book).is_empty());
    }

    #[test]
    fn test_plan_normalizes_title() {
        let index = ScriptedIndex::new(vec![]);
        let plan = cascade(index).plan("Some Title: A Study!", None, None, WorkType::Book);
        assert_eq!(plan[0].1.title_search.as_deref(), Some("Some Title A Study"));
        assert!(plan[0].1.sort_by_citations);
    }
}
