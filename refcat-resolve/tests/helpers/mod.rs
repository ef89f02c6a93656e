//! Test helper utilities
//!
//! Closure-driven stubs for every collaborator of the resolver. Each stub counts its
//! calls so tests can assert which stages ran.

#![allow(dead_code)]

use async_trait::async_trait;
use refcat_common::config::TomlConfig;
use refcat_resolve::capabilities::{
    ComparisonRequest, ComparisonVerdict, FieldParser, MatchComparator, WorkTypeClassifier,
};
use refcat_resolve::sources::{PaperQuery, PrimaryIndex, SecondaryIndex, WorkQuery};
use refcat_resolve::types::{
    CandidateAuthor, CandidateWork, ParsedFields, RawReference, ResolveResult, SecondaryPaper,
    WorkType,
};
use refcat_resolve::{ReferenceResolver, ResolverComponents};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ParseFn = dyn Fn(&RawReference) -> ResolveResult<ParsedFields> + Send + Sync;
type DelayFn = dyn Fn(&RawReference) -> Duration + Send + Sync;
type CompareFn = dyn Fn(&ComparisonRequest) -> ResolveResult<ComparisonVerdict> + Send + Sync;
type WorksFn = dyn Fn(&WorkQuery) -> ResolveResult<Vec<CandidateWork>> + Send + Sync;
type PapersFn = dyn Fn(&PaperQuery) -> ResolveResult<Vec<SecondaryPaper>> + Send + Sync;

// ============================================================================
// Capability stubs
// ============================================================================

pub struct StubParser {
    respond: Box<ParseFn>,
    delay: Box<DelayFn>,
    pub calls: AtomicUsize,
}

impl StubParser {
    pub fn new(
        respond: impl Fn(&RawReference) -> ResolveResult<ParsedFields> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(
        respond: impl Fn(&RawReference) -> ResolveResult<ParsedFields> + Send + Sync + 'static,
        delay: impl Fn(&RawReference) -> Duration + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: Box::new(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FieldParser for StubParser {
    async fn parse(&self, reference: &RawReference) -> ResolveResult<ParsedFields> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = (self.delay)(reference);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(reference)
    }
}

pub struct StubClassifier {
    work_type: WorkType,
    pub calls: AtomicUsize,
}

impl StubClassifier {
    pub fn returning(work_type: WorkType) -> Arc<Self> {
        Arc::new(Self {
            work_type,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WorkTypeClassifier for StubClassifier {
    async fn classify(&self, _reference: &RawReference) -> ResolveResult<WorkType> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.work_type)
    }
}

pub struct StubComparator {
    respond: Box<CompareFn>,
    pub requests: Mutex<Vec<ComparisonRequest>>,
}

impl StubComparator {
    pub fn new(
        respond: impl Fn(&ComparisonRequest) -> ResolveResult<ComparisonVerdict>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always picks the first offered candidate
    pub fn first_candidate() -> Arc<Self> {
        Self::new(|request| {
            Ok(ComparisonVerdict {
                chosen_id: request.candidates.first().map(|c| c.id.clone()),
                rationale: "title matches".to_string(),
            })
        })
    }

    /// Never confident
    pub fn never() -> Arc<Self> {
        Self::new(|_| {
            Ok(ComparisonVerdict {
                chosen_id: None,
                rationale: "no candidate matches the title".to_string(),
            })
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MatchComparator for StubComparator {
    async fn compare(&self, request: &ComparisonRequest) -> ResolveResult<ComparisonVerdict> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

// ============================================================================
// Index stubs
// ============================================================================

pub struct StubPrimary {
    respond: Box<WorksFn>,
    pub queries: Mutex<Vec<WorkQuery>>,
}

impl StubPrimary {
    pub fn new(
        respond: impl Fn(&WorkQuery) -> ResolveResult<Vec<CandidateWork>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl PrimaryIndex for StubPrimary {
    fn name(&self) -> &'static str {
        "StubPrimary"
    }

    async fn search_works(&self, query: &WorkQuery) -> ResolveResult<Vec<CandidateWork>> {
        self.queries.lock().unwrap().push(query.clone());
        (self.respond)(query)
    }
}

pub struct StubSecondary {
    respond: Box<PapersFn>,
    pub queries: Mutex<Vec<PaperQuery>>,
}

impl StubSecondary {
    pub fn new(
        respond: impl Fn(&PaperQuery) -> ResolveResult<Vec<SecondaryPaper>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SecondaryIndex for StubSecondary {
    fn name(&self) -> &'static str {
        "StubSecondary"
    }

    async fn search_papers(&self, query: &PaperQuery) -> ResolveResult<Vec<SecondaryPaper>> {
        self.queries.lock().unwrap().push(query.clone());
        (self.respond)(query)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Default config with zero backoff so rate-limit tests do not sleep
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.secondary_index.base_delay_ms_with_key = 0;
    config.secondary_index.base_delay_ms_without_key = 0;
    config
}

pub fn resolver(
    parser: Arc<StubParser>,
    classifier: Arc<StubClassifier>,
    comparator: Arc<StubComparator>,
    primary: Arc<StubPrimary>,
    secondary: Arc<StubSecondary>,
    config: &TomlConfig,
) -> ReferenceResolver {
    ReferenceResolver::new(
        ResolverComponents {
            parser,
            classifier,
            comparator,
            primary,
            secondary,
        },
        config,
    )
}

pub fn author(name: &str, affiliations: &[&str]) -> CandidateAuthor {
    CandidateAuthor {
        name: name.to_string(),
        affiliations: affiliations.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn work(id: &str, title: &str, year: i32, authors: Vec<CandidateAuthor>) -> CandidateWork {
    CandidateWork {
        id: id.to_string(),
        title: title.to_string(),
        publication_year: Some(year),
        work_type: "book".to_string(),
        authors,
    }
}

pub fn paper(id: &str, title: &str, authors: Vec<CandidateAuthor>) -> SecondaryPaper {
    SecondaryPaper {
        paper_id: Some(id.to_string()),
        title: title.to_string(),
        year: None,
        authors,
    }
}

pub fn parsed(title: &str, year: Option<i32>, authors: &[&str]) -> ParsedFields {
    ParsedFields {
        title: title.to_string(),
        year,
        authors: authors.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}
