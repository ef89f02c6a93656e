//! Secondary index fallback
//!
//! Single low-confidence lookup used only when no primary candidate was chosen.
//! The first returned paper is accepted as-is.
//!
//! Retry policy:
//! - rate limited: retry with delay `base * attempt` until `max_attempts` requests were made
//! - zero results with a year filter: one more query without the year
//! - any other failure: counts as zero results

use crate::sources::{PaperQuery, SecondaryIndex};
use crate::text::normalize_title;
use crate::types::{ResolveError, SecondaryPaper};
use refcat_common::config::SecondaryIndexConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Highest-ranked paper
    Found(SecondaryPaper),
    NoResults,
    /// Still rate limited after the last attempt
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReport {
    pub outcome: FallbackOutcome,
    /// Caught non-rate-limit failures
    pub errors: Vec<String>,
    /// Requests actually sent
    pub requests: u32,
}

impl FallbackReport {
    pub fn paper(&self) -> Option<&SecondaryPaper> {
        match &self.outcome {
            FallbackOutcome::Found(paper) => Some(paper),
            _ => None,
        }
    }
}

/// Result of one query after rate-limit retries
enum Attempt {
    Papers(Vec<SecondaryPaper>),
    RateLimited,
}

pub struct SecondaryFallback {
    index: Arc<dyn SecondaryIndex>,
    limit: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl SecondaryFallback {
    pub fn new(index: Arc<dyn SecondaryIndex>, config: &SecondaryIndexConfig) -> Self {
        Self {
            index,
            limit: config.per_page,
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms()),
        }
    }

    /// Override the backoff unit (tests use a zero delay)
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub async fn lookup(&self, title: &str, year: Option<i32>) -> FallbackReport {
        let mut report = FallbackReport {
            outcome: FallbackOutcome::NoResults,
            errors: Vec::new(),
            requests: 0,
        };

        let query = normalize_title(title);
        if query.is_empty() {
            debug!("Blank title, secondary lookup skipped");
            return report;
        }

        let mut attempt = self.query_with_retry(&query, year, &mut report).await;

        if year.is_some() && matches!(&attempt, Attempt::Papers(papers) if papers.is_empty()) {
            debug!("No year-qualified results, retrying without year");
            attempt = self.query_with_retry(&query, None, &mut report).await;
        }

        report.outcome = match attempt {
            Attempt::RateLimited => FallbackOutcome::RateLimited,
            Attempt::Papers(papers) => match papers.into_iter().next() {
                Some(paper) => {
                    info!(paper_id = ?paper.paper_id, "{} fallback hit", self.index.name());
                    FallbackOutcome::Found(paper)
                }
                None => FallbackOutcome::NoResults,
            },
        };
        report
    }

    async fn query_with_retry(
        &self,
        query: &str,
        year: Option<i32>,
        report: &mut FallbackReport,
    ) -> Attempt {
        let paper_query = PaperQuery {
            query: query.to_string(),
            year,
            limit: self.limit,
        };

        let mut attempt = 1;
        loop {
            report.requests += 1;
            match self.index.search_papers(&paper_query).await {
                Ok(papers) => return Attempt::Papers(papers),
                Err(ResolveError::RateLimited(msg)) => {
                    if attempt >= self.max_attempts {
                        warn!(attempt, "{} still rate limited, giving up: {}", self.index.name(), msg);
                        return Attempt::RateLimited;
                    }
                    let delay = self.base_delay * attempt;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "{} rate limited, backing off",
                        self.index.name()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("{} query failed: {}", self.index.name(), e);
                    report.errors.push(format!("{}: {}", self.index.name(), e));
                    return Attempt::Papers(Vec::new());
                }
            }
        }
    }
}
