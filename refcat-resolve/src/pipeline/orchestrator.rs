//! Per-reference orchestration
//!
//! parse -> classify -> primary cascade -> select -> (secondary fallback) -> merge
//!
//! Every reference is resolved inside its own fault boundary: an error or panic
//! anywhere in its pipeline becomes a degraded record and the batch moves on. Output
//! order always equals input order, in sequential and in concurrent mode.

use super::cascade::QueryCascade;
use super::fallback::{FallbackOutcome, SecondaryFallback};
use super::merger::{FieldMerger, MergeInput};
use super::selector::CandidateSelector;
use crate::capabilities::{FieldParser, MatchComparator, WorkTypeClassifier};
use crate::events::{ProgressBroadcaster, ResolutionEvent};
use crate::sources::{PrimaryIndex, SecondaryIndex};
use crate::types::{
    RawReference, ReferenceRecord, ResolutionStatus, ResolveError, ResolveResult, WorkType,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use refcat_common::config::TomlConfig;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// External collaborators the resolver is built from
#[derive(Clone)]
pub struct ResolverComponents {
    pub parser: Arc<dyn FieldParser>,
    pub classifier: Arc<dyn WorkTypeClassifier>,
    pub comparator: Arc<dyn MatchComparator>,
    pub primary: Arc<dyn PrimaryIndex>,
    pub secondary: Arc<dyn SecondaryIndex>,
}

/// Per-status tallies for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub matched: usize,
    pub fallback_filled: usize,
    pub unmatched: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally(records: &[ReferenceRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                ResolutionStatus::Matched => counts.matched += 1,
                ResolutionStatus::FallbackFilled => counts.fallback_filled += 1,
                ResolutionStatus::Unmatched => counts.unmatched += 1,
                ResolutionStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// Output of one batch run, records in input order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<ReferenceRecord>,
    pub counts: StatusCounts,
}

pub struct ReferenceResolver {
    parser: Arc<dyn FieldParser>,
    classifier: Arc<dyn WorkTypeClassifier>,
    cascade: QueryCascade,
    selector: CandidateSelector,
    fallback: SecondaryFallback,
    merger: FieldMerger,
    concurrency: usize,
    events: Option<ProgressBroadcaster>,
}

impl ReferenceResolver {
    pub fn new(components: ResolverComponents, config: &TomlConfig) -> Self {
        Self {
            parser: components.parser,
            classifier: components.classifier,
            cascade: QueryCascade::new(components.primary, &config.primary_index),
            selector: CandidateSelector::new(components.comparator),
            fallback: SecondaryFallback::new(components.secondary, &config.secondary_index),
            merger: FieldMerger::new(&config.pipeline),
            concurrency: config.pipeline.concurrency.max(1),
            events: None,
        }
    }

    pub fn with_events(mut self, events: ProgressBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    /// Resolve all references; exactly one record per input, in input order
    pub async fn resolve_batch(&self, references: &[RawReference]) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %run_id,
            total = references.len(),
            concurrency = self.concurrency,
            "Starting reference batch"
        );
        self.emit(ResolutionEvent::BatchStarted {
            run_id,
            total: references.len(),
        });

        let records: Vec<ReferenceRecord> = if self.concurrency <= 1 {
            let mut records = Vec::with_capacity(references.len());
            for (index, reference) in references.iter().enumerate() {
                records.push(self.resolve_one(index, reference).await);
            }
            records
        } else {
            // `buffered` yields in submission order whatever the completion order
            stream::iter(references.iter().enumerate())
                .map(|(index, reference)| self.resolve_one(index, reference))
                .buffered(self.concurrency)
                .collect()
                .await
        };

        let finished_at = Utc::now();
        let counts = StatusCounts::tally(&records);
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        info!(
            %run_id,
            matched = counts.matched,
            fallback_filled = counts.fallback_filled,
            unmatched = counts.unmatched,
            failed = counts.failed,
            duration_ms,
            "Reference batch complete"
        );
        self.emit(ResolutionEvent::BatchCompleted {
            run_id,
            total: records.len(),
            failed: counts.failed,
            duration_ms,
        });

        BatchReport {
            run_id,
            started_at,
            finished_at,
            records,
            counts,
        }
    }

    /// Resolve one reference inside its fault boundary; never fails
    pub async fn resolve_one(&self, index: usize, reference: &RawReference) -> ReferenceRecord {
        let trace_id = Uuid::new_v4();
        let span = info_span!("reference", index, %trace_id);

        async move {
            self.emit(ResolutionEvent::ReferenceStarted { index, trace_id });

            let outcome = AssertUnwindSafe(self.resolve_inner(index, reference))
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(record)) => {
                    info!(status = ?record.status, "Reference resolved");
                    self.emit(ResolutionEvent::ReferenceCompleted {
                        index,
                        status: record.status,
                    });
                    return record;
                }
                Ok(Err(e)) => e,
                Err(panic) => {
                    ResolveError::Processing(format!("panic: {}", panic_message(panic.as_ref())))
                }
            };

            error!("Reference pipeline failed: {}", failure);
            self.emit(ResolutionEvent::ReferenceFailed {
                index,
                error: failure.to_string(),
            });
            self.merger.degraded(reference, &failure.to_string())
        }
        .instrument(span)
        .await
    }

    async fn resolve_inner(
        &self,
        index: usize,
        reference: &RawReference,
    ) -> ResolveResult<ReferenceRecord> {
        let parsed = self.parser.parse(reference).await?;
        let mut errors = Vec::new();

        let work_type = match self.classifier.classify(reference).await {
            Ok(work_type) => work_type,
            Err(e) => {
                warn!("Work type classification failed: {}", e);
                errors.push(format!("classifier: {}", e));
                WorkType::Unknown
            }
        };

        let cascade = self
            .cascade
            .run(&parsed.title, parsed.year, parsed.first_author_name(), work_type)
            .await;
        errors.extend(cascade.errors.iter().cloned());
        self.emit(ResolutionEvent::CandidatesFound {
            index,
            stage: cascade.stage.map(|s| s.label().to_string()),
            count: cascade.candidates.len(),
        });

        let selection = self
            .selector
            .select(reference, &parsed, work_type, &cascade.candidates)
            .await;
        errors.extend(selection.error.clone());

        let fallback = match selection.result.chosen_id() {
            Some(work_id) => {
                self.emit(ResolutionEvent::MatchSelected {
                    index,
                    work_id: work_id.to_string(),
                });
                None
            }
            None => {
                let report = self.fallback.lookup(&parsed.title, parsed.year).await;
                errors.extend(report.errors.iter().cloned());
                self.emit(ResolutionEvent::FallbackUsed {
                    index,
                    found: matches!(report.outcome, FallbackOutcome::Found(_)),
                });
                Some(report)
            }
        };

        Ok(self.merger.merge(MergeInput {
            reference,
            parsed: &parsed,
            selection: &selection.result,
            fallback: fallback.as_ref(),
            errors: &errors,
        }))
    }

    fn emit(&self, event: ResolutionEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
