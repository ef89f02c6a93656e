//! Field merge engine
//!
//! Builds the final record from up to three sources under a fixed precedence:
//!
//! 1. primary match (authorships of the chosen candidate)
//! 2. parsed fields (author list positions plus positional affiliation data)
//! 3. secondary fallback paper
//!
//! A source only fills a field that every higher source left empty. Fields are filled
//! whole: once an author has any affiliations, lower sources add none.
//!
//! Emails follow their own rule: explicit positional emails go to that position,
//! every other observed email (parser output plus addresses found in the raw text)
//! goes to the first author when one is named, else to the last author.

use super::fallback::{FallbackOutcome, FallbackReport};
use crate::text::{push_unique, scan_emails, synthesize_title};
use crate::types::{
    AuthorRecord, CandidateAuthor, MatchResult, Notes, ParsedFields, RawReference,
    ReferenceRecord, ResolutionStatus,
};
use refcat_common::config::PipelineConfig;
use tracing::debug;

pub const NO_MATCH_NOTE: &str = "no confident match";
pub const FALLBACK_FILLED_NOTE: &str = "filled from secondary fallback";
pub const FALLBACK_EMPTY_NOTE: &str = "secondary fallback: no results";
pub const FALLBACK_RATE_LIMITED_NOTE: &str = "secondary fallback: rate limited";
pub const FALLBACK_UNUSED_NOTE: &str = "secondary fallback: nothing to fill";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    First,
    Last,
}

/// Everything the merge reads for one reference
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    pub reference: &'a RawReference,
    pub parsed: &'a ParsedFields,
    pub selection: &'a MatchResult,
    /// Present only when the fallback ran
    pub fallback: Option<&'a FallbackReport>,
    /// Caught failures from earlier stages, in processing order
    pub errors: &'a [String],
}

pub struct FieldMerger {
    title_prefix_chars: usize,
    truncation_marker: String,
}

impl FieldMerger {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            title_prefix_chars: config.title_prefix_chars,
            truncation_marker: config.truncation_marker.clone(),
        }
    }

    pub fn merge(&self, input: MergeInput<'_>) -> ReferenceRecord {
        let parsed = input.parsed;
        let primary = input.selection.chosen.as_ref();
        let secondary = input.fallback.and_then(FallbackReport::paper);

        let mut first = AuthorRecord::default();
        let mut last = AuthorRecord::default();

        if let Some(work) = primary {
            fill_author(&mut first, work.authors.first());
            fill_author(&mut last, work.authors.last());
        }

        fill_from_parsed(&mut first, parsed, Position::First);
        fill_from_parsed(&mut last, parsed, Position::Last);

        let mut secondary_filled = false;
        if let Some(paper) = secondary {
            secondary_filled |= fill_author(&mut first, paper.authors.first());
            secondary_filled |= fill_author(&mut last, paper.authors.last());
        }

        // Name guarantee: any parsed author means non-empty names on both sides
        if first.name.is_empty() {
            first.name = parsed.first_author_name().unwrap_or_default().trim().to_string();
        }
        if last.name.is_empty() {
            last.name = parsed.last_author_name().unwrap_or_default().trim().to_string();
        }

        attribute_emails(&mut first, &mut last, input.reference, parsed);

        let title = match parsed.title.trim() {
            "" => synthesize_title(
                input.reference.as_str(),
                self.title_prefix_chars,
                &self.truncation_marker,
            ),
            title => title.to_string(),
        };

        let mut notes = Notes::default();
        match input.selection.chosen_id() {
            Some(id) => notes.push(format!("matched to {}", id)),
            None => notes.push(NO_MATCH_NOTE),
        }
        notes.push(input.selection.rationale.clone());
        if let Some(report) = input.fallback {
            notes.push(match &report.outcome {
                FallbackOutcome::Found(_) if secondary_filled => FALLBACK_FILLED_NOTE,
                FallbackOutcome::Found(_) => FALLBACK_UNUSED_NOTE,
                FallbackOutcome::NoResults => FALLBACK_EMPTY_NOTE,
                FallbackOutcome::RateLimited => FALLBACK_RATE_LIMITED_NOTE,
            });
        }
        if !parsed.malformed.is_empty() {
            notes.push(format!("malformed parser output: {}", parsed.malformed.join(", ")));
        }
        for error in input.errors {
            notes.push(error.clone());
        }

        let status = if primary.is_some() {
            ResolutionStatus::Matched
        } else if secondary_filled {
            ResolutionStatus::FallbackFilled
        } else {
            ResolutionStatus::Unmatched
        };

        debug!(?status, "Record merged");

        ReferenceRecord {
            title,
            year: parsed.year,
            first_author: first,
            last_author: last,
            reference_raw: input.reference.as_str().to_string(),
            notes,
            status,
        }
    }

    /// Record for a reference whose pipeline failed outright
    ///
    /// Synthesized title, empty author fields, the error in the notes.
    pub fn degraded(&self, reference: &RawReference, error: &str) -> ReferenceRecord {
        let mut notes = Notes::default();
        notes.push(format!("processing error: {}", error));

        ReferenceRecord {
            title: synthesize_title(
                reference.as_str(),
                self.title_prefix_chars,
                &self.truncation_marker,
            ),
            year: None,
            first_author: AuthorRecord::default(),
            last_author: AuthorRecord::default(),
            reference_raw: reference.as_str().to_string(),
            notes,
            status: ResolutionStatus::Failed,
        }
    }
}

/// Fill empty name and affiliations from an index author entry
///
/// Returns true if anything was written.
fn fill_author(record: &mut AuthorRecord, source: Option<&CandidateAuthor>) -> bool {
    let Some(source) = source else {
        return false;
    };
    let mut filled = false;

    if record.name.is_empty() && !source.name.trim().is_empty() {
        record.name = source.name.trim().to_string();
        filled = true;
    }
    if record.affiliations.is_empty() {
        for affiliation in &source.affiliations {
            filled |= push_unique(&mut record.affiliations, affiliation);
        }
    }
    filled
}

fn fill_from_parsed(record: &mut AuthorRecord, parsed: &ParsedFields, position: Position) {
    let name = match position {
        Position::First => parsed.first_author_name(),
        Position::Last => parsed.last_author_name(),
    };
    if record.name.is_empty() {
        if let Some(name) = name {
            record.name = name.trim().to_string();
        }
    }

    if record.affiliations.is_empty() {
        for affiliation in parsed_affiliations(parsed, position) {
            push_unique(&mut record.affiliations, affiliation);
        }
    }
}

/// Positional affiliations; a lone author reads both positions
fn parsed_affiliations(parsed: &ParsedFields, position: Position) -> &[String] {
    let (own, other) = match position {
        Position::First => (&parsed.first_author, &parsed.last_author),
        Position::Last => (&parsed.last_author, &parsed.first_author),
    };
    if own.affiliations.is_empty() && parsed.authors.len() == 1 {
        &other.affiliations
    } else {
        &own.affiliations
    }
}

fn attribute_emails(
    first: &mut AuthorRecord,
    last: &mut AuthorRecord,
    reference: &RawReference,
    parsed: &ParsedFields,
) {
    for email in &parsed.last_author.emails {
        push_unique(&mut last.emails, email);
    }
    for email in &parsed.first_author.emails {
        if !last.emails.contains(email) {
            push_unique(&mut first.emails, email);
        }
    }

    let mut observed = Vec::new();
    for email in parsed.emails.iter().chain(scan_emails(reference.as_str()).iter()) {
        push_unique(&mut observed, email);
    }

    for email in observed {
        if first.emails.contains(&email) || last.emails.contains(&email) {
            continue;
        }
        if !first.name.is_empty() {
            first.emails.push(email);
        } else {
            // Catch-all: no observed email is dropped
            last.emails.push(email);
        }
    }
}
