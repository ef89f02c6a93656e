//! Shared types and data contracts
//!
//! Everything that crosses a stage boundary of the resolution pipeline lives here:
//! parsed reference fields, index candidates, match decisions and the final record.
//! "No match" is always an explicit `Option`, never a sentinel string.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Input
// ============================================================================

/// One reference string as supplied by the segmentation collaborator
///
/// Opaque text: no internal structure is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawReference(String);

impl RawReference {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawReference {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RawReference {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for RawReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Field Parser output
// ============================================================================

/// Affiliation and email data the parser attributed to one author position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionalDetails {
    pub affiliations: Vec<String>,
    pub emails: Vec<String>,
}

/// Structured fields extracted from one reference
///
/// `authors` keeps the order found in the text: index 0 is the first author,
/// the last index the last author. Position is the only first/last signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub title: String,
    /// Four-digit year in [1500, 2099]
    pub year: Option<i32>,
    pub authors: Vec<String>,
    pub emails: Vec<String>,
    pub first_author: PositionalDetails,
    pub last_author: PositionalDetails,
    /// Names of output fields that failed validation and were defaulted to empty
    pub malformed: Vec<String>,
}

impl ParsedFields {
    pub fn first_author_name(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    pub fn last_author_name(&self) -> Option<&str> {
        self.authors.last().map(String::as_str)
    }
}

// ============================================================================
// Work type
// ============================================================================

/// Coarse category of a cited work, used only as matching context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkType {
    Book,
    JournalArticle,
    ProceedingsArticle,
    BookChapter,
    Unknown,
}

impl WorkType {
    /// Type identifier understood by the primary index filter
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::JournalArticle => "journal-article",
            Self::ProceedingsArticle => "proceedings-article",
            Self::BookChapter => "book-chapter",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping of a free-text label onto the fixed set
    ///
    /// Tries the lower-cased label, then the label with spaces turned into hyphens.
    /// Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let raw = label.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
        Self::lookup(&raw)
            .or_else(|| Self::lookup(&raw.replace(' ', "-")))
            .unwrap_or(Self::Unknown)
    }

    fn lookup(label: &str) -> Option<Self> {
        match label {
            "book" | "books" => Some(Self::Book),
            "journal-article" | "journal article" | "article" | "paper" => {
                Some(Self::JournalArticle)
            }
            "proceedings-article" | "conference paper" => Some(Self::ProceedingsArticle),
            "book-chapter" | "chapter" => Some(Self::BookChapter),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Index results
// ============================================================================

/// Author entry on an index result (name plus institution names)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateAuthor {
    pub name: String,
    pub affiliations: Vec<String>,
}

/// A work returned by a primary index query, not yet confirmed as the match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateWork {
    pub id: String,
    pub title: String,
    pub publication_year: Option<i32>,
    /// Type tag as reported by the index
    pub work_type: String,
    pub authors: Vec<CandidateAuthor>,
}

/// A paper returned by the secondary index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryPaper {
    pub paper_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub authors: Vec<CandidateAuthor>,
}

// ============================================================================
// Selection
// ============================================================================

/// Outcome of candidate disambiguation
///
/// The rationale is for the audit trail only; no logic reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub chosen: Option<CandidateWork>,
    pub rationale: String,
}

impl MatchResult {
    pub fn none(rationale: impl Into<String>) -> Self {
        Self {
            chosen: None,
            rationale: rationale.into(),
        }
    }

    pub fn chosen_id(&self) -> Option<&str> {
        self.chosen.as_ref().map(|c| c.id.as_str())
    }
}

// ============================================================================
// Output
// ============================================================================

/// Contact and affiliation data for one author position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorRecord {
    pub name: String,
    /// Ordered, no duplicates
    pub affiliations: Vec<String>,
    /// Ordered, no duplicates
    pub emails: Vec<String>,
}

/// Append-only audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notes(Vec<String>);

impl Notes {
    pub fn push(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !note.trim().is_empty() {
            self.0.push(note);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.0.iter().any(|n| n.contains(fragment))
    }

    pub fn join(&self, delimiter: &str) -> String {
        self.0.join(delimiter)
    }
}

/// How a record came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Primary index candidate chosen
    Matched,
    /// No primary match; the secondary index contributed data
    FallbackFilled,
    /// Parsed fields only
    Unmatched,
    /// Pipeline failed; degraded record
    Failed,
}

/// Final output row for one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub title: String,
    pub year: Option<i32>,
    pub first_author: AuthorRecord,
    pub last_author: AuthorRecord,
    pub reference_raw: String,
    pub notes: Notes,
    pub status: ResolutionStatus,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transport failure, non-success status or undecodable body from an index
    #[error("Source request failed: {0}")]
    Source(String),

    /// Index answered with a rate-limit status
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Model-backed capability could not be invoked
    #[error("Capability call failed: {0}")]
    Capability(String),

    /// Anything else that broke one reference's pipeline
    #[error("Reference processing failed: {0}")]
    Processing(String),

    #[error("Export failed: {0}")]
    Export(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
