//! Resolution pipeline stages
//!
//! - [`cascade`]: staged primary index queries
//! - [`selector`]: comparator-backed candidate choice
//! - [`fallback`]: secondary index lookup with rate-limit backoff
//! - [`merger`]: precedence merge into the final record
//! - [`orchestrator`]: per-reference sequencing and fault isolation

pub mod cascade;
pub mod fallback;
pub mod merger;
pub mod orchestrator;
pub mod selector;

pub use cascade::{CascadeOutcome, CascadeStage, QueryCascade};
pub use fallback::{FallbackOutcome, FallbackReport, SecondaryFallback};
pub use merger::{FieldMerger, MergeInput};
pub use orchestrator::{BatchReport, ReferenceResolver, ResolverComponents, StatusCounts};
pub use selector::{CandidateSelector, Selection};
