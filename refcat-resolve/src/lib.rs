//! refcat-resolve library interface
//!
//! Resolves loosely formatted bibliographic references into canonical records:
//! model-backed parsing and classification, a staged primary index cascade,
//! comparator-backed candidate selection, a secondary index fallback and a
//! precedence merge of author data.

pub mod capabilities;
pub mod events;
pub mod export;
pub mod pipeline;
pub mod segment;
pub mod sources;
pub mod text;
pub mod types;

pub use pipeline::{BatchReport, ReferenceResolver, ResolverComponents};
pub use types::{RawReference, ReferenceRecord, ResolveError, ResolveResult};
