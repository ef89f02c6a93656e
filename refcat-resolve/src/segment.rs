//! Bibliography text segmentation
//!
//! Tuned for label-style bibliographies where every entry starts on a new line with a
//! bracketed key, e.g. `[Hill '79] J. Hill, Some Title, 1979.`

use crate::types::RawReference;

/// Entries this short are page furniture, not references
const MIN_REFERENCE_CHARS: usize = 30;

const DASH_RULE: &str = "\u{2014}\u{2014}\u{2014}";

/// Split extracted bibliography text into individual references, in text order
///
/// Heading lines ("Bibliography...") and dash rules are dropped, a new entry starts at
/// every line beginning with `[`, and chunks that do not start with `[` or are not
/// longer than 30 characters are discarded. Continuation lines stay joined with `\n`.
pub fn split_into_references(text: &str) -> Vec<RawReference> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Bibliography") || trimmed.starts_with(DASH_RULE) {
            continue;
        }
        if line.starts_with('[') && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .iter()
        .map(|chunk| chunk.trim())
        .filter(|chunk| chunk.starts_with('[') && chunk.chars().count() > MIN_REFERENCE_CHARS)
        .map(RawReference::from)
        .collect()
}
