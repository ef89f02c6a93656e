//! Prompt text for the model-backed capabilities
//!
//! Every prompt asks for a single JSON object so that [`super::schema`] can validate
//! the answer field by field.

use super::ComparisonRequest;
use serde_json::json;

pub const PARSE_SYSTEM: &str = "You parse bibliography references into structured fields. \
Answer with one JSON object and nothing else.";

pub const CLASSIFY_SYSTEM: &str = "You classify cited works. \
Answer with one JSON object and nothing else.";

pub const COMPARE_SYSTEM: &str = "You match a bibliography reference against catalogue \
candidates. Answer with one JSON object and nothing else.";

pub fn parse_reference(reference_text: &str) -> String {
    format!(
        "Reference:\n{reference_text}\n\n\
         Return a JSON object with these keys:\n\
         - \"title\": title of the cited work (string, empty if unsure)\n\
         - \"year\": four-digit publication year as a string, or \"null\" if unsure\n\
         - \"authors\": array of author names in the order they appear\n\
         - \"emails\": array of email addresses found in the reference (empty if none)\n\
         - \"first_author\": object with \"affiliations\" and \"emails\" arrays for the first \
         author, only if the reference states them\n\
         - \"last_author\": the same for the last author"
    )
}

pub fn classify_work_type(reference_text: &str) -> String {
    format!(
        "Reference:\n{reference_text}\n\n\
         Return a JSON object {{\"work_type\": ...}} where work_type is one of \
         \"book\", \"journal-article\", \"proceedings-article\", \"book-chapter\", \"unknown\"."
    )
}

pub fn compare_candidates(request: &ComparisonRequest) -> String {
    let parsed_year = request
        .parsed_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "null".to_string());
    let authors = json!(request.parsed_authors).to_string();
    let candidates = json!(request.candidates).to_string();

    format!(
        "Reference:\n{reference}\n\n\
         Parsed title: {title}\n\
         Parsed year: {parsed_year}\n\
         Parsed authors: {authors}\n\
         Inferred work type: {work_type}\n\
         Candidates: {candidates}\n\n\
         Compare every candidate's title, authors, year and type with the reference. \
         Expect discrepancies: when only some of these agree, pick the candidate that fits \
         best and explain why. A close title match should be chosen even when year, authors \
         or type are far off. Answer \"none\" only when no candidate plausibly refers to the \
         same work.\n\n\
         Return a JSON object {{\"chosen_id\": <candidate id or \"none\">, \
         \"rationale\": <short explanation>}}.",
        reference = request.reference_text,
        title = request.parsed_title,
        work_type = request.work_type,
    )
}
