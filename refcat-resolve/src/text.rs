//! Text normalization helpers shared by the pipeline stages

use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("valid year regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")
        .expect("valid email regex")
});

/// Strip punctuation and collapse whitespace
///
/// Word characters (letters, digits, underscore) and whitespace survive; everything
/// else becomes a space. The result is safe to embed in index filter expressions.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last name-like token of an author string ("J. R. R. Tolkien" -> "Tolkien")
pub fn last_name_token(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphabetic() || c.is_whitespace() || c == '\'' || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphabetic))
        .last()
        .map(str::to_string)
}

/// Four-digit year in [1500, 2099] from a free-text year field
///
/// The literal `null` (any case) means no year.
pub fn extract_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    YEAR_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn is_plausible_year(year: i64) -> bool {
    (1500..=2099).contains(&year)
}

/// Email addresses appearing in the text, in order of appearance, without duplicates
pub fn scan_emails(text: &str) -> Vec<String> {
    let mut emails = Vec::new();
    for m in EMAIL_RE.find_iter(text) {
        push_unique(&mut emails, m.as_str());
    }
    emails
}

/// Title made from the first `max_chars` characters of the raw text
///
/// Line breaks become spaces; `marker` is appended when the text was cut.
/// Never returns an empty string.
pub fn synthesize_title(raw: &str, max_chars: usize, marker: &str) -> String {
    let flattened: String = raw
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let cut = flattened.chars().count() > max_chars;
    let prefix: String = flattened.chars().take(max_chars).collect();
    let prefix = prefix.trim();

    if prefix.is_empty() {
        return "[untitled reference]".to_string();
    }
    if cut {
        format!("{}{}", prefix, marker)
    } else {
        prefix.to_string()
    }
}

/// Append a trimmed value unless it is blank or already present
///
/// Returns true when the value was added.
pub fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}
