//! Pure classifiers over transcribed speech and model output
//!
//! Nothing here touches session state; every function maps text to a value.

mod confirm;
mod datetime;
mod phrases;

pub use confirm::{classify_confirmation, Confirmation};
pub use datetime::{parse_date, parse_date_time, parse_time};
pub use phrases::{is_goodbye, offers_assistance};

/// Lowercase words with surrounding punctuation removed
pub(crate) fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != ':' && c != '/' && c != '-')
                .trim_matches(|c: char| c == '\'' || c == '-')
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Normalized text: lowercase words joined by single spaces
pub(crate) fn normalize(text: &str) -> String {
    words(text).join(" ")
}

/// Whole-word phrase containment on normalized text
pub(crate) fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let haystack = format!(" {} ", normalized);
    haystack.contains(&format!(" {} ", phrase))
}
