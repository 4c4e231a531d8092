use super::{contains_phrase, normalize};

const GOODBYES: &[&str] = &[
    "goodbye",
    "good bye",
    "bye",
    "bye bye",
    "have a great day",
    "have a good day",
    "have a nice day",
    "have a wonderful day",
    "take care",
    "talk to you later",
    "adios",
];

const ASSISTANCE_OFFERS: &[&str] = &[
    "anything else",
    "something else",
    "any other questions",
    "anything more",
    "else i can help",
    "else can i help",
    "help you with anything",
    "algo mas",
];

/// The text ends with a goodbye sentence
///
/// Only the final sentence counts, so "Goodbye isn't needed yet, what time works?"
/// does not end the call.
pub fn is_goodbye(text: &str) -> bool {
    let last = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last();

    let Some(sentence) = last else {
        return false;
    };

    let sentence = normalize(sentence);
    GOODBYES
        .iter()
        .any(|g| sentence == *g || sentence.ends_with(&format!(" {}", g)))
}

/// The text invites the caller to ask for more help
pub fn offers_assistance(text: &str) -> bool {
    let text = normalize(text);
    ASSISTANCE_OFFERS.iter().any(|p| contains_phrase(&text, p))
}
