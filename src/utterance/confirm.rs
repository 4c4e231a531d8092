use super::{contains_phrase, normalize};
use serde::Serialize;

/// Caller's answer to a read-back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    Affirmative,
    Negative,
    Unclear,
}

/// Phrases that read as agreement despite containing a negative word
const AFFIRMATIVE_IDIOMS: &[&str] = &["no problem", "not a problem", "no worries"];

const NEGATED_AFFIRMATIONS: &[&str] = &[
    "not right",
    "not correct",
    "don't do",
    "do not",
    "don't go ahead",
    "not yet",
    "that's wrong",
];

const NEGATIVE: &[&str] = &[
    "no",
    "nope",
    "nah",
    "don't",
    "dont",
    "not",
    "wrong",
    "incorrect",
    "wait",
    "stop",
    "never mind",
    "nevermind",
    "hold on",
];

const AFFIRMATIVE: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "sure",
    "correct",
    "right",
    "ok",
    "okay",
    "confirm",
    "confirmed",
    "absolutely",
    "definitely",
    "perfect",
    "please do",
    "go ahead",
    "do it",
    "sounds good",
    "that works",
    "that's right",
    "si",
    "claro",
];

/// Classify a reply to "shall I go ahead?"
///
/// Mixed signals ("yes, no wait") are `Unclear` so nothing is executed on them.
pub fn classify_confirmation(text: &str) -> Confirmation {
    let mut text = normalize(text);
    if text.is_empty() {
        return Confirmation::Unclear;
    }

    let mut idiom = false;
    for phrase in AFFIRMATIVE_IDIOMS {
        if contains_phrase(&text, phrase) {
            idiom = true;
            text = format!(" {} ", text)
                .replace(&format!(" {} ", phrase), " ")
                .trim()
                .to_string();
        }
    }

    if NEGATED_AFFIRMATIONS.iter().any(|p| contains_phrase(&text, p)) {
        return Confirmation::Negative;
    }

    let negative = NEGATIVE.iter().any(|p| contains_phrase(&text, p));
    let affirmative = idiom || AFFIRMATIVE.iter().any(|p| contains_phrase(&text, p));

    match (affirmative, negative) {
        (true, false) => Confirmation::Affirmative,
        (false, true) => Confirmation::Negative,
        _ => Confirmation::Unclear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative() {
        for text in ["yes", "Yes please.", "yeah go ahead", "That's right", "Sounds good!", "ok"] {
            assert_eq!(classify_confirmation(text), Confirmation::Affirmative, "{}", text);
        }
    }

    #[test]
    fn test_negative() {
        for text in ["no", "Nope.", "don't", "that's not right", "wait", "No thanks"] {
            assert_eq!(classify_confirmation(text), Confirmation::Negative, "{}", text);
        }
    }

    #[test]
    fn test_unclear() {
        for text in ["", "hmm", "what time was it again", "yes no wait"] {
            assert_eq!(classify_confirmation(text), Confirmation::Unclear, "{}", text);
        }
    }

    #[test]
    fn test_no_problem_is_agreement() {
        for text in ["Yes, no problem", "Sure, no problem.", "no worries", "Not a problem, go ahead"] {
            assert_eq!(classify_confirmation(text), Confirmation::Affirmative, "{}", text);
        }
        // A real refusal alongside the idiom is still mixed
        assert_eq!(classify_confirmation("no, no problem"), Confirmation::Unclear);
    }

    #[test]
    fn test_words_containing_keywords_do_not_match() {
        assert_eq!(classify_confirmation("I know"), Confirmation::Unclear);
        assert_eq!(classify_confirmation("yesterday"), Confirmation::Unclear);
    }
}
