//! Resolve a caller's free-text selection against the cached appointment list
//!
//! Tried in order, first hit wins:
//! 1. Numeric position ("2", "number 2")
//! 2. Ordinal words ("the second one", "last")
//! 3. Exact title
//! 4. Substring containment either way, after fixing common mis-transcriptions
//! 5. Fraction of shared words
//!
//! Ties go to the earliest appointment in the list.

use crate::calendar::Appointment;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchResult {
    Found { index: usize },
    NotFound,
}

impl MatchResult {
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Found { index } => Some(*index),
            Self::NotFound => None,
        }
    }
}

/// Minimum share of selection words that must appear in a title
const OVERLAP_THRESHOLD: f64 = 0.5;

const ORDINALS: &[(&str, usize)] = &[
    ("first", 1),
    ("1st", 1),
    ("second", 2),
    ("2nd", 2),
    ("third", 3),
    ("3rd", 3),
    ("fourth", 4),
    ("4th", 4),
    ("fifth", 5),
    ("5th", 5),
    ("sixth", 6),
    ("6th", 6),
];

const NUMBER_WORDS: &[(&str, usize)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
];

/// Speech-to-text slips seen on appointment titles
const TRANSCRIPTION_FIXES: &[(&str, &str)] = &[
    ("dell", "dental"),
    ("dentil", "dental"),
    ("dentist", "dental"),
    ("busyness", "business"),
    ("bizness", "business"),
    ("dock", "doctor"),
    ("doc", "doctor"),
    ("docter", "doctor"),
    ("haircut", "hair"),
    ("physio", "physical"),
    ("therapy's", "therapy"),
];

const STOP_WORDS: &[&str] = &[
    "the", "my", "a", "an", "one", "appointment", "appointments", "meeting", "meetings", "that",
    "this", "for", "with", "on", "at", "please", "thing",
];

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Significant words with transcription fixes applied
fn key_words(text: &str) -> Vec<String> {
    tokens(text)
        .into_iter()
        .map(|w| {
            TRANSCRIPTION_FIXES
                .iter()
                .find(|(heard, _)| *heard == w)
                .map(|(_, fixed)| fixed.to_string())
                .unwrap_or(w)
        })
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn positional(selection: &[String], len: usize) -> Option<usize> {
    // "2", "#2", "number 2"
    let numeric = selection.iter().find_map(|w| w.parse::<usize>().ok());
    if let Some(n) = numeric.filter(|n| (1..=len).contains(n)) {
        return Some(n - 1);
    }

    if selection.iter().any(|w| w == "last") && len > 0 {
        return Some(len - 1);
    }

    let ordinal = selection.iter().find_map(|w| {
        ORDINALS
            .iter()
            .find(|(name, _)| name == w)
            .map(|(_, n)| *n)
    });
    if let Some(n) = ordinal.filter(|n| (1..=len).contains(n)) {
        return Some(n - 1);
    }

    // "number two" but not "the dental one"
    let spoken_number = selection.windows(2).find_map(|pair| {
        (pair[0] == "number")
            .then(|| NUMBER_WORDS.iter().find(|(name, _)| *name == pair[1]).map(|(_, n)| *n))
            .flatten()
    });
    spoken_number
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}

/// Find the appointment a caller is referring to
pub fn match_appointment(selection: &str, appointments: &[Appointment]) -> MatchResult {
    let raw = tokens(selection);
    if raw.is_empty() || appointments.is_empty() {
        return MatchResult::NotFound;
    }

    if let Some(index) = positional(&raw, appointments.len()) {
        return MatchResult::Found { index };
    }

    let wanted = selection.trim().to_lowercase();
    if let Some(index) = appointments
        .iter()
        .position(|a| a.summary.trim().to_lowercase() == wanted)
    {
        return MatchResult::Found { index };
    }

    let selection_words = key_words(selection);
    if selection_words.is_empty() {
        return MatchResult::NotFound;
    }
    let selection_key = selection_words.join(" ");

    let titles: Vec<Vec<String>> = appointments.iter().map(|a| key_words(&a.summary)).collect();

    if let Some(index) = titles.iter().position(|title| {
        let title_key = title.join(" ");
        !title_key.is_empty() && (title_key.contains(&selection_key) || selection_key.contains(&title_key))
    }) {
        return MatchResult::Found { index };
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, title) in titles.iter().enumerate() {
        let shared = selection_words.iter().filter(|w| title.contains(w)).count();
        let score = shared as f64 / selection_words.len() as f64;
        // Strictly greater keeps the earliest on ties
        if score >= OVERLAP_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((index, score));
        }
    }

    match best {
        Some((index, _)) => MatchResult::Found { index },
        None => MatchResult::NotFound,
    }
}
