use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Shorthand used when turning a free-form model answer into display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// `N:L` pairs, at most 10.
    #[default]
    Minimal,
    /// `N) L` pairs, at most 15.
    Letters,
}

impl ExtractMode {
    /// The other mode, used as a second chance when one finds nothing.
    pub fn other(self) -> Self {
        match self {
            ExtractMode::Minimal => ExtractMode::Letters,
            ExtractMode::Letters => ExtractMode::Minimal,
        }
    }

    /// Number of characters kept when no pattern matches.
    pub fn truncation_bound(self) -> usize {
        match self {
            ExtractMode::Minimal => MINIMAL_FALLBACK_CHARS,
            ExtractMode::Letters => LETTERS_FALLBACK_CHARS,
        }
    }
}

impl fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractMode::Minimal => write!(f, "minimal"),
            ExtractMode::Letters => write!(f, "letters"),
        }
    }
}

impl FromStr for ExtractMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(ExtractMode::Minimal),
            "letters" => Ok(ExtractMode::Letters),
            other => Err(format!("unknown text mode '{other}'")),
        }
    }
}

pub const TRUNCATION_MARKER: &str = "...";
pub const LETTERS_FALLBACK_CHARS: usize = 100;
pub const MINIMAL_FALLBACK_CHARS: usize = 60;
const LETTERS_CAP: usize = 15;
const MINIMAL_CAP: usize = 10;

static NUMBERED_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\n)\s*(\d{1,2})\s*[).\-:]\s*([A-D])\b").unwrap());
static ANSWER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:final\s+)?answer(?:\s+is)?\s*[:\-]?\s*([A-D])\b").unwrap()
});
static BOLD_ANSWER: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)\*{2,}Answer:\*{2,}\s+\*{2,}([A-D])\)").unwrap(),
        Regex::new(r"(?i)\*{2,}Answer:\*{2,}\s+([A-D])\)").unwrap(),
    ]
});
static CHOICE_BEFORE_CAPITAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-D])\)\s+[A-Z]").unwrap());
static LETTER_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([A-D])\)").unwrap());
static QUESTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\n)\s*(\d{1,2})[.)]").unwrap());
static QUESTION_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Question\s+(\d{1,3})\b[\s\S]*?([A-D])\)").unwrap());
static BARE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b([A-D])\)").unwrap());

/// Derive compact display text from a model answer.
///
/// Never fails: when no answer pattern is found the input is truncated to the
/// mode's bound with [`TRUNCATION_MARKER`] appended.
pub fn extract(text: &str, mode: ExtractMode) -> String {
    match mode {
        ExtractMode::Letters => extract_letters(text),
        ExtractMode::Minimal => extract_minimal(text),
    }
}

/// `letters` mode: `1) A 2) B ...`.
pub fn extract_letters(text: &str) -> String {
    let numbered = dedup_by_key(
        NUMBERED_LETTER
            .captures_iter(text)
            .filter_map(|c| Some((c[1].parse::<u32>().ok()?, c[2].to_ascii_uppercase()))),
    );
    if !numbered.is_empty() {
        return join_pairs(numbered.iter().take(LETTERS_CAP), ") ");
    }

    let per_line: Vec<String> = ANSWER_LINE
        .captures_iter(text)
        .map(|c| c[1].to_ascii_uppercase())
        .collect();
    if !per_line.is_empty() {
        return enumerate_letters(&per_line, ") ", LETTERS_CAP);
    }

    let bold: Vec<String> = BOLD_ANSWER
        .iter()
        .flat_map(|re| re.captures_iter(text).map(|c| c[1].to_ascii_uppercase()))
        .collect();
    if !bold.is_empty() {
        return enumerate_letters(&bold, ") ", LETTERS_CAP);
    }

    let mut unique: Vec<String> = Vec::new();
    for c in CHOICE_BEFORE_CAPITAL.captures_iter(text) {
        let letter = c[1].to_string();
        if !unique.contains(&letter) {
            unique.push(letter);
        }
    }
    if !unique.is_empty() {
        return enumerate_letters(&unique, ") ", LETTERS_CAP);
    }

    truncate_with_marker(text, LETTERS_FALLBACK_CHARS)
}

/// `minimal` mode: `1:A 2:B ...`.
pub fn extract_minimal(text: &str) -> String {
    // (end offset, question number) of every marker, in text order.
    let markers: Vec<(usize, &str)> = QUESTION_MARKER
        .captures_iter(text)
        .filter_map(|c| Some((c.get(0)?.end(), c.get(1)?.as_str())))
        .collect();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for m in LETTER_PAREN.captures_iter(text) {
        let Some(letter) = m.get(1) else { continue };
        let preceding = markers.partition_point(|(end, _)| *end <= letter.start());
        if let Some((_, number)) = preceding.checked_sub(1).map(|i| markers[i]) {
            pairs.push((number.to_string(), letter.as_str().to_ascii_uppercase()));
        }
    }
    if pairs.is_empty() {
        pairs.extend(
            QUESTION_WORD
                .captures_iter(text)
                .map(|c| (c[1].to_string(), c[2].to_ascii_uppercase())),
        );
    }

    let unique = dedup_by_key(pairs.into_iter());
    if !unique.is_empty() {
        return join_pairs(unique.iter().take(MINIMAL_CAP), ":");
    }

    let letters: Vec<String> = BARE_LETTER
        .captures_iter(text)
        .map(|c| c[1].to_ascii_uppercase())
        .collect();
    if !letters.is_empty() {
        return enumerate_letters(&letters, ":", MINIMAL_CAP);
    }

    truncate_with_marker(text, MINIMAL_FALLBACK_CHARS)
}

/// Keep the first `max_chars` characters, appending `...` if anything was cut.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

fn dedup_by_key<K, I>(pairs: I) -> Vec<(K, String)>
where
    K: std::hash::Hash + Eq + Clone,
    I: Iterator<Item = (K, String)>,
{
    let mut seen = HashSet::new();
    pairs.filter(|(k, _)| seen.insert(k.clone())).collect()
}

fn join_pairs<'a, K, I>(pairs: I, sep: &str) -> String
where
    K: fmt::Display + 'a,
    I: Iterator<Item = &'a (K, String)>,
{
    pairs
        .map(|(n, l)| format!("{n}{sep}{l}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn enumerate_letters(letters: &[String], sep: &str, cap: usize) -> String {
    letters
        .iter()
        .take(cap)
        .enumerate()
        .map(|(i, l)| format!("{}{sep}{l}", i + 1))
        .collect::<Vec<_>>()
        .join(" ")
}
