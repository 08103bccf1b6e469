use quick_vision::extract::{
    extract, truncate_with_marker, ExtractMode, LETTERS_FALLBACK_CHARS, MINIMAL_FALLBACK_CHARS,
    TRUNCATION_MARKER,
};

const SAMPLES: &[&str] = &[
    "",
    "   ",
    "1) A) correct text\n2) B) correct text",
    "3. B) Mitochondria",
    "Answer: C",
    "**Answer:** **D) Lisbon**",
    "Python - print\nJava - System.out.print",
    "1) Python 2) Java 3) C++",
    "Question 12 asks about rivers. The right one is b) Nile",
    "a) b) c) d) a) b) c) d) a) b) c) d) a) b) c) d) a) b) c) d)",
];

fn numbered(count: usize) -> String {
    (1..=count)
        .map(|n| format!("{n}) {}) option", ["A", "B", "C", "D"][n % 4]))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn letters_from_numbered_choices() {
    let text = "1) A) correct text\n2) B) correct text";
    assert_eq!(extract(text, ExtractMode::Letters), "1) A 2) B");
}

#[test]
fn letters_from_dotted_number() {
    assert_eq!(extract("3. B)", ExtractMode::Letters), "3) B");
}

#[test]
fn minimal_from_numbered_choices() {
    let text = "1) A) correct text\n2) B) correct text";
    assert_eq!(extract(text, ExtractMode::Minimal), "1:A 2:B");
}

#[test]
fn letters_fallback_truncates_prose() {
    let text = "x".repeat(250);
    let out = extract(&text, ExtractMode::Letters);
    assert_eq!(out, format!("{}{}", "x".repeat(LETTERS_FALLBACK_CHARS), TRUNCATION_MARKER));
}

#[test]
fn minimal_fallback_truncates_prose() {
    let text = "Python - print, Java - System.out.print, Rust - println macro, Go - fmt";
    let out = extract(text, ExtractMode::Minimal);
    assert!(out.ends_with(TRUNCATION_MARKER));
    assert_eq!(out.chars().count(), MINIMAL_FALLBACK_CHARS + TRUNCATION_MARKER.len());
}

#[test]
fn short_prose_is_returned_unchanged() {
    let text = "Python - print";
    assert_eq!(extract(text, ExtractMode::Letters), text);
    assert_eq!(extract(text, ExtractMode::Minimal), text);
}

#[test]
fn letters_caps_at_fifteen_pairs() {
    let out = extract(&numbered(20), ExtractMode::Letters);
    assert_eq!(out.split(") ").count() - 1, 15);
    assert!(out.starts_with("1) B 2) C"));
}

#[test]
fn minimal_caps_at_ten_pairs() {
    let out = extract(&numbered(20), ExtractMode::Minimal);
    assert_eq!(out.split(' ').count(), 10);
    assert!(out.starts_with("1:B 2:C"));
}

#[test]
fn output_stays_within_mode_bound() {
    for mode in [ExtractMode::Letters, ExtractMode::Minimal] {
        let bound = mode.truncation_bound() + TRUNCATION_MARKER.len();
        for sample in SAMPLES.iter().copied().chain([numbered(30).as_str()]) {
            let out = extract(sample, mode);
            assert!(out.chars().count() <= bound, "{mode}: {out:?} exceeds {bound}");
        }
    }
}

#[test]
fn extraction_is_deterministic() {
    for mode in [ExtractMode::Letters, ExtractMode::Minimal] {
        for sample in SAMPLES {
            assert_eq!(extract(sample, mode), extract(sample, mode));
        }
    }
}

#[test]
fn truncation_keeps_short_text() {
    assert_eq!(truncate_with_marker("abc", 3), "abc");
    assert_eq!(truncate_with_marker("abcd", 3), "abc...");
}
