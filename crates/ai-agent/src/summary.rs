//! Removes process meta-commentary ("Based on my analysis, ...",
//! "In conclusion ...") from the final workflow answer.

/// Openers that refer to the workflow instead of the answer. Checked in order;
/// only the first match is stripped.
pub const LEADING_META_PHRASES: &[&str] = &[
    "Based on my analysis",
    "Based on the analysis",
    "After analyzing",
    "After executing the plan",
    "Based on the completed plan",
    "Based on the results",
    "From my analysis",
    "From the analysis",
    "Having analyzed",
    "Having completed the plan",
    "In summary",
    "In conclusion",
    "To summarize",
    "To conclude",
    "After completing the steps",
    "Based on the step-by-step results",
    "After reviewing the results",
    "Based on the information gathered",
    "Based on my research",
    "Here is a comprehensive answer",
    "Here is my answer",
    "Here's what I found",
    "Here is a summary",
    "Here's a summary",
];

pub const CONCLUDING_META_PHRASES: &[&str] =
    &["In conclusion", "To summarize", "To conclude", "In summary"];

/// Fraction of the text after which a concluding phrase is treated as a
/// trailing wrap-up rather than part of the answer.
const TRAILING_REGION_START: f64 = 0.7;

pub fn clean_summary(raw: &str) -> String {
    let stripped = strip_leading_meta(raw.trim());
    strip_trailing_meta(&stripped)
}

fn strip_leading_meta(text: &str) -> String {
    for phrase in LEADING_META_PHRASES {
        let Some(head) = text.get(..phrase.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(phrase) {
            continue;
        }

        let rest = &text[phrase.len()..];
        let boundary_ok = match rest.chars().next() {
            None => true,
            Some(c) => matches!(c, ',' | ':' | '.' | ';') || c.is_whitespace(),
        };
        if !boundary_ok {
            continue;
        }

        let rest = rest
            .strip_prefix(|c: char| matches!(c, ',' | ':' | '.' | ';'))
            .unwrap_or(rest)
            .trim_start();
        return capitalize_first(rest);
    }
    text.to_string()
}

/// Cuts trailing wrap-ups until none is left in the trailing region, so a
/// phrase that only lands there after an earlier cut is removed too.
fn strip_trailing_meta(text: &str) -> String {
    let mut cleaned = text.to_string();
    while let Some(index) = trailing_cut(&cleaned) {
        cleaned.truncate(index);
        cleaned.truncate(cleaned.trim_end().len());
    }
    cleaned
}

/// Byte offset of the latest concluding phrase inside the trailing region.
fn trailing_cut(text: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    let total = text.chars().count() as f64;
    CONCLUDING_META_PHRASES
        .iter()
        .filter_map(|phrase| lowered.rfind(&phrase.to_ascii_lowercase()))
        .filter(|index| text[..*index].chars().count() as f64 > total * TRAILING_REGION_START)
        .max()
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_BODY: &str = "Rust guarantees memory safety through ownership, borrowing and \
        lifetimes, which the compiler checks before the program ever runs. ";

    #[test]
    fn strips_leading_phrase_and_recapitalizes() {
        assert_eq!(
            clean_summary("Based on my analysis, the answer is 42."),
            "The answer is 42."
        );
    }

    #[test]
    fn leading_match_is_case_insensitive() {
        assert_eq!(
            clean_summary("HERE IS A SUMMARY: cats sleep a lot."),
            "Cats sleep a lot."
        );
    }

    #[test]
    fn phrase_must_end_at_a_word_boundary() {
        let text = "In summaryland the weather is mild.";
        assert_eq!(clean_summary(text), text);
    }

    #[test]
    fn only_first_leading_phrase_is_removed() {
        assert_eq!(
            clean_summary("In summary: to summarize is hard."),
            "To summarize is hard."
        );
    }

    #[test]
    fn truncates_conclusion_in_trailing_region() {
        let text = format!("{LONG_BODY}In conclusion, that's it.");
        assert_eq!(clean_summary(&text), LONG_BODY.trim_end());
    }

    #[test]
    fn keeps_conclusion_phrase_in_the_middle() {
        let text = format!("In conclusion is a phrase. {LONG_BODY}{LONG_BODY}");
        let text = format!("Intro sentence first. {text}");
        assert_eq!(clean_summary(&text), text.trim());
    }

    #[test]
    fn short_text_with_early_conclusion_is_kept() {
        let text = "The answer is 42. In conclusion, that's it.";
        assert_eq!(clean_summary(text), text);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(clean_summary(""), "");
        assert_eq!(clean_summary("   "), "");
    }

    #[test]
    fn bare_phrase_is_removed_entirely() {
        assert_eq!(clean_summary("In conclusion"), "");
    }

    #[test]
    fn non_ascii_text_is_handled() {
        let text = format!("Based on the results: été chaud. {LONG_BODY}To conclude, fini.");
        let cleaned = clean_summary(&text);
        assert!(cleaned.starts_with("Été chaud."));
        assert!(!cleaned.contains("To conclude"));
    }

    #[test]
    fn repeated_wrap_ups_are_cut_in_one_pass() {
        let body = "x".repeat(94);
        let text = format!("{body} In conclusion, ok. {} In summary, the end.", "y".repeat(20));
        assert_eq!(clean_summary(&text), body);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            "Based on my analysis, the answer is 42.".to_string(),
            format!("{LONG_BODY}In conclusion, that's it."),
            format!("To summarize: {LONG_BODY}To summarize, done."),
            "Plain answer with nothing to strip.".to_string(),
            "The answer is 42. In conclusion, that's it.".to_string(),
            format!(
                "{} In conclusion, ok. {} In summary, the end.",
                "x".repeat(94),
                "y".repeat(20)
            ),
            String::new(),
        ];
        for input in inputs {
            let once = clean_summary(&input);
            assert_eq!(clean_summary(&once), once, "input: {input:?}");
        }
    }
}
