//! Heuristic gate deciding whether a question goes through the multi-stage
//! workflow or a single direct model call.

/// Questions shorter than this (in characters) are always answered directly.
pub const MIN_COMPLEX_LEN: usize = 30;
/// Questions longer than this (in characters) always use the workflow.
pub const ALWAYS_COMPLEX_LEN: usize = 80;

pub const COMPLEXITY_KEYWORDS: &[&str] = &[
    "analyze",
    "compare",
    "contrast",
    "explain",
    "evaluate",
    "synthesize",
    "investigate",
    "research",
    "steps",
    "process",
    "how would",
    "how could",
    "what if",
    "why does",
    "multiple",
    "complex",
    "complicated",
    "difficult",
    "challenging",
    "intricate",
    "design",
    "create",
    "develop",
    "implement",
    "build",
    "optimize",
    "improve",
    "enhance",
    "solve",
    "fix",
];

pub fn is_complex(question: &str) -> bool {
    let len = question.chars().count();
    if len < MIN_COMPLEX_LEN {
        return false;
    }
    if len > ALWAYS_COMPLEX_LEN {
        return true;
    }

    let lowered = question.to_lowercase();
    let has_keyword = COMPLEXITY_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword));

    has_keyword || question.matches('?').count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(base: &str, len: usize) -> String {
        let mut text = base.to_string();
        while text.chars().count() < len {
            text.push('.');
        }
        text
    }

    #[test]
    fn short_questions_are_never_complex() {
        assert!(!is_complex(""));
        assert!(!is_complex("analyze this?? compare that??"));
        assert!(!is_complex(&"x".repeat(29)));
    }

    #[test]
    fn long_questions_are_always_complex() {
        assert!(is_complex(&"a".repeat(81)));
        assert!(is_complex(&padded("hello there", 120)));
    }

    #[test]
    fn keyword_in_mid_length_question() {
        let question = padded("Please analyze the quarterly report", 50);
        assert_eq!(question.chars().count(), 50);
        assert!(is_complex(&question));
    }

    #[test]
    fn keyword_matching_ignores_case() {
        let question = padded("Could you COMPARE these two options", 50);
        assert!(is_complex(&question));
    }

    #[test]
    fn two_question_marks_mark_a_question_complex() {
        let question = padded("Is it warm today? Is it sunny out?", 50);
        assert!(is_complex(&question));
    }

    #[test]
    fn plain_mid_length_question_is_simple() {
        let question = padded("What is the capital city of France?", 50);
        assert!(!is_complex(&question));
    }

    #[test]
    fn boundary_lengths() {
        let plain = "z".repeat(30);
        assert!(!is_complex(&plain));
        assert!(!is_complex(&"z".repeat(80)));
        assert!(is_complex(&"z".repeat(81)));
    }

    #[test]
    fn length_is_measured_in_characters() {
        let question = "é".repeat(40);
        assert!(question.len() > ALWAYS_COMPLEX_LEN);
        assert!(!is_complex(&question));
    }
}
