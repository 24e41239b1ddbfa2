//! Plan steps and the best-effort parser that turns free-form model output
//! into an ordered plan.
//!
//! Model output is not guaranteed to follow the requested format, so parsing
//! never fails: a numbered-header scan is tried first, then a looser
//! line-by-line scan, and finally a fixed three-step default plan.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Number declared in the plan text; not necessarily contiguous.
    pub number: u32,
    pub title: String,
    pub description: String,
    pub result: String,
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(number: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            description: description.into(),
            result: String::new(),
            status: StepStatus::Pending,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanParseError {
    #[error("step number {0:?} is out of range")]
    InvalidStepNumber(String),
}

// "<n><. : )><whitespace><title>", optionally behind markdown heading or
// emphasis markers.
static STEP_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#{1,6}[ \t]*)?(?:\*\*)?(\d+)[.:)](?:\*\*)?[ \t]+(\S.*)$")
        .expect("step header pattern is valid")
});

static LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.:)]?").expect("leading marker pattern is valid"));

/// The plan used whenever nothing usable can be parsed.
pub fn default_plan() -> Vec<PlanStep> {
    vec![
        PlanStep::new(
            1,
            "Research the question",
            "Gather relevant information about the topic",
        ),
        PlanStep::new(
            2,
            "Analyze key components",
            "Break down the question into manageable parts",
        ),
        PlanStep::new(
            3,
            "Formulate comprehensive answer",
            "Combine findings into a clear response",
        ),
    ]
}

/// Parse raw planning output into steps. Always returns at least one step.
pub fn parse_plan_steps(raw: &str) -> Vec<PlanStep> {
    if raw.trim().is_empty() {
        warn!("plan text is empty, using default plan");
        return default_plan();
    }

    let steps = match scan_numbered_headers(raw) {
        Ok(steps) if !steps.is_empty() => steps,
        Ok(_) => {
            debug!("no numbered step headers found, scanning lines");
            scan_numbered_lines(raw)
        }
        Err(err) => {
            warn!(error = %err, "plan parsing failed, using default plan");
            return default_plan();
        }
    };

    if steps.is_empty() {
        warn!("plan text contained no steps, using default plan");
        return default_plan();
    }
    steps
}

/// Primary scan: every numbered header starts a step, and the lines up to the
/// next header form its description.
fn scan_numbered_headers(raw: &str) -> Result<Vec<PlanStep>, PlanParseError> {
    let mut steps: Vec<PlanStep> = Vec::new();
    let mut description: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some((number, title)) = match_header(trimmed)? {
            if let Some(previous) = steps.last_mut() {
                previous.description = join_description(&description);
            }
            description.clear();
            steps.push(PlanStep::new(number, title, ""));
        } else if !steps.is_empty() {
            description.push(trimmed);
        }
    }

    if let Some(last) = steps.last_mut() {
        last.description = join_description(&description);
    }
    Ok(steps)
}

fn match_header(line: &str) -> Result<Option<(u32, String)>, PlanParseError> {
    let Some(captures) = STEP_HEADER.captures(line) else {
        return Ok(None);
    };
    let digits = &captures[1];
    let number: u32 = digits
        .parse()
        .map_err(|_| PlanParseError::InvalidStepNumber(digits.to_string()))?;
    if number == 0 {
        return Ok(None);
    }
    let title = strip_emphasis(&captures[2]);
    if title.is_empty() {
        return Ok(None);
    }
    Ok(Some((number, title)))
}

/// Fallback scan: any line starting with a digit becomes a step, numbered by
/// position.
fn scan_numbered_lines(raw: &str) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let title = LEADING_MARKER.replace(trimmed, "");
        let title = strip_emphasis(&title);
        if title.is_empty() {
            continue;
        }
        let number = steps.len() as u32 + 1;
        steps.push(PlanStep::new(number, title, ""));
    }
    steps
}

/// Drops markdown bold markers wherever they sit, e.g. `**Research**: ...`.
fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").trim().trim_matches('*').trim().to_string()
}

fn join_description(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}
