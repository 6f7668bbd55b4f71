//! Splits a raw case payload into steps and expected result.
//!
//! Case text arrives semi-structured: usually `Кроки: ...<br>Очікуваний
//! результат: ...`, sometimes without the line break, and older cases list
//! steps separated by semicolons.

use regex::Regex;
use std::sync::LazyLock;

/// Shown when a case carries no separate expected result ("see case description")
pub const EXPECTED_RESULT_PLACEHOLDER: &str = "Див. опис кейсу";

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br>").expect("valid regex"));
static RESULT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Очікуваний результат:").expect("valid regex"));
static STEPS_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Кроки[:\s]*").expect("valid regex"));
static RESULT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Очікуваний результат[:\s]*").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCase {
    pub steps: String,
    pub expected_result: String,
}

pub fn parse(raw: &str) -> ParsedCase {
    let parts = if let Some(marker) = LINE_BREAK.find(raw) {
        Some((&raw[..marker.start()], &raw[marker.end()..]))
    } else {
        // Label stays with the second part and is stripped below
        RESULT_LABEL
            .find(raw)
            .map(|label| (&raw[..label.start()], &raw[label.start()..]))
    };

    let (steps, expected_result) = match parts {
        Some((steps, result)) => (
            STEPS_PREFIX.replace(steps, "").trim().to_string(),
            RESULT_PREFIX.replace(result, "").trim().to_string(),
        ),
        None => (raw.to_string(), EXPECTED_RESULT_PLACEHOLDER.to_string()),
    };

    ParsedCase {
        steps: bullet_legacy_steps(steps),
        expected_result,
    }
}

/// `a; b; c` on one line becomes one bullet per step.
fn bullet_legacy_steps(steps: String) -> String {
    if !steps.contains(';') || steps.contains('\n') {
        return steps;
    }

    steps
        .split(';')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(|step| format!("• {}", step))
        .collect::<Vec<_>>()
        .join("\n")
}
