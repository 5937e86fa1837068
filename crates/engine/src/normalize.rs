//! Deterministic cleanup of raw transaction descriptions into the canonical
//! comparison key used by every rule type.
//!
//! The base pass is deliberately conservative: it strips obvious artifacts
//! (auth codes, trailing phone numbers, dates, dash noise) while preserving
//! merchant-identifying text, including short numbers that are part of the
//! merchant's identity ("76", "7-ELEVEN", "STORE #5678").

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Hard cap on fixed-point iteration. Exceeding it means two normalization
/// steps keep rewriting each other's output, which is a defect in the rules
/// themselves, not a runtime condition to paper over.
const MAX_PASSES: usize = 10;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("normalization did not reach a fixed point for {input:?} within {passes} passes")]
    NoFixedPoint { input: String, passes: usize },
}

static LONG_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{8,}\b").unwrap());
static TRAILING_PHONE_10: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{3}-\d{3}-\d{4}\s*$").unwrap());
static TRAILING_PHONE_7: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{3}-\d{4}\s*$").unwrap());
static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap());
static STAR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").unwrap());
static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{3,}").unwrap());
static LONE_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-\s+").unwrap());
static EDGE_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-\s*|\s*-\s*$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DASH_RUN_BEFORE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}\s*(\d+)").unwrap());
static DASH_RUN_2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-{2,}\s*").unwrap());
static MID_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s-\s").unwrap());
static TRAILING_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s-\s*$").unwrap());
static DIGIT_RUN_3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{3,}").unwrap());
static TRAILING_SHORT_NUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s\d{1,2}$").unwrap());

/// Normalize a raw description into its canonical lowercase form.
///
/// Total function: never fails, maps the empty string to the empty string.
/// The regex surgery runs on the original casing; lowercasing is the final
/// step.
pub fn normalize(raw: &str) -> String {
    let mut desc = raw.trim().to_string();

    // Digit runs of 8+ are auth/transaction codes, never merchant identity.
    desc = LONG_DIGIT_RUN.replace_all(&desc, "").into_owned();

    // Trailing phone numbers: NNN-NNN-NNNN, then the short NNN-NNNN form.
    desc = TRAILING_PHONE_10.replace_all(&desc, "").into_owned();
    desc = TRAILING_PHONE_7.replace_all(&desc, "").into_owned();

    desc = DATE_TOKEN.replace_all(&desc, "").into_owned();
    desc = STAR_RUN.replace_all(&desc, "*").into_owned();

    // Dash cleanup: long runs become a space, space-surrounded single
    // dashes vanish, leading/trailing dashes are stripped.
    desc = DASH_RUN.replace_all(&desc, " ").into_owned();
    desc = LONE_DASH.replace_all(&desc, " ").into_owned();
    desc = EDGE_DASH.replace_all(&desc, "").into_owned();

    desc = WHITESPACE.replace_all(&desc, " ").into_owned();
    desc.trim().to_lowercase()
}

/// Normalize and additionally extract digit runs of length >= 3 into a side
/// list, for callers that want to keep store-number evidence separately.
///
/// Dash noise is removed more aggressively than in [`normalize`], but
/// in-token hyphens survive ("1-800-CONTACTS" keeps its structure while
/// trailing dash noise is dropped).
pub fn normalize_with_numbers(raw: &str) -> (String, Vec<String>) {
    let mut desc = raw.trim().to_uppercase();
    desc = WHITESPACE.replace_all(&desc, " ").into_owned();
    desc = STAR_RUN.replace_all(&desc, "*").into_owned();

    // Dash cleanup, order matters: runs followed by digits keep the digits,
    // remaining runs and dangling hyphens become whitespace.
    desc = DASH_RUN_BEFORE_DIGITS.replace_all(&desc, " ${1}").into_owned();
    desc = DASH_RUN_2.replace_all(&desc, " ").into_owned();
    desc = MID_DASH.replace_all(&desc, " ").into_owned();
    desc = TRAILING_DASH.replace_all(&desc, "").into_owned();
    desc = keep_in_token_hyphens(&desc);

    let mut numbers = Vec::new();
    for m in DIGIT_RUN_3.find_iter(&desc) {
        numbers.push(m.as_str().to_string());
    }
    let mut core = DIGIT_RUN_3.replace_all(&desc, "").into_owned();

    // Dangling 1-2 digit tokens at the end carry no merchant signal.
    core = TRAILING_SHORT_NUM.replace_all(&core, "").into_owned();
    core = WHITESPACE.replace_all(&core, " ").into_owned();

    (core.trim().to_lowercase(), numbers)
}

/// Keep a hyphen only when both neighbours are alphanumeric; everything
/// else becomes a space. The regex crate has no lookaround, so this is a
/// character scan.
fn keep_in_token_hyphens(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' {
            let prev_ok = i > 0 && chars[i - 1].is_ascii_alphanumeric();
            let next_ok = i + 1 < chars.len() && chars[i + 1].is_ascii_alphanumeric();
            out.push(if prev_ok && next_ok { '-' } else { ' ' });
        } else {
            out.push(c);
        }
    }
    out
}

/// Apply [`normalize`] repeatedly until the output stabilizes, so artifacts
/// created by one pass are cleaned by the next. The base pass is
/// non-expansive, so a fixed point is reached almost immediately in
/// practice; hitting the cap is surfaced as an error.
pub fn iterative_normalize(raw: &str) -> Result<String, NormalizeError> {
    let mut current = normalize(raw);
    for _ in 0..MAX_PASSES {
        let next = normalize(&current);
        if next == current {
            return Ok(current);
        }
        current = next;
    }
    Err(NormalizeError::NoFixedPoint {
        input: raw.to_string(),
        passes: MAX_PASSES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_phone_number() {
        assert_eq!(normalize("NETFLIX.COM 408-540-3700"), "netflix.com");
        assert_eq!(normalize("PIZZA PLACE 555-1234"), "pizza place");
    }

    #[test]
    fn preserves_store_numbers() {
        let out = normalize("STARBUCKS STORE #12345 SAN DIEGO CA");
        assert!(out.contains("store #12345"), "got {out:?}");
    }

    #[test]
    fn strips_long_digit_runs_but_not_short_ones() {
        assert_eq!(normalize("7-ELEVEN STORE 12345678901234"), "7-eleven store");
        assert_eq!(normalize("COSTCO WHSE #1234 92121"), "costco whse #1234 92121");
    }

    #[test]
    fn strips_date_tokens() {
        assert_eq!(normalize("UBER TRIP 03/15/2024"), "uber trip");
        assert_eq!(normalize("UBER TRIP 3/5/24"), "uber trip");
    }

    #[test]
    fn collapses_asterisk_runs() {
        assert_eq!(normalize("PAYPAL ***NETFLIX"), "paypal *netflix");
    }

    #[test]
    fn cleans_dash_noise() {
        assert_eq!(normalize("MERCHANT --- NAME"), "merchant name");
        assert_eq!(normalize("MERCHANT - NAME"), "merchant name");
        assert_eq!(normalize("- MERCHANT -"), "merchant");
    }

    #[test]
    fn empty_input_maps_to_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "STARBUCKS STORE #12345 SAN DIEGO CA",
            "Netflix.com 408-540-3700",
            "UBER *TRIP 866-576-1039",
            "PayPal *Netflix 402-935-7733",
            "TST* RESTAURANT NAME 858-123-4567",
            "1-800-CONTACTS INC. 800-266-8888",
            "76 GAS STATION #5678",
            "85C BAKERY CAFE SAN DIEGO",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn iterative_normalize_reaches_fixed_point() {
        let out = iterative_normalize("UBER *TRIP 866-576-1039").unwrap();
        assert_eq!(out, normalize(&out));
    }

    #[test]
    fn with_numbers_extracts_digit_runs() {
        let (core, numbers) = normalize_with_numbers("COSTCO WHSE #1234 92121");
        assert_eq!(core, "costco whse #");
        assert_eq!(numbers, vec!["1234", "92121"]);
    }

    #[test]
    fn with_numbers_keeps_in_token_hyphens() {
        let (core, _) = normalize_with_numbers("1-800-CONTACTS INC.");
        assert!(core.starts_with("1-"), "got {core:?}");
    }

    #[test]
    fn with_numbers_drops_dangling_short_number() {
        let (core, _) = normalize_with_numbers("SHELL OIL 57");
        assert_eq!(core, "shell oil");
    }
}
