//! Swedish personal identity numbers (personnummer / samordningsnummer)

use super::{compile_patterns, entity_at, no_patterns, plausible_month_day, FirstWins};
use super::RecognizerPass;
use crate::error::Result;
use crate::span::TextIndex;
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

/// Confidence for numbers that pass the check digit
const VALIDATED: f64 = 0.99;
/// Confidence for numbers that fail (or skip) the check digit
const UNVALIDATED: f64 = 0.7;

/// Unhyphenated numbers starting with these are phone numbers
const AREA_PREFIXES: [&str; 5] = ["07", "08", "031", "040", "046"];

/// Patterns tried in order; group 1 is the date part, group 2 the last four
fn ssn_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_patterns(
            "ssn",
            &[
                // YYYYMMDD-XXXX, `+` for people over 100
                r"\b((?:18|19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01]|[6-9]\d))[-+](\d{4})\b",
                // YYYYMMDD-XXXX, implausible dates included
                r"\b(\d{8})[-+](\d{4})\b",
                // YYMMDD-XXXX
                r"\b(\d{6})[-+](\d{4})\b",
                // YYYYMMDDXXXX
                r"\b((?:18|19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01]|[6-9]\d))(\d{4})\b",
                // YYMMDDXXXX
                r"\b(\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01]|[6-9]\d))(\d{4})\b",
            ],
        )
    })
}

/// Validate a personal identity number.
///
/// `date_part` is `YYMMDD` or `YYYYMMDD`, `check_part` the last four
/// digits. The normalized ten digits must carry a plausible month and day
/// and satisfy the Luhn mod-10 check.
pub fn validate(date_part: &str, check_part: &str) -> bool {
    let date_part = if date_part.len() == 8 {
        date_part.get(2..).unwrap_or(date_part)
    } else {
        date_part
    };

    let digits: Vec<u32> = date_part
        .chars()
        .chain(check_part.chars())
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.len() != 10 || date_part.len() + check_part.len() != 10 {
        return false;
    }

    let month = digits[2] * 10 + digits[3];
    let day = digits[4] * 10 + digits[5];
    if !plausible_month_day(month, day) {
        return false;
    }

    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10 == digits[9]
}

/// Digits of a national id, for format-insensitive comparison.
///
/// Twelve-digit forms are reduced to ten digits.
pub fn normalize_national_id(id: &str) -> String {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 12 {
        digits[2..].to_string()
    } else {
        digits
    }
}

/// Personal identity number pass
pub struct SsnPass {
    validate_luhn: bool,
}

impl SsnPass {
    pub fn new(validate_luhn: bool) -> Self {
        Self { validate_luhn }
    }
}

impl Default for SsnPass {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RecognizerPass for SsnPass {
    fn name(&self) -> &str {
        "ssn"
    }

    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let patterns = ssn_patterns();
        if patterns.is_empty() {
            return Err(no_patterns(self.name()));
        }

        let text = index.text();
        let mut seen = FirstWins::default();
        let mut found = Vec::new();

        for pattern in patterns {
            for caps in pattern.captures_iter(text) {
                let (Some(full), Some(date), Some(check)) = (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                let literal = full.as_str();
                let separated = literal.contains(['-', '+']);
                if !separated && AREA_PREFIXES.iter().any(|p| literal.starts_with(p)) {
                    continue;
                }
                if !seen.try_accept(full.start(), full.end()) {
                    continue;
                }

                let confidence = if !self.validate_luhn || validate(date.as_str(), check.as_str()) {
                    VALIDATED
                } else {
                    UNVALIDATED
                };
                found.push(entity_at(
                    index,
                    full.start(),
                    full.end(),
                    EntityType::Ssn,
                    confidence,
                    self.name(),
                ));
            }
        }
        Ok(found)
    }
}
