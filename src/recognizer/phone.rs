//! Swedish phone numbers

use super::{compile_patterns, entity_at, no_patterns, plausible_month_day, FirstWins};
use super::RecognizerPass;
use crate::error::Result;
use crate::span::TextIndex;
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

const CONFIDENCE: f64 = 0.90;

fn phone_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_patterns(
            "phone",
            &[
                // Mobile: 070-123 45 67, 0701234567, 070-1234567, +46 70 123 45 67
                r"\b07\d[-\s]?\d{3}[-\s]?\d{2}[-\s]?\d{2}\b",
                r"\b07\d{8}\b",
                r"\b07\d[-\s]?\d{7}\b",
                r"\+46[-\s]?7\d[-\s]?\d{3}[-\s]?\d{2}[-\s]?\d{2}",
                r"\+46[-\s]?7\d[-\s]?\d{7}",
                // Stockholm
                r"\b08[-\s]?\d{3}[-\s]?\d{2}[-\s]?\d{2}\b",
                r"\b08[-\s]?\d{6,8}\b",
                r"\+46[-\s]?8[-\s]?\d{6,8}",
                // Göteborg
                r"\b031[-\s]?\d{2}[-\s]?\d{2}[-\s]?\d{2,3}\b",
                r"\b031[-\s]?\d{6,8}\b",
                r"\+46[-\s]?31[-\s]?\d{6,8}",
                // Malmö
                r"\b040[-\s]?\d{2}[-\s]?\d{2}[-\s]?\d{2}\b",
                r"\b040[-\s]?\d{6,8}\b",
                // Other three- and two-digit area codes
                r"\b0\d{2}[-\s]?\d{2,3}[-\s]?\d{2}[-\s]?\d{2}\b",
                r"\b0\d[-\s]?\d{3}[-\s]?\d{2}[-\s]?\d{2}\b",
                r"\b0\d{3}[-\s]?\d{6}\b",
                // International
                r"\+46[-\s]?\d{1,3}[-\s]?\d{6,8}",
                // 031-36 78 361 and XXXX-XXXXXX
                r"\b\d{3}-\d{2}[-\s]?\d{2}[-\s]?\d{2,3}\b",
                r"\b\d{4}-\d{6}\b",
            ],
        )
    })
}

fn area_code_prefix() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^0\d{1,3}[-\s]").ok())
        .as_ref()
}

/// True when a phone-shaped candidate is more plausibly a personal
/// identity number: ten or twelve digits forming a plausible date, not
/// written with an area code.
pub fn looks_like_ssn(candidate: &str) -> bool {
    if candidate.starts_with("07") || candidate.starts_with("+46") {
        return false;
    }
    if area_code_prefix().is_some_and(|re| re.is_match(candidate)) {
        return false;
    }

    let stripped: String = candidate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '/')
        .collect();
    if !stripped.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = stripped.chars().filter_map(|c| c.to_digit(10)).collect();
    let (month, day) = match digits.len() {
        10 if digits[0] == 0 => return false,
        10 => (digits[2] * 10 + digits[3], digits[4] * 10 + digits[5]),
        12 => (digits[4] * 10 + digits[5], digits[6] * 10 + digits[7]),
        _ => return false,
    };
    plausible_month_day(month, day)
}

/// Phone number pass
pub struct PhonePass;

impl RecognizerPass for PhonePass {
    fn name(&self) -> &str {
        "phone"
    }

    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let patterns = phone_patterns();
        if patterns.is_empty() {
            return Err(no_patterns(self.name()));
        }

        let text = index.text();
        let mut seen = FirstWins::default();
        let mut found = Vec::new();

        for pattern in patterns {
            for m in pattern.find_iter(text) {
                if looks_like_ssn(m.as_str()) {
                    continue;
                }
                if !seen.try_accept(m.start(), m.end()) {
                    continue;
                }
                found.push(entity_at(
                    index,
                    m.start(),
                    m.end(),
                    EntityType::Phone,
                    CONFIDENCE,
                    self.name(),
                ));
            }
        }
        Ok(found)
    }
}
