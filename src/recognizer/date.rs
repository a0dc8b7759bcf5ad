//! Dates in ISO and Swedish forms

use super::{compile_patterns, entity_at, no_patterns, FirstWins, RecognizerPass};
use crate::error::Result;
use crate::span::TextIndex;
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

const CONFIDENCE: f64 = 0.95;

fn date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_patterns(
            "date",
            &[
                r"\b\d{4}-\d{2}-\d{2}\b",
                r"\b\d{2}[/-]\d{2}[/-]\d{4}\b",
                r"(?i)\b\d{1,2}\s+(?:januari|februari|mars|april|maj|juni|juli|augusti|september|oktober|november|december)\s+\d{4}\b",
            ],
        )
    })
}

/// Date pass
pub struct DatePass;

impl RecognizerPass for DatePass {
    fn name(&self) -> &str {
        "date"
    }

    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let patterns = date_patterns();
        if patterns.is_empty() {
            return Err(no_patterns(self.name()));
        }

        let mut seen = FirstWins::default();
        let mut found = Vec::new();
        for pattern in patterns {
            for m in pattern.find_iter(index.text()) {
                if seen.try_accept(m.start(), m.end()) {
                    found.push(entity_at(
                        index,
                        m.start(),
                        m.end(),
                        EntityType::Date,
                        CONFIDENCE,
                        self.name(),
                    ));
                }
            }
        }
        Ok(found)
    }
}
