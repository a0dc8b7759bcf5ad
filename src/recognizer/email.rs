//! Email addresses

use super::{entity_at, no_patterns, RecognizerPass};
use crate::error::Result;
use crate::span::TextIndex;
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

const CONFIDENCE: f64 = 0.99;

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").ok())
        .as_ref()
}

/// Email address pass
pub struct EmailPass;

impl RecognizerPass for EmailPass {
    fn name(&self) -> &str {
        "email"
    }

    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let pattern = email_pattern().ok_or_else(|| no_patterns(self.name()))?;
        Ok(pattern
            .find_iter(index.text())
            .map(|m| {
                entity_at(
                    index,
                    m.start(),
                    m.end(),
                    EntityType::Email,
                    CONFIDENCE,
                    self.name(),
                )
            })
            .collect())
    }
}
