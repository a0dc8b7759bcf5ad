//! Pattern recognizer
//!
//! Independent regex sub-passes that emit candidate entities with a
//! confidence attached. Passes never look at each other's output;
//! cross-type overlap is resolved by the reconciler.

pub mod date;
pub mod email;
pub mod name;
pub mod phone;
pub mod ssn;

pub use date::DatePass;
pub use email::EmailPass;
pub use name::NamePass;
pub use phone::PhonePass;
pub use ssn::{validate, SsnPass};

use crate::config::RecognizerConfig;
use crate::error::{DisclosureError, Result};
use crate::span::{Span, TextIndex};
use crate::types::Entity;
use regex::Regex;

/// One recognizer sub-pass
///
/// A pass reads the document and returns candidates with codepoint spans.
/// Returning an error marks only this pass as failed.
pub trait RecognizerPass: Send + Sync {
    /// Stable pass name used in logs and entity `source`
    fn name(&self) -> &str;

    /// Scan the document for candidates
    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>>;
}

/// Runs every enabled sub-pass over a document
pub struct Recognizer {
    passes: Vec<Box<dyn RecognizerPass>>,
}

impl Recognizer {
    /// Create a recognizer without any passes
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// Create a recognizer with the built-in passes enabled in `config`
    pub fn from_config(config: &RecognizerConfig) -> Self {
        let mut recognizer = Self::empty();
        if config.ssn {
            recognizer = recognizer.with_pass(SsnPass::new(config.validate_luhn));
        }
        if config.phone {
            recognizer = recognizer.with_pass(PhonePass);
        }
        if config.email {
            recognizer = recognizer.with_pass(EmailPass);
        }
        if config.date {
            recognizer = recognizer.with_pass(DatePass);
        }
        if config.names {
            recognizer = recognizer.with_pass(NamePass);
        }
        recognizer
    }

    /// Register an additional pass
    pub fn with_pass(mut self, pass: impl RecognizerPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of the registered passes, in run order
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass and collect the candidates.
    ///
    /// A failing pass is logged and contributes nothing. If every pass
    /// fails the document cannot be reviewed and `RecognizerFailure` is
    /// returned.
    pub fn recognize(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for pass in &self.passes {
            match pass.scan(index) {
                Ok(found) => {
                    let before = found.len();
                    let valid: Vec<Entity> = found
                        .into_iter()
                        .filter(|e| span_matches(index, e))
                        .collect();
                    if valid.len() != before {
                        tracing::warn!(
                            pass = pass.name(),
                            dropped = before - valid.len(),
                            "Recognizer pass produced invalid spans"
                        );
                    }
                    tracing::debug!(pass = pass.name(), count = valid.len(), "Recognizer pass done");
                    candidates.extend(valid);
                }
                Err(e) => {
                    tracing::warn!(pass = pass.name(), error = %e, "Recognizer pass failed");
                    failures.push(format!("{}: {}", pass.name(), e));
                }
            }
        }

        if !self.passes.is_empty() && failures.len() == self.passes.len() {
            return Err(DisclosureError::RecognizerFailure(failures.join("; ")));
        }
        Ok(candidates)
    }
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::from_config(&RecognizerConfig::default())
    }
}

fn span_matches(index: &TextIndex<'_>, entity: &Entity) -> bool {
    index.is_valid(entity.span) && index.slice(entity.span) == entity.text
}

/// Compile built-in patterns, dropping (and logging) any that fail
pub(crate) fn compile_patterns(pass: &str, patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pass, pattern = *p, error = %e, "Dropping invalid built-in pattern");
                None
            }
        })
        .collect()
}

/// Error for a pass whose pattern table is unusable
pub(crate) fn no_patterns(pass: &str) -> DisclosureError {
    DisclosureError::Recognition {
        pass: pass.to_string(),
        reason: "no usable patterns".to_string(),
    }
}

/// Accepts byte ranges in pattern order; later matches overlapping an
/// earlier accepted one are skipped
#[derive(Default)]
pub(crate) struct FirstWins {
    accepted: Vec<(usize, usize)>,
}

impl FirstWins {
    pub(crate) fn try_accept(&mut self, start: usize, end: usize) -> bool {
        if self.accepted.iter().any(|&(s, e)| start < e && s < end) {
            return false;
        }
        self.accepted.push((start, end));
        true
    }
}

/// Month 01-12 and day 01-31, or 61-91 for coordination numbers
pub fn plausible_month_day(month: u32, day: u32) -> bool {
    (1..=12).contains(&month) && ((1..=31).contains(&day) || (61..=91).contains(&day))
}

pub(crate) fn entity_at(
    index: &TextIndex<'_>,
    start: usize,
    end: usize,
    entity_type: crate::types::EntityType,
    confidence: f64,
    source: &str,
) -> Entity {
    let span: Span = index.span_from_bytes(start, end);
    Entity::new(index.slice(span), entity_type, span, confidence, source)
}
