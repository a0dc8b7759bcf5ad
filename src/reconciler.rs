//! Entity reconciler
//!
//! Merges every recognizer candidate into one non-overlapping, start-ordered
//! entity list:
//!
//! 1. Drop low-confidence candidates and known false positives.
//! 2. Resolve overlaps greedily by `(type rank, -length, -confidence, start, end)`.
//! 3. Merge adjacent person fragments.
//! 4. Rescan for further occurrences of accepted names.
//! 5. Optionally add names proposed by the classifier adapter.
//!
//! Steps 1-4 are deterministic and idempotent on their own output.

use crate::adapter::Oracle;
use crate::config::ReconcilerConfig;
use crate::error::{DisclosureError, Result};
use crate::span::{Span, TextIndex};
use crate::types::{Entity, EntityType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Confidence for name occurrences found by rescanning
const RESCAN_CONFIDENCE: f64 = 0.85;

/// Phone numbers that are really document ids keep no valid area prefix
const AREA_PREFIXES: [&str; 5] = ["07", "08", "031", "040", "046"];

/// Shortest person text used for rescanning
const MIN_RESCAN_CHARS: usize = 2;

/// Aggregate figures over a reconciled entity list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatistics {
    pub total: usize,
    pub by_type: BTreeMap<EntityType, usize>,
    pub mean_confidence: f64,
    pub unique_texts: usize,
}

/// Deterministic candidate merger
pub struct Reconciler {
    config: ReconcilerConfig,
    exclude_patterns: Vec<Regex>,
    exclude_texts: HashSet<String>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Result<Self> {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    DisclosureError::Config(format!("Invalid exclude pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let exclude_texts = config.exclude_texts.iter().cloned().collect();
        Ok(Self {
            config,
            exclude_patterns,
            exclude_texts,
        })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile candidates against `text` (steps 1-4)
    pub fn reconcile(&self, candidates: Vec<Entity>, text: &str) -> Vec<Entity> {
        self.reconcile_indexed(candidates, &TextIndex::new(text))
    }

    /// Same as [`reconcile`](Self::reconcile) over a prebuilt index
    pub fn reconcile_indexed(&self, candidates: Vec<Entity>, index: &TextIndex<'_>) -> Vec<Entity> {
        let filtered: Vec<Entity> = candidates
            .into_iter()
            .filter(|e| self.keep(e, index))
            .collect();
        let resolved = self.resolve_overlaps(filtered);
        self.expand(resolved, index)
    }

    /// Steps 1-4, then consult the adapter for names the local passes
    /// missed. Adapter failures leave the local result untouched.
    pub async fn reconcile_with_adapter(
        &self,
        candidates: Vec<Entity>,
        index: &TextIndex<'_>,
        oracle: Option<&Oracle>,
    ) -> Vec<Entity> {
        let local = self.reconcile_indexed(candidates, index);
        let Some(oracle) = oracle.filter(|_| self.config.adapter_names) else {
            return local;
        };

        let suggestions = match oracle.detect_names(index.text()).await {
            Ok(suggestions) => suggestions,
            Err(_) => return local,
        };

        let mut entities = local;
        let mut added = 0;
        for suggestion in suggestions {
            if suggestion.confidence < self.config.min_confidence {
                continue;
            }
            for span in word_occurrences(index, suggestion.text.trim(), false) {
                let entity = Entity::new(
                    index.slice(span),
                    EntityType::Person,
                    span,
                    suggestion.confidence,
                    "adapter",
                );
                if self.keep(&entity, index) && !entities.iter().any(|e| e.span.overlaps(&span)) {
                    entities.push(entity);
                    added += 1;
                }
            }
        }
        tracing::debug!(count = added, "Adapter names accepted");

        if added == 0 {
            return entities;
        }
        entities.sort_by_key(|e| (e.span.start, e.span.end));
        self.expand(entities, index)
    }

    /// Step 1: confidence floor, exclusions, span integrity
    fn keep(&self, entity: &Entity, index: &TextIndex<'_>) -> bool {
        if entity.confidence < self.config.min_confidence {
            return false;
        }
        if !index.is_valid(entity.span) || index.slice(entity.span) != entity.text {
            return false;
        }
        if self.exclude_texts.contains(entity.text.trim()) {
            return false;
        }
        if self.exclude_patterns.iter().any(|p| p.is_match(&entity.text)) {
            return false;
        }
        !(entity.entity_type == EntityType::Phone && looks_like_document_id(&entity.text))
    }

    /// Step 2: greedy acceptance in priority order
    fn resolve_overlaps(&self, mut candidates: Vec<Entity>) -> Vec<Entity> {
        candidates.sort_by(|a, b| {
            let key = |e: &Entity| {
                (
                    self.config.priority_rank(e.entity_type),
                    Reverse(e.span.len()),
                )
            };
            key(a)
                .cmp(&key(b))
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.span.cmp(&b.span))
        });

        let mut accepted: Vec<Entity> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !accepted.iter().any(|e| e.overlaps(&candidate)) {
                accepted.push(candidate);
            }
        }
        accepted.sort_by_key(|e| (e.span.start, e.span.end));
        accepted
    }

    /// Steps 3-4 repeated until rescanning finds nothing new
    fn expand(&self, entities: Vec<Entity>, index: &TextIndex<'_>) -> Vec<Entity> {
        let mut entities = self.merge_adjacent_persons(entities, index);
        if !self.config.rescan_names || RESCAN_CONFIDENCE < self.config.min_confidence {
            return entities;
        }
        loop {
            let added = self.rescan_names(&mut entities, index);
            if added == 0 {
                return entities;
            }
            entities = self.merge_adjacent_persons(entities, index);
        }
    }

    /// Step 3: person fragments separated by at most `merge_gap` codepoints
    /// become one entity spanning both, with the mean confidence
    fn merge_adjacent_persons(&self, entities: Vec<Entity>, index: &TextIndex<'_>) -> Vec<Entity> {
        let mut result: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut group: Vec<Entity> = Vec::new();

        for entity in entities {
            if entity.entity_type != EntityType::Person {
                flush_group(&mut group, &mut result, index);
                result.push(entity);
                continue;
            }
            let adjacent = group
                .last()
                .and_then(|last| last.span.gap_to(&entity.span))
                .is_some_and(|gap| gap <= self.config.merge_gap);
            if !adjacent {
                flush_group(&mut group, &mut result, index);
            }
            group.push(entity);
        }
        flush_group(&mut group, &mut result, index);
        result
    }

    /// Step 4: find further occurrences of accepted names. Returns the
    /// number of entities added; `entities` stays start-ordered.
    fn rescan_names(&self, entities: &mut Vec<Entity>, index: &TextIndex<'_>) -> usize {
        let names: BTreeSet<String> = entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Person)
            .map(|e| e.text.clone())
            .filter(|t| t.chars().count() >= MIN_RESCAN_CHARS)
            .collect();

        let mut added = 0;
        for name in &names {
            for span in word_occurrences(index, name, true) {
                if entities.iter().any(|e| e.span.overlaps(&span)) {
                    continue;
                }
                let entity = Entity::new(
                    index.slice(span),
                    EntityType::Person,
                    span,
                    RESCAN_CONFIDENCE,
                    "rescan",
                );
                if self.keep(&entity, index) {
                    entities.push(entity);
                    added += 1;
                }
            }
        }
        if added > 0 {
            entities.sort_by_key(|e| (e.span.start, e.span.end));
            tracing::debug!(count = added, "Rescan found further name occurrences");
        }
        added
    }

    /// Totals, per-type counts, mean confidence and distinct texts
    pub fn statistics(entities: &[Entity]) -> EntityStatistics {
        let mut by_type = BTreeMap::new();
        for entity in entities {
            *by_type.entry(entity.entity_type).or_insert(0) += 1;
        }
        let mean_confidence = if entities.is_empty() {
            0.0
        } else {
            entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64
        };
        let unique_texts = entities
            .iter()
            .map(|e| e.text.as_str())
            .collect::<HashSet<_>>()
            .len();
        EntityStatistics {
            total: entities.len(),
            by_type,
            mean_confidence,
            unique_texts,
        }
    }
}

fn flush_group(group: &mut Vec<Entity>, result: &mut Vec<Entity>, index: &TextIndex<'_>) {
    match group.len() {
        0 => {}
        1 => result.extend(group.drain(..)),
        n => {
            let span = group
                .iter()
                .skip(1)
                .fold(group[0].span, |acc, e| acc.union(&e.span));
            let confidence = group.iter().map(|e| e.confidence).sum::<f64>() / n as f64;
            group.clear();
            result.push(Entity::new(
                index.slice(span),
                EntityType::Person,
                span,
                confidence,
                "merge",
            ));
        }
    }
}

/// Eight bare digits without a valid area prefix
fn looks_like_document_id(text: &str) -> bool {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    digits.len() == 8
        && digits.chars().all(|c| c.is_ascii_digit())
        && !AREA_PREFIXES.iter().any(|p| digits.starts_with(p))
}

/// Word-bounded occurrences of `name`. With `genitive` the search is
/// case-insensitive and a trailing possessive `s` is included.
fn word_occurrences(index: &TextIndex<'_>, name: &str, genitive: bool) -> Vec<Span> {
    if name.is_empty() {
        return Vec::new();
    }
    let pattern = if genitive {
        format!(r"(?i)\b{}s?\b", regex::escape(name))
    } else {
        format!(r"\b{}\b", regex::escape(name))
    };
    match Regex::new(&pattern) {
        Ok(re) => re
            .find_iter(index.text())
            .map(|m| index.span_from_bytes(m.start(), m.end()))
            .collect(),
        Err(e) => {
            tracing::warn!(name, error = %e, "Could not build name search pattern");
            Vec::new()
        }
    }
}
