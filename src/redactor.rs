//! Redactor
//!
//! Applies decided dispositions to the text. Replacements are written in
//! descending start order so earlier offsets stay valid; [`rebuild`] is the
//! equivalent span-indexed construction.

use crate::config::{MaskingConfig, MaskingStyle};
use crate::error::DisclosureError;
use crate::party::{known_person_texts, person_key};
use crate::policy::Decision;
use crate::span::{Span, TextIndex};
use crate::types::{Disposition, Entity, EntityType, SensitivityAssessment};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

const BLOCK: &str = "████████";
const BLOCK_GLYPH: char = '█';
const PARTIAL_MASK: &str = "***";
const REST_MASKED: &str = "[RESTERANDE TEXT MASKERAD]";

fn sentence_end() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s+").ok()).as_ref()
}

/// Per-run pseudonym assignments: `Person A`, `Person B`, ... in
/// first-seen order, then `Person 27`, `Person 28`, ...
///
/// Persons are keyed by party when attributed, otherwise by case-folded
/// text with a genitive `s` dropped.
#[derive(Debug, Clone, Default)]
pub struct PseudonymContext {
    assigned: HashMap<String, String>,
    known: HashSet<String>,
}

impl PseudonymContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable pseudonym for `text` within this context
    pub fn pseudonym_for(&mut self, text: &str) -> String {
        let next = self.assigned.len();
        self.assigned
            .entry(text.to_string())
            .or_insert_with(|| pseudonym(next))
            .clone()
    }

    /// Stable pseudonym for a person entity
    pub fn pseudonym_for_entity(&mut self, entity: &Entity) -> String {
        let key = match &entity.party_id {
            Some(party) => format!("party:{}", party),
            None => format!("text:{}", person_key(&entity.text, &self.known)),
        };
        self.pseudonym_for(&key)
    }

    /// Remember the person texts of a document so genitive forms resolve
    /// to their bare name
    pub fn observe(&mut self, entities: &[Entity]) {
        self.known.extend(known_person_texts(entities));
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn reset(&mut self) {
        self.assigned.clear();
        self.known.clear();
    }
}

fn pseudonym(n: usize) -> String {
    match u8::try_from(n) {
        Ok(i) if i < 26 => format!("Person {}", char::from(b'A' + i)),
        _ => format!("Person {}", n + 1),
    }
}

/// One rewritten span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingAudit {
    pub original: String,
    pub replacement: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub action: Disposition,
    #[serde(flatten)]
    pub span: Span,
    pub reason: String,
}

/// Aggregate redaction counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskingStatistics {
    pub total: usize,
    pub masked: usize,
    pub released: usize,
    /// `masked / max(total, 1)`
    pub masking_ratio: f64,
    pub by_action: BTreeMap<Disposition, usize>,
    pub masked_by_type: BTreeMap<EntityType, usize>,
    pub released_by_type: BTreeMap<EntityType, usize>,
}

/// Redactor output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redaction {
    pub masked_text: String,
    pub audit: Vec<MaskingAudit>,
    pub released: Vec<Entity>,
    pub statistics: MaskingStatistics,
}

/// Span rewriter
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    config: MaskingConfig,
}

impl Redactor {
    pub fn new(config: MaskingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaskingConfig {
        &self.config
    }

    /// Replacement text for a masked entity
    pub fn replacement(
        &self,
        entity: &Entity,
        disposition: Disposition,
        pseudonyms: &mut PseudonymContext,
    ) -> String {
        match disposition {
            Disposition::Release => entity.text.clone(),
            Disposition::MaskPartial => self.partial(&entity.text),
            Disposition::MaskComplete => self.complete(entity, pseudonyms),
        }
    }

    fn partial(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        match chars.as_slice() {
            [first, middle @ .., last] if chars.len() > 4 => {
                let hidden = if self.config.preserve_length {
                    "*".repeat(middle.len())
                } else {
                    PARTIAL_MASK.to_string()
                };
                format!("{}{}{}", first, hidden, last)
            }
            _ => PARTIAL_MASK.to_string(),
        }
    }

    fn complete(&self, entity: &Entity, pseudonyms: &mut PseudonymContext) -> String {
        let wants_pseudonym =
            self.config.pseudonyms || self.config.style == MaskingStyle::Pseudonym;
        if wants_pseudonym && entity.entity_type == EntityType::Person {
            return pseudonyms.pseudonym_for_entity(entity);
        }

        match self.config.style {
            MaskingStyle::Brackets | MaskingStyle::Pseudonym => self.bracket(entity.entity_type),
            MaskingStyle::Blocks => {
                if self.config.preserve_length {
                    std::iter::repeat(BLOCK_GLYPH)
                        .take(entity.text.chars().count())
                        .collect()
                } else {
                    BLOCK.to_string()
                }
            }
            MaskingStyle::Placeholder => match entity.entity_type {
                EntityType::Ssn
                | EntityType::Phone
                | EntityType::Email
                | EntityType::Person
                | EntityType::Address => format!("<{}>", entity.entity_type.mask_label()),
                _ => "<MASKERAT>".to_string(),
            },
        }
    }

    fn bracket(&self, entity_type: EntityType) -> String {
        if self.config.show_entity_type {
            format!("[MASKERAT: {}]", entity_type.mask_label())
        } else {
            "[MASKERAT]".to_string()
        }
    }

    /// Apply `decisions[i]` to `entities[i]`.
    ///
    /// An entity without a decision is masked completely, as is the span of
    /// an entity whose text does not match it. Overlapping entities are
    /// rewritten as one unit over their union with the most severe
    /// disposition among them.
    pub fn redact(
        &self,
        text: &str,
        entities: &[Entity],
        decisions: &[Decision],
        pseudonyms: &mut PseudonymContext,
    ) -> Redaction {
        let index = TextIndex::new(text);
        pseudonyms.observe(entities);

        let mut units: Vec<Unit> = entities
            .iter()
            .enumerate()
            .filter_map(|(i, entity)| Unit::resolve(&index, i, entity, decisions.get(i)))
            .collect();
        units.sort_by_key(|u| (u.span, u.entity));

        let mut groups: Vec<(Span, Vec<Unit>)> = Vec::new();
        for unit in units {
            match groups.last_mut() {
                Some((span, group)) if unit.span.start < span.end => {
                    *span = span.union(&unit.span);
                    group.push(unit);
                }
                _ => groups.push((unit.span, vec![unit])),
            }
        }

        let mut audit = Vec::new();
        let mut released = Vec::new();
        let mut statistics = MaskingStatistics::default();

        for (span, group) in groups {
            let Some(lead) = group.iter().min_by_key(|u| Reverse(u.action)) else {
                continue;
            };
            let action = lead.action;
            if group.len() > 1 {
                tracing::warn!(
                    span = %span,
                    entities = group.len(),
                    action = %action,
                    "Overlapping entities rewritten as one"
                );
            }

            for unit in &group {
                let entity_type = entities[unit.entity].entity_type;
                statistics.total += 1;
                *statistics.by_action.entry(action).or_insert(0) += 1;
                if action.is_masked() {
                    statistics.masked += 1;
                    *statistics.masked_by_type.entry(entity_type).or_insert(0) += 1;
                } else {
                    statistics.released += 1;
                    *statistics.released_by_type.entry(entity_type).or_insert(0) += 1;
                    released.push(entities[unit.entity].clone());
                }
            }

            if action.is_masked() {
                let mut target = entities[lead.entity].clone();
                target.span = span;
                target.text = index.slice(span).to_string();
                audit.push(MaskingAudit {
                    replacement: self.replacement(&target, action, pseudonyms),
                    original: target.text,
                    entity_type: target.entity_type,
                    action,
                    span,
                    reason: lead.reason.clone(),
                });
            }
        }
        statistics.masking_ratio = statistics.masked as f64 / statistics.total.max(1) as f64;

        let mut masked_text = text.to_string();
        for entry in audit.iter().rev() {
            masked_text.replace_range(index.byte_range(entry.span), &entry.replacement);
        }

        Redaction {
            masked_text,
            audit,
            released,
            statistics,
        }
    }

    /// Rewrite of one whole section, or `None` when the section keeps its
    /// entity-level rendering.
    ///
    /// MaskComplete replaces the section with a category tag; MaskPartial
    /// keeps the first sentence and masks the rest.
    pub fn section_replacement(
        &self,
        index: &TextIndex<'_>,
        assessment: &SensitivityAssessment,
        disposition: Disposition,
    ) -> Option<(Span, String)> {
        if !index.is_valid(assessment.span) {
            return None;
        }
        match disposition {
            Disposition::Release => None,
            Disposition::MaskComplete => Some((
                assessment.span,
                format!(
                    "[SEKTION MASKERAD: {} - {}]",
                    assessment.primary_category, assessment.legal_basis
                ),
            )),
            Disposition::MaskPartial => {
                let section = index.slice(assessment.span);
                let m = sentence_end()?.find(section)?;
                if m.end() == section.len() {
                    return None;
                }
                let offset = index.char_at(index.byte_at(assessment.span.start) + m.start() + 1);
                Some((
                    Span::new(offset, assessment.span.end),
                    format!(" {}", REST_MASKED),
                ))
            }
        }
    }

    /// Render `masked_text` with whole sections rewritten.
    ///
    /// Entity replacements inside a rewritten region are superseded by the
    /// section replacement; the rest are kept.
    pub fn mask_sections(
        &self,
        text: &str,
        redaction: &Redaction,
        sections: &[(&SensitivityAssessment, Disposition)],
    ) -> String {
        let index = TextIndex::new(text);
        let regions: Vec<(Span, String)> = sections
            .iter()
            .filter_map(|(assessment, disposition)| {
                self.section_replacement(&index, assessment, *disposition)
            })
            .collect();
        if regions.is_empty() {
            return redaction.masked_text.clone();
        }

        let mut replacements: Vec<(Span, String)> = redaction
            .audit
            .iter()
            .filter(|a| !regions.iter().any(|(region, _)| region.overlaps(&a.span)))
            .map(|a| (a.span, a.replacement.clone()))
            .collect();
        replacements.extend(regions);
        rebuild(text, &replacements)
    }
}

/// One entity ready for rewriting
struct Unit {
    entity: usize,
    span: Span,
    action: Disposition,
    reason: String,
}

impl Unit {
    fn resolve(
        index: &TextIndex<'_>,
        i: usize,
        entity: &Entity,
        decision: Option<&Decision>,
    ) -> Option<Self> {
        let (mut action, mut reason) = match decision {
            Some(decision) => (decision.disposition, decision.reason.clone()),
            None => {
                let violation = DisclosureError::PolicyInvariant(format!(
                    "{} entity at {} has no decision",
                    entity.entity_type, entity.span
                ));
                tracing::error!(error = %violation, "Masking undecided entity completely");
                (Disposition::MaskComplete, "Beslut saknas".to_string())
            }
        };

        let len = index.char_len();
        let span = Span::new(entity.span.start.min(len), entity.span.end.min(len));
        if span.is_empty() {
            tracing::error!(
                span = %entity.span,
                "Entity span lies outside the text, not rewritten"
            );
            return None;
        }
        if span != entity.span || index.slice(span) != entity.text {
            tracing::error!(
                span = %entity.span,
                "Entity text does not match its span, masking the span"
            );
            action = Disposition::MaskComplete;
            reason = "Span och text stämmer inte överens".to_string();
        }

        Some(Self {
            entity: i,
            span,
            action,
            reason,
        })
    }
}

/// Build the output left to right from non-overlapping replacements.
///
/// Replacements may be given in any order; invalid or overlapping spans
/// are ignored.
pub fn rebuild(text: &str, replacements: &[(Span, String)]) -> String {
    let index = TextIndex::new(text);
    let mut sorted: Vec<&(Span, String)> = replacements
        .iter()
        .filter(|(span, _)| index.is_valid(*span))
        .collect();
    sorted.sort_by_key(|(span, _)| *span);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in sorted {
        if span.start < cursor {
            continue;
        }
        out.push_str(index.slice(Span::new(cursor, span.start)));
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(index.slice(Span::new(cursor, index.char_len())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssessmentSource, SensitivityCategory, SensitivityLevel};

    fn entity(text: &str, haystack: &str, entity_type: EntityType) -> Entity {
        let byte = haystack.find(text).unwrap();
        let start = haystack[..byte].chars().count();
        Entity::new(
            text,
            entity_type,
            Span::new(start, start + text.chars().count()),
            0.9,
            "test",
        )
    }

    fn mask(reason: &str) -> Decision {
        Decision {
            disposition: Disposition::MaskComplete,
            reason: reason.to_string(),
        }
    }

    fn release(reason: &str) -> Decision {
        Decision {
            disposition: Disposition::Release,
            reason: reason.to_string(),
        }
    }

    fn health_section(span: Span) -> SensitivityAssessment {
        SensitivityAssessment {
            span,
            primary_category: SensitivityCategory::Health,
            secondary_categories: Vec::new(),
            level: SensitivityLevel::Critical,
            default_action: Disposition::MaskComplete,
            confidence: 0.6,
            reasons: Vec::new(),
            keywords: vec!["diabetes".to_string()],
            legal_basis: "OSL 26:1".to_string(),
            source: AssessmentSource::Keywords,
        }
    }

    fn redactor(style: MaskingStyle) -> Redactor {
        Redactor::new(MaskingConfig {
            style,
            ..Default::default()
        })
    }

    #[test]
    fn test_pseudonym_sequence() {
        assert_eq!(pseudonym(0), "Person A");
        assert_eq!(pseudonym(25), "Person Z");
        assert_eq!(pseudonym(26), "Person 27");

        let mut ctx = PseudonymContext::new();
        assert_eq!(ctx.pseudonym_for("Anna"), "Person A");
        assert_eq!(ctx.pseudonym_for("Lars"), "Person B");
        assert_eq!(ctx.pseudonym_for("Anna"), "Person A");
        ctx.reset();
        assert!(ctx.is_empty());
        assert_eq!(ctx.pseudonym_for("Lars"), "Person A");
    }

    #[test]
    fn test_bracket_redaction() {
        let text = "Personnummer: 199001011234";
        let ssn = entity("199001011234", text, EntityType::Ssn);
        let out = redactor(MaskingStyle::Brackets).redact(
            text,
            &[ssn],
            &[mask("ssn")],
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "Personnummer: [MASKERAT: PERSONNUMMER]");
        assert_eq!(out.audit[0].original, "199001011234");
        assert_eq!(out.statistics.masked, 1);
        assert_eq!(out.statistics.masking_ratio, 1.0);
    }

    #[test]
    fn test_styles() {
        let text = "Ring Anna på 070-123 45 67.";
        let anna = entity("Anna", text, EntityType::Person);
        let phone = entity("070-123 45 67", text, EntityType::Phone);
        let entities = [anna, phone];
        let decisions = [mask("a"), mask("b")];

        let blocks = redactor(MaskingStyle::Blocks).redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(blocks.masked_text, "Ring ████████ på ████████.");

        let preserved = Redactor::new(MaskingConfig {
            style: MaskingStyle::Blocks,
            preserve_length: true,
            ..Default::default()
        })
        .redact(text, &entities, &decisions, &mut PseudonymContext::new());
        assert_eq!(preserved.masked_text.chars().count(), text.chars().count());

        let placeholder = redactor(MaskingStyle::Placeholder).redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(placeholder.masked_text, "Ring <PERSON> på <TELEFON>.");

        let pseudonym = redactor(MaskingStyle::Pseudonym).redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(pseudonym.masked_text, "Ring Person A på [MASKERAT: TELEFON].");

        let hidden = Redactor::new(MaskingConfig {
            show_entity_type: false,
            ..Default::default()
        })
        .redact(text, &entities, &decisions, &mut PseudonymContext::new());
        assert_eq!(hidden.masked_text, "Ring [MASKERAT] på [MASKERAT].");
    }

    #[test]
    fn test_partial_mask() {
        let r = Redactor::default();
        assert_eq!(r.partial("Andersson"), "A***n");
        assert_eq!(r.partial("Anna"), "***");
        assert_eq!(r.partial("Åsa"), "***");
    }

    #[test]
    fn test_missing_decision_masks() {
        let text = "Anna och Lars.";
        let entities = [
            entity("Anna", text, EntityType::Person),
            entity("Lars", text, EntityType::Person),
        ];
        let decisions = [Decision {
            disposition: Disposition::Release,
            reason: "egen".to_string(),
        }];
        let out = Redactor::default().redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "Anna och [MASKERAT: PERSON].");
        assert_eq!(out.released.len(), 1);
        assert_eq!(out.statistics.released_by_type.get(&EntityType::Person), Some(&1));
        assert_eq!(out.statistics.masking_ratio, 0.5);
    }

    #[test]
    fn test_descending_rewrite_matches_rebuild() {
        let text = "Åsa Öberg bor på Storgatan 1 och nås på asa@example.se.";
        let entities = vec![
            entity("asa@example.se", text, EntityType::Email),
            entity("Åsa Öberg", text, EntityType::Person),
            entity("Storgatan 1", text, EntityType::Address),
        ];
        let decisions = vec![mask("e"), mask("p"), mask("a")];
        let out = Redactor::default().redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );

        let mut replacements: Vec<(Span, String)> = out
            .audit
            .iter()
            .map(|a| (a.span, a.replacement.clone()))
            .collect();
        replacements.reverse();
        assert_eq!(rebuild(text, &replacements), out.masked_text);
        assert_eq!(
            out.masked_text,
            "[MASKERAT: PERSON] bor på [MASKERAT: ADRESS] och nås på [MASKERAT: E-POST]."
        );
    }

    #[test]
    fn test_overlapping_entities_mask_the_union() {
        let text = "Anna Andersson ringde.";
        let entities = [
            Entity::new("Anna", EntityType::Person, Span::new(0, 4), 0.85, "test"),
            Entity::new("Anna Andersson", EntityType::Person, Span::new(0, 14), 0.85, "test"),
        ];
        let out = Redactor::default().redact(
            text,
            &entities,
            &[release("egen"), mask("tredje part")],
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "[MASKERAT: PERSON] ringde.");
        assert!(out.released.is_empty());
        assert_eq!(out.statistics.masked, 2);
        assert_eq!(out.audit.len(), 1);
        assert_eq!(out.audit[0].span, Span::new(0, 14));
        assert_eq!(out.audit[0].reason, "tredje part");

        // A partial overlap widens the rewrite to both spans
        let entities = [
            Entity::new("Anna Andersson", EntityType::Person, Span::new(0, 14), 0.85, "test"),
            Entity::new("Andersson ringde", EntityType::Misc, Span::new(5, 21), 0.5, "test"),
        ];
        let decisions = [
            release("egen"),
            Decision {
                disposition: Disposition::MaskPartial,
                reason: "nivå".to_string(),
            },
        ];
        let out = Redactor::default().redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "A***e.");
        assert_eq!(out.audit[0].original, "Anna Andersson ringde");
    }

    #[test]
    fn test_mismatched_span_is_masked() {
        let text = "Ring Lars i morgon.";
        let wrong_text = Entity::new("Anna", EntityType::Person, Span::new(5, 9), 0.9, "test");
        let out = Redactor::default().redact(
            text,
            &[wrong_text],
            &[release("egen")],
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "Ring [MASKERAT: PERSON] i morgon.");
        assert_eq!(out.audit[0].original, "Lars");
        assert_eq!(out.audit[0].action, Disposition::MaskComplete);

        let past_end = Entity::new("morgon.", EntityType::Misc, Span::new(12, 40), 0.9, "test");
        let out = Redactor::default().redact(
            text,
            &[past_end],
            &[release("egen")],
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "Ring Lars i [MASKERAT: UPPGIFT]");
    }

    #[test]
    fn test_pseudonyms_follow_case_genitive_and_party() {
        let text = "Anna ringde. ANNA kom. Annas bror Lars.";
        let entities = [
            entity("Anna", text, EntityType::Person),
            entity("ANNA", text, EntityType::Person),
            entity("Annas", text, EntityType::Person),
            entity("Lars", text, EntityType::Person),
        ];
        let decisions = [mask("a"), mask("b"), mask("c"), mask("d")];
        let out = redactor(MaskingStyle::Pseudonym).redact(
            text,
            &entities,
            &decisions,
            &mut PseudonymContext::new(),
        );
        assert_eq!(
            out.masked_text,
            "Person A ringde. Person A kom. Person A bror Person B."
        );

        let text = "Anna Andersson och Anna.";
        let entities = [
            Entity::new("Anna Andersson", EntityType::Person, Span::new(0, 14), 0.85, "test")
                .with_party("P1"),
            Entity::new("Anna", EntityType::Person, Span::new(19, 23), 0.85, "test")
                .with_party("P1"),
        ];
        let out = redactor(MaskingStyle::Pseudonym).redact(
            text,
            &entities,
            &[mask("a"), mask("b")],
            &mut PseudonymContext::new(),
        );
        assert_eq!(out.masked_text, "Person A och Person A.");
    }

    #[test]
    fn test_section_renderings() {
        let text = "Anna ringde.\n\nHon har diabetes. Behandlingen fortsätter.";
        let redactor = Redactor::default();
        let redaction = redactor.redact(
            text,
            &[entity("Anna", text, EntityType::Person)],
            &[mask("p")],
            &mut PseudonymContext::new(),
        );
        let index = TextIndex::new(text);
        let start = index.char_at(text.find("Hon").unwrap());
        let health = health_section(Span::new(start, index.char_len()));

        let complete =
            redactor.mask_sections(text, &redaction, &[(&health, Disposition::MaskComplete)]);
        assert_eq!(
            complete,
            "[MASKERAT: PERSON] ringde.\n\n[SEKTION MASKERAD: HEALTH - OSL 26:1]"
        );

        let partial =
            redactor.mask_sections(text, &redaction, &[(&health, Disposition::MaskPartial)]);
        assert_eq!(
            partial,
            "[MASKERAT: PERSON] ringde.\n\nHon har diabetes. [RESTERANDE TEXT MASKERAD]"
        );

        let released =
            redactor.mask_sections(text, &redaction, &[(&health, Disposition::Release)]);
        assert_eq!(released, redaction.masked_text);
    }

    #[test]
    fn test_partial_section_needs_two_sentences() {
        let text = "Hon har diabetes sedan barndomen och tar insulin.";
        let index = TextIndex::new(text);
        let health = health_section(Span::new(0, index.char_len()));
        assert!(Redactor::default()
            .section_replacement(&index, &health, Disposition::MaskPartial)
            .is_none());
    }
}
