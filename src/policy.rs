//! Disclosure policy engine
//!
//! Decides, per entity, whether it is released or masked for a given
//! requester. Rules are evaluated in a fixed order and the first match
//! wins:
//!
//! 1. literal match on a requester-owned identifier ⇒ release
//! 2. personal identity numbers ⇒ complete mask
//! 3. explicit party role
//! 4. ownership of overlapping sensitive statements
//! 5. section sensitivity level
//! 6. per-type default, with `Assess` resolved by requester strictness
//!
//! Every ambiguous path resolves to masking.

use crate::party::PartyGraph;
use crate::recognizer::ssn::normalize_national_id;
use crate::types::{
    ActionDefault, Disposition, Entity, EntityType, PersonRole, Requester, RequesterType,
    SensitiveStatement, SensitivityAssessment, SensitivityLevel, Strictness,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of one policy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub disposition: Disposition,
    /// Short audit reason
    pub reason: String,
}

impl Decision {
    fn new(disposition: Disposition, reason: impl Into<String>) -> Self {
        Self {
            disposition,
            reason: reason.into(),
        }
    }

    fn release(reason: impl Into<String>) -> Self {
        Self::new(Disposition::Release, reason)
    }

    fn mask(reason: impl Into<String>) -> Self {
        Self::new(Disposition::MaskComplete, reason)
    }
}

/// Identifiers that belong to the requester
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequesterIdentity {
    pub party_id: Option<String>,
    names: Vec<String>,
    national_ids: Vec<String>,
}

impl RequesterIdentity {
    /// Collect the requester's names and national ids from the descriptor
    /// and, when resolvable, from the requester's party.
    pub fn resolve(requester: &Requester, graph: &PartyGraph) -> Self {
        let party_id = graph.resolve_requester(requester);
        let mut identity = Self {
            party_id: party_id.clone(),
            ..Default::default()
        };

        if let Some(national_id) = requester.national_id.as_deref() {
            identity.push_national_id(national_id);
        }
        if let Some(name) = requester.name.as_deref() {
            identity.push_name(name);
        }
        if let Some(party) = party_id.as_deref().and_then(|id| graph.get(id)) {
            for name in party.names() {
                identity.push_name(name);
            }
            if let Some(national_id) = party.national_id.as_deref() {
                identity.push_national_id(national_id);
            }
        }
        identity
    }

    fn push_name(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    fn push_national_id(&mut self, national_id: &str) {
        let id = normalize_national_id(national_id);
        if !id.is_empty() && !self.national_ids.contains(&id) {
            self.national_ids.push(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.party_id.is_none() && self.names.is_empty() && self.national_ids.is_empty()
    }

    /// Whether the entity's literal text is one of the requester's own
    /// identifiers
    pub fn owns(&self, entity: &Entity) -> bool {
        match entity.entity_type {
            EntityType::Ssn => {
                let id = normalize_national_id(&entity.text);
                !id.is_empty() && self.national_ids.contains(&id)
            }
            EntityType::Person => {
                if self.party_id.is_some() && entity.party_id == self.party_id {
                    return true;
                }
                let text = entity.text.trim().to_lowercase();
                self.names.iter().any(|name| {
                    text == *name
                        || text
                            .strip_suffix('s')
                            .is_some_and(|stem| stem == name.as_str())
                })
            }
            _ => false,
        }
    }
}

/// Everything the engine needs to know about one request
#[derive(Debug, Clone)]
pub struct PolicyContext<'a> {
    pub requester: &'a Requester,
    pub identity: RequesterIdentity,
    pub statements: &'a [SensitiveStatement],
}

impl<'a> PolicyContext<'a> {
    pub fn new(
        requester: &'a Requester,
        graph: &PartyGraph,
        statements: &'a [SensitiveStatement],
    ) -> Self {
        Self {
            requester,
            identity: RequesterIdentity::resolve(requester, graph),
            statements,
        }
    }

    fn is_public(&self) -> bool {
        self.requester.requester_type == RequesterType::Public
    }
}

/// Rule-ordered disclosure policy
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    type_defaults: HashMap<EntityType, ActionDefault>,
}

impl PolicyEngine {
    /// Engine with the default per-type table
    pub fn new() -> Self {
        Self {
            type_defaults: EntityType::ALL
                .iter()
                .map(|t| (*t, ActionDefault::for_type(*t)))
                .collect(),
        }
    }

    /// Override the fallback action for one entity type
    pub fn with_type_default(mut self, entity_type: EntityType, action: ActionDefault) -> Self {
        self.type_defaults.insert(entity_type, action);
        self
    }

    pub fn type_default(&self, entity_type: EntityType) -> ActionDefault {
        self.type_defaults
            .get(&entity_type)
            .copied()
            .unwrap_or(ActionDefault::MaskComplete)
    }

    /// Decide one entity given the section it sits in
    pub fn decide(
        &self,
        entity: &Entity,
        section: Option<&SensitivityAssessment>,
        ctx: &PolicyContext<'_>,
    ) -> Decision {
        if ctx.identity.owns(entity) {
            return Decision::release("Beställarens egen uppgift");
        }

        if entity.entity_type == EntityType::Ssn {
            return Decision::mask("Personnummer maskeras alltid");
        }

        match entity.role {
            Some(PersonRole::Requester) => return Decision::release("Roll: beställare"),
            Some(PersonRole::Professional) => return Decision::release("Roll: tjänsteperson"),
            Some(PersonRole::Reporter) => return Decision::mask("Roll: anmälare"),
            Some(PersonRole::ThirdParty) => return Decision::mask("Roll: tredje part"),
            _ => {}
        }

        if let Some(decision) = self.ownership(entity, ctx) {
            return decision;
        }

        if let Some(section) = section {
            match section.level {
                SensitivityLevel::Critical | SensitivityLevel::High => {
                    return Decision::mask(format!("Sektionens känslighetsnivå {}", section.level));
                }
                SensitivityLevel::Medium => {
                    return Decision::new(
                        Disposition::MaskPartial,
                        format!("Sektionens känslighetsnivå {}", section.level),
                    );
                }
                SensitivityLevel::Low => {}
            }
        }

        let reason = format!("Standard för {}", entity.entity_type.mask_label());
        match self.type_default(entity.entity_type) {
            ActionDefault::Release => Decision::release(reason),
            ActionDefault::MaskPartial => Decision::new(Disposition::MaskPartial, reason),
            ActionDefault::MaskComplete => Decision::mask(reason),
            ActionDefault::Assess => match ctx.requester.strictness() {
                Strictness::Relaxed => Decision::release(format!("{}, lättnad prövning", reason)),
                Strictness::Moderate | Strictness::Strict => {
                    Decision::mask(format!("{}, strikt prövning", reason))
                }
            },
        }
    }

    /// Ownership refinement over statements overlapping the entity.
    ///
    /// Releases only when every overlapping statement concerns the
    /// requester's own party.
    fn ownership(&self, entity: &Entity, ctx: &PolicyContext<'_>) -> Option<Decision> {
        let mut overlapping = ctx
            .statements
            .iter()
            .filter(|s| s.span.overlaps(&entity.span))
            .peekable();
        overlapping.peek()?;

        if ctx.is_public() {
            return Some(Decision::mask("Allmänheten: omvänt skaderekvisit"));
        }

        let requester_party = ctx.identity.party_id.as_deref();
        for statement in overlapping {
            if requester_party == Some(statement.owner_party_id.as_str()) {
                continue;
            }
            if requester_party.is_some_and(|p| statement.protect_from.iter().any(|id| id == p)) {
                return Some(Decision::mask("Skyddas mot beställaren"));
            }
            if statement.disclosed_by_party_id.as_deref() == Some(statement.owner_party_id.as_str())
            {
                return Some(Decision::mask("Uppgift lämnad av den enskilde om sig själv"));
            }
            return Some(Decision::mask("Uppgiften rör annan part"));
        }
        Some(Decision::release("Uppgiften rör beställaren"))
    }

    /// Decide every entity against its most sensitive overlapping section
    pub fn decide_all(
        &self,
        entities: &[Entity],
        assessments: &[SensitivityAssessment],
        ctx: &PolicyContext<'_>,
    ) -> Vec<Decision> {
        entities
            .iter()
            .map(|entity| {
                let section = assessments
                    .iter()
                    .filter(|a| a.span.overlaps(&entity.span))
                    .max_by_key(|a| a.level);
                self.decide(entity, section, ctx)
            })
            .collect()
    }

    /// Decide a whole section: its default action, except that a section
    /// owned by the requester is released and a public requester never
    /// gets a section above LOW released.
    pub fn decide_section(
        &self,
        assessment: &SensitivityAssessment,
        ctx: &PolicyContext<'_>,
    ) -> Decision {
        let level = assessment.level;
        if ctx.is_public() {
            if level > SensitivityLevel::Low && !assessment.default_action.is_masked() {
                return Decision::new(
                    level.default_action(),
                    format!("Allmänheten: nivå {}", level),
                );
            }
            return Decision::new(assessment.default_action, format!("Nivå {}", level));
        }

        let owned = ctx.identity.party_id.as_deref().is_some_and(|party| {
            ctx.statements
                .iter()
                .any(|s| s.span == assessment.span && s.owner_party_id == party)
        });
        if owned {
            return Decision::release("Uppgiften rör beställaren");
        }
        Decision::new(assessment.default_action, format!("Nivå {}", level))
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;
    use crate::types::{AssessmentSource, Party, SensitivityCategory};

    fn entity(text: &str, entity_type: EntityType, start: usize) -> Entity {
        Entity::new(
            text,
            entity_type,
            Span::new(start, start + text.chars().count()),
            0.9,
            "test",
        )
    }

    fn section(span: Span, level: SensitivityLevel) -> SensitivityAssessment {
        SensitivityAssessment {
            span,
            primary_category: SensitivityCategory::Health,
            secondary_categories: vec![],
            level,
            default_action: level.default_action(),
            confidence: 0.6,
            reasons: vec![],
            keywords: vec![],
            legal_basis: "OSL 26:1".to_string(),
            source: AssessmentSource::Keywords,
        }
    }

    fn graph() -> PartyGraph {
        PartyGraph::new(vec![
            Party {
                id: "P1".to_string(),
                name: "Anna Andersson".to_string(),
                national_id: Some("19811218-9876".to_string()),
                role: PersonRole::Subject,
                relation: None,
                is_minor: false,
                aliases: vec!["Anna".to_string()],
                mentions: vec![Span::new(0, 14)],
            },
            Party {
                id: "P2".to_string(),
                name: "Lars".to_string(),
                national_id: None,
                role: PersonRole::Unknown,
                relation: Some("pappa".to_string()),
                is_minor: false,
                aliases: vec![],
                mentions: vec![],
            },
        ])
    }

    fn statement(span: Span, owner: &str) -> SensitiveStatement {
        SensitiveStatement {
            span,
            owner_party_id: owner.to_string(),
            disclosed_by_party_id: None,
            category: SensitivityCategory::Health,
            level: SensitivityLevel::Critical,
            protect_from: vec![],
        }
    }

    #[test]
    fn test_public_masks_everything_personal() {
        let engine = PolicyEngine::new();
        let requester = Requester::public();
        let graph = graph();
        let ctx = PolicyContext::new(&requester, &graph, &[]);

        for (text, entity_type) in [
            ("Anna", EntityType::Person),
            ("811218-9876", EntityType::Ssn),
            ("070-123 45 67", EntityType::Phone),
            ("anna@example.se", EntityType::Email),
        ] {
            let decision = engine.decide(&entity(text, entity_type, 0), None, &ctx);
            assert!(decision.disposition.is_masked(), "{} released", text);
        }
    }

    #[test]
    fn test_ssn_released_only_to_owner() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let ssn = entity("198112189876", EntityType::Ssn, 0);

        let owner = Requester::new(RequesterType::SubjectSelf);
        let ctx = PolicyContext::new(&owner, &graph, &[]);
        assert_eq!(engine.decide(&ssn, None, &ctx).disposition, Disposition::Release);

        let parent = Requester::new(RequesterType::Parent).with_consent(true);
        let ctx = PolicyContext::new(&parent, &graph, &[]);
        assert_eq!(engine.decide(&ssn, None, &ctx).disposition, Disposition::MaskComplete);
    }

    #[test]
    fn test_requester_name_and_genitive() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let requester = Requester::public().with_name("Anna Andersson");
        let ctx = PolicyContext::new(&requester, &graph, &[]);

        let decision = engine.decide(&entity("Annas", EntityType::Person, 40), None, &ctx);
        assert_eq!(decision.disposition, Disposition::Release);
        let decision = engine.decide(&entity("Lars", EntityType::Person, 40), None, &ctx);
        assert_eq!(decision.disposition, Disposition::MaskComplete);
    }

    #[test]
    fn test_role_rules() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let requester = Requester::new(RequesterType::SubjectSelf);
        let ctx = PolicyContext::new(&requester, &graph, &[]);
        let critical = section(Span::new(0, 100), SensitivityLevel::Critical);

        let professional = entity("Karin", EntityType::Person, 20).with_role(PersonRole::Professional);
        assert_eq!(
            engine.decide(&professional, Some(&critical), &ctx).disposition,
            Disposition::Release
        );
        let reporter = entity("Karin", EntityType::Person, 20).with_role(PersonRole::Reporter);
        assert_eq!(
            engine.decide(&reporter, None, &ctx).disposition,
            Disposition::MaskComplete
        );
    }

    #[test]
    fn test_section_levels() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let requester = Requester::new(RequesterType::LegalGuardian);
        let ctx = PolicyContext::new(&requester, &graph, &[]);
        let karin = entity("Karin", EntityType::Person, 20);

        let medium = section(Span::new(0, 100), SensitivityLevel::Medium);
        assert_eq!(
            engine.decide(&karin, Some(&medium), &ctx).disposition,
            Disposition::MaskPartial
        );
        let low = section(Span::new(0, 100), SensitivityLevel::Low);
        assert_eq!(engine.decide(&karin, Some(&low), &ctx).disposition, Disposition::Release);
    }

    #[test]
    fn test_self_disclosure_released_regardless_of_level() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let statements = vec![statement(Span::new(0, 100), "P1")];
        let requester = Requester::new(RequesterType::OtherParty).with_party("P1");
        let ctx = PolicyContext::new(&requester, &graph, &statements);
        let critical = section(Span::new(0, 100), SensitivityLevel::Critical);

        let date = entity("2024-01-15", EntityType::Date, 30);
        assert_eq!(
            engine.decide(&date, Some(&critical), &ctx).disposition,
            Disposition::Release
        );
        assert_eq!(
            engine.decide_section(&critical, &ctx).disposition,
            Disposition::Release
        );
    }

    #[test]
    fn test_ownership_masks_other_parties() {
        let engine = PolicyEngine::new();
        let graph = graph();
        let mut protected = statement(Span::new(0, 100), "P1");
        protected.protect_from = vec!["P2".to_string()];
        let statements = vec![protected];
        let requester = Requester::new(RequesterType::Parent).with_party("P2");
        let ctx = PolicyContext::new(&requester, &graph, &statements);

        let decision = engine.decide(&entity("Stockholm", EntityType::Location, 10), None, &ctx);
        assert_eq!(decision.disposition, Disposition::MaskComplete);
        assert_eq!(decision.reason, "Skyddas mot beställaren");

        let public = Requester::public();
        let ctx = PolicyContext::new(&public, &graph, &statements);
        let decision = engine.decide(&entity("Stockholm", EntityType::Location, 10), None, &ctx);
        assert_eq!(decision.disposition, Disposition::MaskComplete);
    }

    #[test]
    fn test_assess_by_strictness() {
        let engine = PolicyEngine::new();
        let graph = PartyGraph::default();
        let karin = entity("Karin", EntityType::Person, 0);

        let authority = Requester::new(RequesterType::Authority);
        let ctx = PolicyContext::new(&authority, &graph, &[]);
        assert_eq!(engine.decide(&karin, None, &ctx).disposition, Disposition::MaskComplete);

        let consenting = authority.clone().with_consent(true);
        let ctx = PolicyContext::new(&consenting, &graph, &[]);
        assert_eq!(engine.decide(&karin, None, &ctx).disposition, Disposition::Release);
    }

    #[test]
    fn test_type_default_override() {
        let engine =
            PolicyEngine::new().with_type_default(EntityType::Date, ActionDefault::MaskComplete);
        let requester = Requester::new(RequesterType::SubjectSelf);
        let graph = PartyGraph::default();
        let ctx = PolicyContext::new(&requester, &graph, &[]);
        let date = entity("2024-01-15", EntityType::Date, 0);
        assert_eq!(engine.decide(&date, None, &ctx).disposition, Disposition::MaskComplete);
    }

    #[test]
    fn test_public_section_never_released_above_low() {
        let engine = PolicyEngine::new();
        let graph = PartyGraph::default();
        let requester = Requester::public();
        let ctx = PolicyContext::new(&requester, &graph, &[]);
        let mut medium = section(Span::new(0, 100), SensitivityLevel::Medium);
        medium.default_action = Disposition::Release;
        assert_eq!(
            engine.decide_section(&medium, &ctx).disposition,
            Disposition::MaskPartial
        );
    }

    #[test]
    fn test_decide_all_uses_most_sensitive_section() {
        let engine = PolicyEngine::new();
        let graph = PartyGraph::default();
        let requester = Requester::new(RequesterType::SubjectSelf);
        let ctx = PolicyContext::new(&requester, &graph, &[]);
        let sections = vec![
            section(Span::new(0, 60), SensitivityLevel::Low),
            section(Span::new(40, 120), SensitivityLevel::High),
        ];
        let entities = vec![
            entity("Karin", EntityType::Person, 10),
            entity("Stockholm", EntityType::Location, 50),
        ];
        let decisions = engine.decide_all(&entities, &sections, &ctx);
        assert_eq!(decisions[0].disposition, Disposition::Release);
        assert_eq!(decisions[1].disposition, Disposition::MaskComplete);
    }
}
