//! Core data model for disclosure review
//!
//! All label-like values (entity types, roles, levels, categories, actions)
//! are closed enums. Free-form labels coming from outside the crate are
//! mapped through the `from_label` tables here; anything unrecognized maps
//! to an explicit `Unknown`/`Neutral` variant.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of a recognized text span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Ssn,
    Phone,
    Email,
    Address,
    Org,
    Location,
    Date,
    Misc,
}

impl EntityType {
    /// Every entity type, in the default overlap-priority order
    pub const ALL: [EntityType; 9] = [
        EntityType::Ssn,
        EntityType::Email,
        EntityType::Phone,
        EntityType::Person,
        EntityType::Org,
        EntityType::Location,
        EntityType::Address,
        EntityType::Date,
        EntityType::Misc,
    ];

    /// Swedish label used in bracket replacements
    pub fn mask_label(&self) -> &'static str {
        match self {
            Self::Ssn => "PERSONNUMMER",
            Self::Phone => "TELEFON",
            Self::Email => "E-POST",
            Self::Person => "PERSON",
            Self::Address => "ADRESS",
            Self::Org => "ORGANISATION",
            Self::Location => "PLATS",
            Self::Date => "DATUM",
            Self::Misc => "UPPGIFT",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Person => "PERSON",
            Self::Ssn => "SSN",
            Self::Phone => "PHONE",
            Self::Email => "EMAIL",
            Self::Address => "ADDRESS",
            Self::Org => "ORG",
            Self::Location => "LOCATION",
            Self::Date => "DATE",
            Self::Misc => "MISC",
        };
        write!(f, "{}", s)
    }
}

/// Role a person holds in a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonRole {
    Subject,
    Requester,
    RequesterChild,
    Reporter,
    ThirdParty,
    Professional,
    Unknown,
}

impl PersonRole {
    /// Closed role-label table for classifier output.
    ///
    /// Parent labels are treated as third parties: a parent who is also
    /// the requester is released through the requester's own identifiers.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "SUBJECT" => Self::Subject,
            "REQUESTER" => Self::Requester,
            "REQUESTER_CHILD" | "CHILD" => Self::RequesterChild,
            "REPORTER" => Self::Reporter,
            "PROFESSIONAL" => Self::Professional,
            "THIRD_PARTY" | "PARENT_1" | "PARENT_2" => Self::ThirdParty,
            _ => Self::Unknown,
        }
    }
}

impl Default for PersonRole {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A recognized span of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Exact slice of the original text covered by `span`
    pub text: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    #[serde(flatten)]
    pub span: Span,

    /// Detection confidence in `[0, 1]`
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<PersonRole>,

    /// Id of the party this entity belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<String>,

    /// Which recognizer pass or stage produced the entity (audit only)
    #[serde(default)]
    pub source: String,
}

impl Entity {
    pub fn new(
        text: impl Into<String>,
        entity_type: EntityType,
        span: Span,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            entity_type,
            span,
            confidence: confidence.clamp(0.0, 1.0),
            role: None,
            party_id: None,
            source: source.into(),
        }
    }

    pub fn with_role(mut self, role: PersonRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_party(mut self, party_id: impl Into<String>) -> Self {
        self.party_id = Some(party_id.into());
        self
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.span.overlaps(&other.span)
    }
}

/// A person or role-holder referenced in a case document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    pub role: PersonRole,
    /// Free-text relation label (e.g. "mamma", "barn")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default)]
    pub is_minor: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<Span>,
}

impl Party {
    /// Canonical name followed by aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_mentioned_at(&self, span: &Span) -> bool {
        self.mentions.iter().any(|m| m == span)
    }
}

/// Sensitivity level, totally ordered LOW < MEDIUM < HIGH < CRITICAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SensitivityLevel {
    /// Canonical ordering table; every level comparison goes through here
    fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Default action for a section at this level
    pub fn default_action(&self) -> Disposition {
        match self {
            Self::Critical | Self::High => Disposition::MaskComplete,
            Self::Medium => Disposition::MaskPartial,
            Self::Low => Disposition::Release,
        }
    }
}

impl Default for SensitivityLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl PartialOrd for SensitivityLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SensitivityLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Category of sensitive content (OSL 26)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityCategory {
    Health,
    MentalHealth,
    Addiction,
    Violence,
    Family,
    Economy,
    Housing,
    Sexual,
    Criminal,
    Neutral,
}

impl SensitivityCategory {
    /// Unknown labels map to `Neutral`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "HEALTH" => Self::Health,
            "MENTAL_HEALTH" => Self::MentalHealth,
            "ADDICTION" => Self::Addiction,
            "VIOLENCE" => Self::Violence,
            "FAMILY" => Self::Family,
            "ECONOMY" => Self::Economy,
            "HOUSING" => Self::Housing,
            "SEXUAL" => Self::Sexual,
            "CRIMINAL" => Self::Criminal,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for SensitivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Health => "HEALTH",
            Self::MentalHealth => "MENTAL_HEALTH",
            Self::Addiction => "ADDICTION",
            Self::Violence => "VIOLENCE",
            Self::Family => "FAMILY",
            Self::Economy => "ECONOMY",
            Self::Housing => "HOUSING",
            Self::Sexual => "SEXUAL",
            Self::Criminal => "CRIMINAL",
            Self::Neutral => "NEUTRAL",
        };
        write!(f, "{}", s)
    }
}

/// Final disclosure decision for an entity or section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Release,
    MaskPartial,
    MaskComplete,
}

impl Disposition {
    pub fn is_masked(&self) -> bool {
        !matches!(self, Self::Release)
    }

    /// `ASSESS` and unknown labels yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "RELEASE" => Some(Self::Release),
            "MASK_PARTIAL" => Some(Self::MaskPartial),
            "MASK_COMPLETE" => Some(Self::MaskComplete),
            _ => None,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Release => "RELEASE",
            Self::MaskPartial => "MASK_PARTIAL",
            Self::MaskComplete => "MASK_COMPLETE",
        };
        write!(f, "{}", s)
    }
}

/// Per-type fallback action; `Assess` is resolved by requester strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionDefault {
    Release,
    MaskPartial,
    MaskComplete,
    Assess,
}

impl ActionDefault {
    pub fn for_type(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Ssn | EntityType::Phone | EntityType::Email | EntityType::Address => {
                Self::MaskComplete
            }
            EntityType::Org | EntityType::Location | EntityType::Date => Self::Release,
            EntityType::Person | EntityType::Misc => Self::Assess,
        }
    }
}

/// A sensitive passage and whom it concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveStatement {
    #[serde(flatten)]
    pub span: Span,
    /// Party the information is about
    pub owner_party_id: String,
    /// Party who told it, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosed_by_party_id: Option<String>,
    pub category: SensitivityCategory,
    pub level: SensitivityLevel,
    /// Parties that must not see this passage
    #[serde(default)]
    pub protect_from: Vec<String>,
}

/// Where an assessment's category and level came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Keywords,
    Adapter,
}

/// Sensitivity judgment for one section of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAssessment {
    #[serde(flatten)]
    pub span: Span,
    pub primary_category: SensitivityCategory,
    #[serde(default)]
    pub secondary_categories: Vec<SensitivityCategory>,
    pub level: SensitivityLevel,
    pub default_action: Disposition,
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub legal_basis: String,
    pub source: AssessmentSource,
}

/// Kind of party requesting disclosure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequesterType {
    SubjectSelf,
    Parent,
    ChildOver15,
    LegalGuardian,
    OtherParty,
    Authority,
    Public,
}

impl Default for RequesterType {
    fn default() -> Self {
        Self::Public
    }
}

/// How generously the `Assess` fallback is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strictness {
    Strict,
    Moderate,
    Relaxed,
}

/// Who is asking for the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requester {
    #[serde(rename = "type", default)]
    pub requester_type: RequesterType,
    /// Party id of the requester within the document, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_party_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Consent from the individual the case concerns
    #[serde(default)]
    pub consent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_context: Option<String>,
}

impl Requester {
    pub fn new(requester_type: RequesterType) -> Self {
        Self {
            requester_type,
            ..Default::default()
        }
    }

    /// The general public: strictest confidentiality
    pub fn public() -> Self {
        Self::new(RequesterType::Public)
    }

    pub fn with_party(mut self, party_id: impl Into<String>) -> Self {
        self.resolved_party_id = Some(party_id.into());
        self
    }

    pub fn with_national_id(mut self, national_id: impl Into<String>) -> Self {
        self.national_id = Some(national_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_consent(mut self, consent: bool) -> Self {
        self.consent = consent;
        self
    }

    /// Strictness derived from requester type and consent.
    ///
    /// Consent never relaxes a public request.
    pub fn strictness(&self) -> Strictness {
        let base = match self.requester_type {
            RequesterType::Public => return Strictness::Strict,
            RequesterType::Authority => Strictness::Moderate,
            RequesterType::SubjectSelf | RequesterType::Parent | RequesterType::LegalGuardian => {
                Strictness::Relaxed
            }
            RequesterType::ChildOver15 | RequesterType::OtherParty => Strictness::Moderate,
        };
        if self.consent {
            Strictness::Relaxed
        } else {
            base
        }
    }
}
