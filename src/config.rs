//! Configuration for the disclosure pipeline
//!
//! Every section and field has a serde default, so an empty TOML document
//! yields the default configuration. `validate()` runs in every constructor
//! that accepts a config.

use crate::error::{DisclosureError, Result};
use crate::types::{EntityType, SensitivityCategory, SensitivityLevel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisclosureConfig {
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub parties: PartyConfig,
    #[serde(default)]
    pub sensitivity: SensitivityConfig,
    #[serde(default)]
    pub masking: MaskingConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
}

impl DisclosureConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DisclosureConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DisclosureError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check every rule table and bound; invalid configuration is fatal
    pub fn validate(&self) -> Result<()> {
        self.reconciler.validate()?;
        self.sensitivity.validate()?;

        if self.parties.max_parties == 0 {
            return Err(DisclosureError::Config(
                "parties.max_parties must be at least 1".to_string(),
            ));
        }
        if self.adapter.enabled && self.adapter.timeout_ms == 0 {
            return Err(DisclosureError::Config(
                "adapter.timeout_ms must be positive when the adapter is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sub-pass switches for the pattern recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_true")]
    pub ssn: bool,
    #[serde(default = "default_true")]
    pub phone: bool,
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub date: bool,
    #[serde(default = "default_true")]
    pub names: bool,
    /// Check digit validation for SSN candidates (raises confidence)
    #[serde(default = "default_true")]
    pub validate_luhn: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            ssn: true,
            phone: true,
            email: true,
            date: true,
            names: true,
            validate_luhn: true,
        }
    }
}

/// Candidate filtering and overlap resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Candidates below this confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Overlap priority, highest first; must list every entity type once
    #[serde(default = "default_type_priority")]
    pub type_priority: Vec<EntityType>,

    /// Regexes matched against the full candidate text
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Exact candidate texts that are never entities
    #[serde(default = "default_exclude_texts")]
    pub exclude_texts: Vec<String>,

    /// Maximum gap in codepoints between person fragments that are merged
    #[serde(default = "default_merge_gap")]
    pub merge_gap: usize,

    /// Search the text again for every accepted person name
    #[serde(default = "default_true")]
    pub rescan_names: bool,

    /// Ask the classifier adapter for additional names
    #[serde(default = "default_true")]
    pub adapter_names: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_type_priority() -> Vec<EntityType> {
    EntityType::ALL.to_vec()
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        r"^\d{8}\.pdf$".to_string(),
        r"^\d+\s*kr$".to_string(),
        r"^\d{1,2}:\d{2}$".to_string(),
    ]
}

fn default_exclude_texts() -> Vec<String> {
    vec!["SDN".to_string(), "IFO".to_string()]
}

fn default_merge_gap() -> usize {
    1
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            type_priority: default_type_priority(),
            exclude_patterns: default_exclude_patterns(),
            exclude_texts: default_exclude_texts(),
            merge_gap: default_merge_gap(),
            rescan_names: true,
            adapter_names: true,
        }
    }
}

impl ReconcilerConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DisclosureError::Config(format!(
                "reconciler.min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }

        let unique: HashSet<EntityType> = self.type_priority.iter().copied().collect();
        if self.type_priority.len() != EntityType::ALL.len() || unique.len() != EntityType::ALL.len()
        {
            return Err(DisclosureError::Config(format!(
                "reconciler.type_priority must list each of the {} entity types exactly once",
                EntityType::ALL.len()
            )));
        }

        for pattern in &self.exclude_patterns {
            Regex::new(pattern).map_err(|e| {
                DisclosureError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Position of a type in the priority list (0 = highest)
    pub fn priority_rank(&self, entity_type: EntityType) -> usize {
        self.type_priority
            .iter()
            .position(|t| *t == entity_type)
            .unwrap_or(self.type_priority.len())
    }
}

/// Party graph limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyConfig {
    #[serde(default = "default_max_parties")]
    pub max_parties: usize,
    /// Text sent to the adapter is truncated to this many codepoints
    #[serde(default = "default_adapter_max_chars")]
    pub adapter_max_chars: usize,
    #[serde(default = "default_adapter_max_names")]
    pub adapter_max_names: usize,
}

fn default_max_parties() -> usize {
    10
}

fn default_adapter_max_chars() -> usize {
    5000
}

fn default_adapter_max_names() -> usize {
    20
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            max_parties: default_max_parties(),
            adapter_max_chars: default_adapter_max_chars(),
            adapter_max_names: default_adapter_max_names(),
        }
    }
}

/// One row of the keyword table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: SensitivityCategory,
    pub level: SensitivityLevel,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(category: SensitivityCategory, level: SensitivityLevel, keywords: &[&str]) -> Self {
        Self {
            category,
            level,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Section splitting and keyword assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    #[serde(default = "default_max_section_chars")]
    pub max_section_chars: usize,
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,
    #[serde(default = "default_keyword_rules")]
    pub keywords: Vec<KeywordRule>,
    #[serde(default = "default_legal_basis")]
    pub legal_basis: String,
    /// Ask the adapter who each sensitive section concerns
    #[serde(default = "default_true")]
    pub analyze_ownership: bool,
}

fn default_max_section_chars() -> usize {
    2000
}

fn default_min_section_chars() -> usize {
    50
}

fn default_legal_basis() -> String {
    "OSL 26:1".to_string()
}

fn default_keyword_rules() -> Vec<KeywordRule> {
    use SensitivityCategory::*;
    use SensitivityLevel::*;
    vec![
        KeywordRule::new(
            Health,
            Critical,
            &[
                "diagnos", "sjukdom", "behandling", "medicin", "sjukhus", "läkare", "diabetes",
                "cancer", "insulin", "operation", "sjukskriv", "vårdcentral",
            ],
        ),
        KeywordRule::new(
            MentalHealth,
            Critical,
            &[
                "depression", "psykisk", "psykiatri", "psykolog", "terapi", "ångest",
                "självmord", "suicid", "självskada", "adhd", "autism", "bup",
            ],
        ),
        KeywordRule::new(
            Addiction,
            Critical,
            &[
                "missbruk", "alkohol", "narkotika", "drog", "berusad", "spelberoende",
                "amfetamin", "cannabis",
            ],
        ),
        KeywordRule::new(
            Violence,
            Critical,
            &[
                "misshandel", "våld", "hot ", "hotade", "hotfull", "slagit", "övergrepp",
                "kränkning", "skyddat boende",
            ],
        ),
        KeywordRule::new(
            Sexual,
            Critical,
            &["sexuell", "våldtäkt", "sexualbrott", "incest", "blottning"],
        ),
        KeywordRule::new(
            Family,
            High,
            &[
                "vårdnad", "umgänge", "skilsmässa", "separation", "familjehem", "placering",
                "omhändert", "lvu", "orosanmälan",
            ],
        ),
        KeywordRule::new(
            Economy,
            High,
            &[
                "skuld", "kronofogd", "försörjningsstöd", "ekonomisk", "bidrag", "inkomst",
                "betalningsanmärkning",
            ],
        ),
        KeywordRule::new(
            Criminal,
            High,
            &[
                "brott", "polisanmäl", "dömd", "fängelse", "stöld", "åtal", "kriminell",
                "frihetsberöv",
            ],
        ),
        KeywordRule::new(
            Housing,
            Medium,
            &["bostad", "hemlös", "vräkning", "boende", "lägenhet", "andrahand"],
        ),
    ]
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            max_section_chars: default_max_section_chars(),
            min_section_chars: default_min_section_chars(),
            keywords: default_keyword_rules(),
            legal_basis: default_legal_basis(),
            analyze_ownership: true,
        }
    }
}

impl SensitivityConfig {
    fn validate(&self) -> Result<()> {
        if self.max_section_chars == 0 {
            return Err(DisclosureError::Config(
                "sensitivity.max_section_chars must be positive".to_string(),
            ));
        }
        if self.min_section_chars > self.max_section_chars {
            return Err(DisclosureError::Config(format!(
                "sensitivity.min_section_chars ({}) exceeds max_section_chars ({})",
                self.min_section_chars, self.max_section_chars
            )));
        }
        for rule in &self.keywords {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(DisclosureError::Config(format!(
                    "Keyword rule for {} has no keywords",
                    rule.category
                )));
            }
        }
        Ok(())
    }
}

/// How masked spans are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStyle {
    /// `[MASKERAT: PERSONNUMMER]`
    Brackets,
    /// `████████`
    Blocks,
    /// `<PERSONNUMMER>`
    Placeholder,
    /// `Person A`, `Person B`, ... for persons; brackets otherwise
    Pseudonym,
}

impl Default for MaskingStyle {
    fn default() -> Self {
        Self::Brackets
    }
}

/// Redactor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingConfig {
    #[serde(default)]
    pub style: MaskingStyle,
    /// Include the entity type in bracket tags
    #[serde(default = "default_true")]
    pub show_entity_type: bool,
    /// Block style emits one glyph per masked codepoint
    #[serde(default)]
    pub preserve_length: bool,
    /// Replace masked persons with stable pseudonyms regardless of style
    #[serde(default)]
    pub pseudonyms: bool,
    /// Rewrite whole sections from their section decisions
    #[serde(default)]
    pub section_masking: bool,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            style: MaskingStyle::Brackets,
            show_entity_type: true,
            preserve_length: false,
            pseudonyms: false,
            section_masking: false,
        }
    }
}

/// Classifier adapter usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// When false an attached adapter is never called
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AdapterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
