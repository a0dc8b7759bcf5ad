//! Classifier adapter
//!
//! An optional external oracle (typically an LLM behind a network call)
//! consulted for context-dependent judgments: additional person names,
//! party clusters, section sensitivity and statement ownership.
//!
//! The crate depends only on the [`ClassifierAdapter`] trait. Raw adapter
//! output is parsed at this boundary by [`Oracle`] into closed types;
//! unknown labels become `Unknown`/`Neutral` and malformed responses
//! become [`AdapterError::Malformed`]. Every failure is non-fatal: callers
//! fall back to local results.

pub mod scripted;

pub use scripted::ScriptedAdapter;

use crate::error::AdapterError;
use crate::types::{Disposition, Party, PersonRole, SensitivityCategory, SensitivityLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the adapter is asked to judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentKind {
    /// Person names the local recognizers may have missed
    DetectNames,
    /// Cluster names into parties with roles and relations
    IdentifyParties,
    /// Category and level for one section
    AssessSection,
    /// Whom a sensitive passage concerns and whom to protect it from
    AnalyzeOwnership,
}

impl std::fmt::Display for JudgmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DetectNames => "detect_names",
            Self::IdentifyParties => "identify_parties",
            Self::AssessSection => "assess_section",
            Self::AnalyzeOwnership => "analyze_ownership",
        };
        write!(f, "{}", s)
    }
}

/// A single judgment call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgmentRequest {
    pub kind: JudgmentKind,
    pub text: String,
    /// Kind-specific context (name lists, party lists, category)
    pub aux: serde_json::Value,
}

/// Pluggable judgment backend.
///
/// Implementations return the raw response body (expected to be JSON,
/// optionally wrapped in a markdown code fence). Prompting and transport
/// are the implementation's concern.
#[async_trait]
pub trait ClassifierAdapter: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &str {
        "adapter"
    }

    /// Answer one judgment request
    async fn judge(&self, request: &JudgmentRequest) -> Result<String, AdapterError>;
}

/// A person name proposed by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameSuggestion {
    pub text: String,
    pub confidence: f64,
}

/// One party cluster proposed by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyCluster {
    pub id: Option<String>,
    /// Canonical name first, then aliases
    pub names: Vec<String>,
    pub role: PersonRole,
    pub relation: Option<String>,
    pub is_minor: bool,
    pub national_id: Option<String>,
}

/// Adapter judgment for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionJudgment {
    pub primary_category: SensitivityCategory,
    pub secondary_categories: Vec<SensitivityCategory>,
    /// `None` when the label was missing or unrecognized
    pub level: Option<SensitivityLevel>,
    /// `None` for `ASSESS`, missing or unrecognized labels
    pub action: Option<Disposition>,
    pub reasons: Vec<String>,
    pub confidence: Option<f64>,
    pub legal_basis: Option<String>,
}

/// Adapter judgment on whom a passage concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipJudgment {
    pub owner_party_id: Option<String>,
    pub disclosed_by: Option<String>,
    pub protect_from: Vec<String>,
}

// Raw wire shapes; everything defaults so partial answers still parse.

#[derive(Debug, Default, Deserialize)]
struct RawNames {
    #[serde(default)]
    names: Vec<RawName>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawName {
    Plain(String),
    Scored {
        #[serde(alias = "name")]
        text: String,
        #[serde(default = "default_name_confidence")]
        confidence: f64,
    },
}

fn default_name_confidence() -> f64 {
    0.80
}

#[derive(Debug, Default, Deserialize)]
struct RawParties {
    #[serde(default)]
    parties: Vec<RawParty>,
}

#[derive(Debug, Default, Deserialize)]
struct RawParty {
    #[serde(default)]
    party_id: Option<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    relation: Option<String>,
    #[serde(default)]
    is_minor: Option<bool>,
    #[serde(default)]
    national_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    #[serde(default)]
    primary_category: Option<String>,
    #[serde(default)]
    secondary_categories: Vec<String>,
    #[serde(default)]
    sensitivity_level: Option<String>,
    #[serde(default)]
    recommended_action: Option<String>,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    legal_basis: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOwnership {
    #[serde(default)]
    information_concerns: Option<String>,
    #[serde(default)]
    disclosed_by: Option<String>,
    #[serde(default)]
    protect_from_parties: Vec<String>,
}

/// Strip an optional markdown code fence around a JSON body
fn strip_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Timeout-bounded, parsing front end to a [`ClassifierAdapter`].
///
/// One `Oracle` is created per document run; it counts failed calls so
/// the run can report degraded capabilities.
pub struct Oracle {
    adapter: Arc<dyn ClassifierAdapter>,
    timeout: Duration,
    failures: AtomicUsize,
}

impl Oracle {
    pub fn new(adapter: Arc<dyn ClassifierAdapter>, timeout: Duration) -> Self {
        Self {
            adapter,
            timeout,
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of calls that failed so far
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    async fn call<T>(
        &self,
        kind: JudgmentKind,
        text: &str,
        aux: serde_json::Value,
    ) -> Result<T, AdapterError>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = JudgmentRequest {
            kind,
            text: text.to_string(),
            aux,
        };

        let result = match tokio::time::timeout(self.timeout, self.adapter.judge(&request)).await {
            Err(_) => Err(AdapterError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(raw)) => serde_json::from_str::<T>(strip_fences(&raw))
                .map_err(|e| AdapterError::Malformed(e.to_string())),
        };

        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                adapter = self.adapter.name(),
                kind = %kind,
                error = %e,
                "Classifier adapter call failed, using local results"
            );
        }
        result
    }

    /// Ask for additional person names
    pub async fn detect_names(&self, text: &str) -> Result<Vec<NameSuggestion>, AdapterError> {
        let raw: RawNames = self
            .call(JudgmentKind::DetectNames, text, serde_json::Value::Null)
            .await?;
        Ok(raw
            .names
            .into_iter()
            .map(|n| match n {
                RawName::Plain(text) => NameSuggestion {
                    text,
                    confidence: default_name_confidence(),
                },
                RawName::Scored { text, confidence } => NameSuggestion {
                    text,
                    confidence: confidence.clamp(0.0, 1.0),
                },
            })
            .filter(|n| !n.text.trim().is_empty())
            .collect())
    }

    /// Ask for party clusters over the given names
    pub async fn identify_parties(
        &self,
        text: &str,
        names: &[String],
    ) -> Result<Vec<PartyCluster>, AdapterError> {
        let raw: RawParties = self
            .call(
                JudgmentKind::IdentifyParties,
                text,
                serde_json::json!({ "person_names": names }),
            )
            .await?;
        Ok(raw
            .parties
            .into_iter()
            .map(|p| PartyCluster {
                id: non_empty(p.party_id),
                names: p
                    .names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect(),
                role: p
                    .role
                    .as_deref()
                    .map(PersonRole::from_label)
                    .unwrap_or_default(),
                relation: non_empty(p.relation),
                is_minor: p.is_minor.unwrap_or(false),
                national_id: non_empty(p.national_id),
            })
            .filter(|p| !p.names.is_empty())
            .collect())
    }

    /// Ask for a sensitivity judgment on one section
    pub async fn assess_section(&self, text: &str) -> Result<SectionJudgment, AdapterError> {
        let raw: RawSection = self
            .call(JudgmentKind::AssessSection, text, serde_json::Value::Null)
            .await?;
        Ok(SectionJudgment {
            primary_category: raw
                .primary_category
                .as_deref()
                .map(SensitivityCategory::from_label)
                .unwrap_or(SensitivityCategory::Neutral),
            secondary_categories: raw
                .secondary_categories
                .iter()
                .map(|c| SensitivityCategory::from_label(c))
                .filter(|c| *c != SensitivityCategory::Neutral)
                .collect(),
            level: raw
                .sensitivity_level
                .as_deref()
                .and_then(SensitivityLevel::from_label),
            action: raw
                .recommended_action
                .as_deref()
                .and_then(Disposition::from_label),
            reasons: raw.reasons,
            confidence: raw.confidence.map(|c| c.clamp(0.0, 1.0)),
            legal_basis: non_empty(raw.legal_basis),
        })
    }

    /// Ask whom a sensitive passage concerns
    pub async fn analyze_ownership(
        &self,
        text: &str,
        parties: &[Party],
        category: SensitivityCategory,
    ) -> Result<OwnershipJudgment, AdapterError> {
        let party_list: Vec<serde_json::Value> = parties
            .iter()
            .map(|p| {
                serde_json::json!({
                    "party_id": p.id,
                    "name": p.name,
                    "relation": p.relation,
                    "role": p.role,
                })
            })
            .collect();
        let raw: RawOwnership = self
            .call(
                JudgmentKind::AnalyzeOwnership,
                text,
                serde_json::json!({ "parties": party_list, "category": category }),
            )
            .await?;
        Ok(OwnershipJudgment {
            owner_party_id: non_empty(raw.information_concerns),
            disclosed_by: non_empty(raw.disclosed_by),
            protect_from: raw.protect_from_parties,
        })
    }
}
