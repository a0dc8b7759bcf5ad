//! Disclosure pipeline
//!
//! `DisclosurePipeline` runs one document through every stage:
//! recognize → reconcile → parties → assess → decide → redact.
//! The pipeline holds no per-run state, so a single instance can serve
//! concurrent documents.

use crate::adapter::{ClassifierAdapter, Oracle};
use crate::config::DisclosureConfig;
use crate::error::Result;
use crate::party::PartyGraphBuilder;
use crate::policy::{Decision, PolicyContext, PolicyEngine};
use crate::recognizer::{Recognizer, RecognizerPass};
use crate::reconciler::{EntityStatistics, Reconciler};
use crate::redactor::{MaskingAudit, PseudonymContext, Redactor};
use crate::sensitivity::SensitivityAssessor;
use crate::span::{Span, TextIndex};
use crate::types::{
    Disposition, Entity, EntityType, Party, Requester, SensitiveStatement, SensitivityAssessment,
    SensitivityCategory, SensitivityLevel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// What the classifier adapter contributed to a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// An adapter was attached and enabled
    pub adapter_configured: bool,
    /// Adapter calls that failed or timed out during the run
    pub adapter_failures: usize,
    /// The result relies on local analysis only, fully or in part
    pub degraded: bool,
}

/// Decision for a whole section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDecision {
    #[serde(flatten)]
    pub span: Span,
    pub level: SensitivityLevel,
    #[serde(flatten)]
    pub decision: Decision,
}

/// Aggregate figures for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub entities: EntityStatistics,
    pub masked: usize,
    pub released: usize,
    pub masking_ratio: f64,
    pub masked_by_type: BTreeMap<EntityType, usize>,
    pub released_by_type: BTreeMap<EntityType, usize>,
    pub by_action: BTreeMap<Disposition, usize>,
    pub categories: BTreeMap<SensitivityCategory, usize>,
    pub levels: BTreeMap<SensitivityLevel, usize>,
    pub sections: usize,
    pub parties: usize,
}

/// Result of reviewing one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureReport {
    pub run_id: String,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub requester: Requester,
    pub masked_text: String,
    pub original_text: String,
    pub entities: Vec<Entity>,
    pub assessments: Vec<SensitivityAssessment>,
    pub section_decisions: Vec<SectionDecision>,
    pub parties: Vec<Party>,
    pub statements: Vec<SensitiveStatement>,
    pub masking_audit: Vec<MaskingAudit>,
    pub released: Vec<Entity>,
    pub overall_sensitivity_level: SensitivityLevel,
    pub statistics: ReportStatistics,
    pub capabilities: Capabilities,
}

impl DisclosureReport {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// End-to-end disclosure review
pub struct DisclosurePipeline {
    config: DisclosureConfig,
    recognizer: Recognizer,
    reconciler: Reconciler,
    parties: PartyGraphBuilder,
    assessor: SensitivityAssessor,
    policy: PolicyEngine,
    redactor: Redactor,
    adapter: Option<Arc<dyn ClassifierAdapter>>,
}

impl DisclosurePipeline {
    /// Build a pipeline; fails on invalid configuration
    pub fn new(config: DisclosureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            recognizer: Recognizer::from_config(&config.recognizer),
            reconciler: Reconciler::new(config.reconciler.clone())?,
            parties: PartyGraphBuilder::new(config.parties.clone()),
            assessor: SensitivityAssessor::new(config.sensitivity.clone())?,
            policy: PolicyEngine::new(),
            redactor: Redactor::new(config.masking.clone()),
            adapter: None,
            config,
        })
    }

    /// Attach a classifier adapter
    pub fn with_adapter(mut self, adapter: Arc<dyn ClassifierAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Register an extra recognizer pass
    pub fn with_pass(mut self, pass: impl RecognizerPass + 'static) -> Self {
        self.recognizer = self.recognizer.with_pass(pass);
        self
    }

    /// Replace the policy engine
    pub fn with_policy(mut self, policy: PolicyEngine) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &DisclosureConfig {
        &self.config
    }

    fn adapter_enabled(&self) -> bool {
        self.adapter.is_some() && self.config.adapter.enabled
    }

    /// Review one document for `requester`.
    ///
    /// Fails only when every recognizer pass fails. Adapter problems are
    /// absorbed and reported through [`Capabilities`].
    pub async fn process(&self, text: &str, requester: &Requester) -> Result<DisclosureReport> {
        let started = Instant::now();
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let index = TextIndex::new(text);

        let oracle = self
            .adapter
            .as_ref()
            .filter(|_| self.config.adapter.enabled)
            .map(|adapter| Oracle::new(Arc::clone(adapter), self.config.adapter.timeout()));
        let oracle = oracle.as_ref();

        let candidates = self.recognizer.recognize(&index)?;
        tracing::debug!(run_id = %run_id, candidates = candidates.len(), "Recognized");

        let mut entities = self
            .reconciler
            .reconcile_with_adapter(candidates, &index, oracle)
            .await;
        tracing::debug!(run_id = %run_id, entities = entities.len(), "Reconciled");

        let graph = self.parties.build(&index, &entities, oracle).await;
        graph.attribute(&mut entities);
        tracing::debug!(run_id = %run_id, parties = graph.len(), "Parties built");

        let assessments = self.assessor.assess(&index, oracle).await;
        let statements = self
            .assessor
            .analyze_ownership(&index, &assessments, &graph, oracle)
            .await;
        tracing::debug!(
            run_id = %run_id,
            sections = assessments.len(),
            statements = statements.len(),
            "Sections assessed"
        );

        let ctx = PolicyContext::new(requester, &graph, &statements);
        let decisions = self.policy.decide_all(&entities, &assessments, &ctx);
        let section_decisions: Vec<SectionDecision> = assessments
            .iter()
            .map(|a| SectionDecision {
                span: a.span,
                level: a.level,
                decision: self.policy.decide_section(a, &ctx),
            })
            .collect();

        let mut pseudonyms = PseudonymContext::new();
        let redaction = self
            .redactor
            .redact(text, &entities, &decisions, &mut pseudonyms);
        let masked_text = if self.config.masking.section_masking {
            let sections: Vec<(&SensitivityAssessment, Disposition)> = assessments
                .iter()
                .zip(&section_decisions)
                .map(|(a, d)| (a, d.decision.disposition))
                .collect();
            self.redactor.mask_sections(text, &redaction, &sections)
        } else {
            redaction.masked_text
        };

        let mut categories = BTreeMap::new();
        let mut levels = BTreeMap::new();
        for assessment in &assessments {
            *categories.entry(assessment.primary_category).or_insert(0) += 1;
            *levels.entry(assessment.level).or_insert(0) += 1;
        }
        let masking = redaction.statistics;
        let statistics = ReportStatistics {
            entities: Reconciler::statistics(&entities),
            masked: masking.masked,
            released: masking.released,
            masking_ratio: masking.masking_ratio,
            masked_by_type: masking.masked_by_type,
            released_by_type: masking.released_by_type,
            by_action: masking.by_action,
            categories,
            levels,
            sections: assessments.len(),
            parties: graph.len(),
        };

        let adapter_failures = oracle.map_or(0, Oracle::failures);
        let capabilities = Capabilities {
            adapter_configured: self.adapter_enabled(),
            adapter_failures,
            degraded: !self.adapter_enabled() || adapter_failures > 0,
        };

        let overall_sensitivity_level = SensitivityAssessor::overall_level(&assessments);
        let processing_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            run_id = %run_id,
            entities = entities.len(),
            masked = statistics.masked,
            level = %overall_sensitivity_level,
            degraded = capabilities.degraded,
            elapsed_ms = processing_time_ms,
            "Disclosure review completed"
        );

        Ok(DisclosureReport {
            run_id,
            processed_at: Utc::now(),
            processing_time_ms,
            requester: requester.clone(),
            masked_text,
            original_text: text.to_string(),
            entities,
            assessments,
            section_decisions,
            parties: graph.parties().to_vec(),
            statements,
            masking_audit: redaction.audit,
            released: redaction.released,
            overall_sensitivity_level,
            statistics,
            capabilities,
        })
    }
}

impl std::fmt::Debug for DisclosurePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisclosurePipeline")
            .field("passes", &self.recognizer.pass_names())
            .field("adapter", &self.adapter.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}
