//! # a3s-disclosure
//!
//! Pre-disclosure sensitivity review (menprövning, OSL chapter 26) for
//! Swedish social-services case documents.
//!
//! ## Overview
//!
//! `a3s-disclosure` finds personal data in a case document, groups the
//! people mentioned into parties, judges how sensitive each section is, and
//! decides per entity what a given requester may see. The result is a
//! masked copy of the text plus a full audit trail.
//!
//! An optional [`ClassifierAdapter`] (for example an LLM backend) can add
//! names, party roles, section judgments and ownership analysis. It is
//! always best-effort: without it, or when it fails, every stage falls back
//! to local analysis and the report is flagged as degraded.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_disclosure::{DisclosureConfig, DisclosurePipeline, Requester};
//!
//! # async fn example() -> a3s_disclosure::Result<()> {
//! let pipeline = DisclosurePipeline::new(DisclosureConfig::default())?;
//!
//! let report = pipeline
//!     .process("Personnummer: 199001011234", &Requester::public())
//!     .await?;
//!
//! assert!(report.masked_text.contains("[MASKERAT: PERSONNUMMER]"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Recognizer** — regex sub-passes for identity numbers, phones, emails,
//!   dates and names
//! - **Reconciler** — overlap resolution, person merging and rescanning
//! - **PartyGraphBuilder** — parties, roles and requester resolution
//! - **SensitivityAssessor** — section splitting, keyword table, escalation
//! - **PolicyEngine** — first-match disclosure rules per entity
//! - **Redactor** — span rewriting in one of four masking styles
//! - **ClassifierAdapter** trait — the only seam to external judgment

pub mod adapter;
pub mod config;
pub mod error;
pub mod party;
pub mod pipeline;
pub mod policy;
pub mod recognizer;
pub mod reconciler;
pub mod redactor;
pub mod sensitivity;
pub mod span;
pub mod types;

// Re-export core types
pub use adapter::{ClassifierAdapter, JudgmentKind, JudgmentRequest, Oracle, ScriptedAdapter};
pub use config::{DisclosureConfig, MaskingConfig, MaskingStyle};
pub use error::{AdapterError, DisclosureError, Result};
pub use party::{PartyGraph, PartyGraphBuilder};
pub use pipeline::{Capabilities, DisclosurePipeline, DisclosureReport, ReportStatistics};
pub use policy::{Decision, PolicyContext, PolicyEngine, RequesterIdentity};
pub use recognizer::{Recognizer, RecognizerPass};
pub use reconciler::Reconciler;
pub use redactor::{rebuild, MaskingAudit, PseudonymContext, Redaction, Redactor};
pub use sensitivity::SensitivityAssessor;
pub use span::{Span, TextIndex};
pub use types::{
    Disposition, Entity, EntityType, Party, PersonRole, Requester, RequesterType,
    SensitiveStatement, SensitivityAssessment, SensitivityCategory, SensitivityLevel,
};
