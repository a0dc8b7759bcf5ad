//! Sensitivity assessor
//!
//! Splits a document into sections and judges each one by keyword table,
//! optionally refined by the classifier adapter. The adapter may change the
//! category, but a section with CRITICAL keywords is never judged below HIGH.

use crate::adapter::{Oracle, SectionJudgment};
use crate::config::SensitivityConfig;
use crate::error::Result;
use crate::party::PartyGraph;
use crate::span::{Span, TextIndex};
use crate::types::{
    AssessmentSource, Disposition, SensitiveStatement, SensitivityAssessment,
    SensitivityCategory, SensitivityLevel,
};
use regex::Regex;
use std::sync::OnceLock;

const KEYWORD_CONFIDENCE: f64 = 0.6;
const NO_KEYWORD_CONFIDENCE: f64 = 0.3;
const MAX_KEYWORD_REASONS: usize = 5;
const ESCALATION_REASON: &str = "Nyckelordsanalys identifierade känsligt innehåll";

fn blank_line() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").ok()).as_ref()
}

/// Keyword hits for one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryHits {
    pub category: SensitivityCategory,
    pub level: SensitivityLevel,
    pub keywords: Vec<String>,
}

/// Result of the keyword pass over one section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordAnalysis {
    /// Matched categories in keyword-table order
    pub hits: Vec<CategoryHits>,
}

impl KeywordAnalysis {
    /// Category with the most hits; ties go to the earlier table row
    pub fn primary(&self) -> SensitivityCategory {
        let mut best: Option<&CategoryHits> = None;
        for hit in &self.hits {
            if best.map_or(true, |b| hit.keywords.len() > b.keywords.len()) {
                best = Some(hit);
            }
        }
        best.map_or(SensitivityCategory::Neutral, |b| b.category)
    }

    /// Highest default level among matched categories
    pub fn highest_level(&self) -> Option<SensitivityLevel> {
        self.hits.iter().map(|h| h.level).max()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.hits.iter().flat_map(|h| h.keywords.clone()).collect()
    }

    pub fn categories(&self) -> Vec<SensitivityCategory> {
        self.hits.iter().map(|h| h.category).collect()
    }
}

/// Section-level sensitivity assessor
pub struct SensitivityAssessor {
    config: SensitivityConfig,
    lowered: Vec<Vec<String>>,
}

impl SensitivityAssessor {
    pub fn new(config: SensitivityConfig) -> Result<Self> {
        let lowered = config
            .keywords
            .iter()
            .map(|rule| {
                rule.keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.trim().is_empty())
                    .collect()
            })
            .collect();
        Ok(Self { config, lowered })
    }

    /// Split into sections: paragraphs separated by blank lines are
    /// accumulated while the section stays within `max_section_chars`;
    /// oversized paragraphs are cut at whitespace. Sections shorter than
    /// `min_section_chars` are dropped.
    pub fn split_sections(&self, index: &TextIndex<'_>) -> Vec<Span> {
        let max = self.config.max_section_chars;
        let paragraphs: Vec<Span> = paragraphs(index)
            .into_iter()
            .flat_map(|p| cut_oversized(index, p, max))
            .collect();

        let mut sections = Vec::new();
        let mut current: Option<Span> = None;
        for paragraph in paragraphs {
            current = match current {
                Some(section) if paragraph.end - section.start <= max => {
                    Some(section.union(&paragraph))
                }
                Some(section) => {
                    sections.push(section);
                    Some(paragraph)
                }
                None => Some(paragraph),
            };
        }
        sections.extend(current);
        sections.retain(|s| s.len() >= self.config.min_section_chars);
        sections
    }

    /// Case-insensitive substring hits against the keyword table
    pub fn keyword_analysis(&self, text: &str) -> KeywordAnalysis {
        let lower = text.to_lowercase();
        let hits = self
            .config
            .keywords
            .iter()
            .zip(&self.lowered)
            .filter_map(|(rule, keywords)| {
                let found: Vec<String> = keywords
                    .iter()
                    .filter(|k| lower.contains(k.as_str()))
                    .cloned()
                    .collect();
                (!found.is_empty()).then(|| CategoryHits {
                    category: rule.category,
                    level: rule.level,
                    keywords: found,
                })
            })
            .collect();
        KeywordAnalysis { hits }
    }

    /// Keyword-only assessment of one section
    pub fn assess_local(&self, span: Span, text: &str) -> SensitivityAssessment {
        let analysis = self.keyword_analysis(text);
        self.from_keywords(span, &analysis)
    }

    fn from_keywords(&self, span: Span, analysis: &KeywordAnalysis) -> SensitivityAssessment {
        let keywords = analysis.keywords();
        let Some(level) = analysis.highest_level() else {
            return SensitivityAssessment {
                span,
                primary_category: SensitivityCategory::Neutral,
                secondary_categories: Vec::new(),
                level: SensitivityLevel::Low,
                default_action: Disposition::Release,
                confidence: NO_KEYWORD_CONFIDENCE,
                reasons: Vec::new(),
                keywords,
                legal_basis: self.config.legal_basis.clone(),
                source: AssessmentSource::Keywords,
            };
        };

        let primary = analysis.primary();
        let listed: Vec<&str> = keywords
            .iter()
            .take(MAX_KEYWORD_REASONS)
            .map(String::as_str)
            .collect();
        SensitivityAssessment {
            span,
            primary_category: primary,
            secondary_categories: analysis
                .categories()
                .into_iter()
                .filter(|c| *c != primary)
                .collect(),
            level,
            default_action: level.default_action(),
            confidence: KEYWORD_CONFIDENCE,
            reasons: vec![format!("Nyckelord identifierade: {}", listed.join(", "))],
            keywords,
            legal_basis: self.config.legal_basis.clone(),
            source: AssessmentSource::Keywords,
        }
    }

    /// Merge an adapter judgment with the keyword pass.
    ///
    /// The adapter's category, level, action and reasons are preferred. If
    /// the keyword pass found CRITICAL keywords and the adapter judged the
    /// section below HIGH, the level is raised to HIGH.
    pub fn combine(
        &self,
        span: Span,
        analysis: &KeywordAnalysis,
        judgment: SectionJudgment,
    ) -> SensitivityAssessment {
        let keyword_level = analysis.highest_level();
        let mut level = judgment
            .level
            .or(keyword_level)
            .unwrap_or(SensitivityLevel::Low);
        let mut reasons = if judgment.reasons.is_empty() {
            self.from_keywords(span, analysis).reasons
        } else {
            judgment.reasons
        };

        let mut action = judgment.action.unwrap_or_else(|| level.default_action());
        if keyword_level == Some(SensitivityLevel::Critical) && level < SensitivityLevel::High {
            level = SensitivityLevel::High;
            action = level.default_action();
            reasons.push(ESCALATION_REASON.to_string());
        }

        let mut secondary = judgment.secondary_categories;
        for category in analysis.categories() {
            if category != judgment.primary_category && !secondary.contains(&category) {
                secondary.push(category);
            }
        }

        SensitivityAssessment {
            span,
            primary_category: judgment.primary_category,
            secondary_categories: secondary,
            level,
            default_action: action,
            confidence: judgment.confidence.unwrap_or(if keyword_level.is_some() {
                KEYWORD_CONFIDENCE
            } else {
                NO_KEYWORD_CONFIDENCE
            }),
            reasons,
            keywords: analysis.keywords(),
            legal_basis: judgment
                .legal_basis
                .unwrap_or_else(|| self.config.legal_basis.clone()),
            source: AssessmentSource::Adapter,
        }
    }

    /// Assess every section, consulting the adapter when given
    pub async fn assess(
        &self,
        index: &TextIndex<'_>,
        oracle: Option<&Oracle>,
    ) -> Vec<SensitivityAssessment> {
        let mut assessments = Vec::new();
        for span in self.split_sections(index) {
            let text = index.slice(span);
            let analysis = self.keyword_analysis(text);
            let assessment = match oracle {
                Some(oracle) => match oracle.assess_section(text).await {
                    Ok(judgment) => self.combine(span, &analysis, judgment),
                    Err(_) => self.from_keywords(span, &analysis),
                },
                None => self.from_keywords(span, &analysis),
            };
            assessments.push(assessment);
        }
        tracing::debug!(count = assessments.len(), "Sections assessed");
        assessments
    }

    /// Ask the adapter whom each section of level MEDIUM or above concerns.
    ///
    /// Party ids the adapter invents are dropped; a statement without a
    /// known owner is not emitted.
    pub async fn analyze_ownership(
        &self,
        index: &TextIndex<'_>,
        assessments: &[SensitivityAssessment],
        graph: &PartyGraph,
        oracle: Option<&Oracle>,
    ) -> Vec<SensitiveStatement> {
        let Some(oracle) = oracle else {
            return Vec::new();
        };
        if !self.config.analyze_ownership || graph.is_empty() {
            return Vec::new();
        }

        let mut statements = Vec::new();
        for assessment in assessments
            .iter()
            .filter(|a| a.level >= SensitivityLevel::Medium)
        {
            let text = index.slice(assessment.span);
            let Ok(judgment) = oracle
                .analyze_ownership(text, graph.parties(), assessment.primary_category)
                .await
            else {
                continue;
            };
            let Some(owner) = judgment.owner_party_id.filter(|id| graph.get(id).is_some()) else {
                continue;
            };
            statements.push(SensitiveStatement {
                span: assessment.span,
                owner_party_id: owner,
                disclosed_by_party_id: judgment.disclosed_by.filter(|id| graph.get(id).is_some()),
                category: assessment.primary_category,
                level: assessment.level,
                protect_from: judgment
                    .protect_from
                    .into_iter()
                    .filter(|id| graph.get(id).is_some())
                    .collect(),
            });
        }
        statements
    }

    /// Highest section level; a document without sections is MEDIUM
    pub fn overall_level(assessments: &[SensitivityAssessment]) -> SensitivityLevel {
        assessments
            .iter()
            .map(|a| a.level)
            .max()
            .unwrap_or(SensitivityLevel::Medium)
    }
}

/// Paragraph spans between blank lines, trimmed of surrounding whitespace
fn paragraphs(index: &TextIndex<'_>) -> Vec<Span> {
    let text = index.text();
    let mut bounds = Vec::new();
    let mut start = 0;
    if let Some(separator) = blank_line() {
        for m in separator.find_iter(text) {
            bounds.push((start, m.start()));
            start = m.end();
        }
    }
    bounds.push((start, text.len()));

    bounds
        .into_iter()
        .filter_map(|(s, e)| {
            let raw = &text[s..e];
            let leading = raw.len() - raw.trim_start().len();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            let begin = s + leading;
            Some(index.span_from_bytes(begin, begin + trimmed.len()))
        })
        .collect()
}

/// Cut a paragraph longer than `max` codepoints into pieces, preferring
/// the last whitespace inside each window
fn cut_oversized(index: &TextIndex<'_>, paragraph: Span, max: usize) -> Vec<Span> {
    if paragraph.len() <= max {
        return vec![paragraph];
    }

    let chars: Vec<char> = index.slice(paragraph).chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while chars.len() - start > max {
        let window_end = start + max;
        let cut = (start + 1..window_end)
            .rev()
            .find(|&i| chars[i].is_whitespace())
            .unwrap_or(window_end);
        pieces.push(Span::new(paragraph.start + start, paragraph.start + cut));
        start = cut;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }
    if start < chars.len() {
        pieces.push(Span::new(paragraph.start + start, paragraph.end));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{JudgmentKind, ScriptedAdapter};
    use crate::types::{Party, PersonRole};
    use std::sync::Arc;
    use std::time::Duration;

    fn assessor() -> SensitivityAssessor {
        SensitivityAssessor::new(SensitivityConfig::default()).unwrap()
    }

    fn categories(text: &str) -> Vec<SensitivityCategory> {
        assessor().keyword_analysis(text).categories()
    }

    #[test]
    fn test_health_keywords() {
        let analysis =
            assessor().keyword_analysis("Patienten har diagnos diabetes och får behandling med insulin.");
        assert_eq!(analysis.primary(), SensitivityCategory::Health);
        assert!(analysis.keywords().contains(&"diagnos".to_string()));
        assert_eq!(analysis.highest_level(), Some(SensitivityLevel::Critical));
    }

    #[test]
    fn test_category_keywords() {
        assert!(categories("Klienten har depression och går i terapi hos psykolog.")
            .contains(&SensitivityCategory::MentalHealth));
        assert!(categories("Kvinnan berättar om misshandel och hot från sin partner.")
            .contains(&SensitivityCategory::Violence));

        let economy = assessor()
            .keyword_analysis("Familjen har skulder hos kronofogden och ansöker om försörjningsstöd.");
        assert_eq!(economy.categories(), vec![SensitivityCategory::Economy]);
        assert_eq!(economy.highest_level(), Some(SensitivityLevel::High));

        let both = categories("Personen har missbruksproblem och ekonomiska problem med skulder.");
        assert!(both.contains(&SensitivityCategory::Addiction));
        assert!(both.contains(&SensitivityCategory::Economy));
    }

    #[test]
    fn test_neutral_text() {
        let analysis = assessor().keyword_analysis("Mötet hölls klockan 14:00 i konferensrummet.");
        assert!(analysis.hits.is_empty());
        assert_eq!(analysis.highest_level(), None);

        let assessment = assessor().assess_local(Span::new(0, 44), "Mötet hölls klockan 14:00.");
        assert_eq!(assessment.level, SensitivityLevel::Low);
        assert_eq!(assessment.default_action, Disposition::Release);
        assert_eq!(assessment.confidence, NO_KEYWORD_CONFIDENCE);
    }

    #[test]
    fn test_local_assessment_reasons() {
        let text = "Klienten har diagnos depression och behandlas på psykiatrisk klinik.";
        let assessment = assessor().assess_local(Span::new(0, 10), text);
        assert_eq!(assessment.level, SensitivityLevel::Critical);
        assert_eq!(assessment.default_action, Disposition::MaskComplete);
        assert_eq!(assessment.confidence, KEYWORD_CONFIDENCE);
        assert!(assessment.reasons[0].starts_with("Nyckelord identifierade: "));
        assert_eq!(assessment.legal_basis, "OSL 26:1");
    }

    #[test]
    fn test_split_sections() {
        let para = "Detta är ett stycke text som är tillräckligt långt för en sektion.";
        let text = format!("{para}\n\n{para}\n   \n{para}\n\nKort.");
        let index = TextIndex::new(&text);

        let config = SensitivityConfig {
            max_section_chars: 140,
            ..Default::default()
        };
        let sections = SensitivityAssessor::new(config).unwrap().split_sections(&index);
        assert_eq!(sections.len(), 2);
        assert!(index.slice(sections[0]).starts_with("Detta"));
        assert!(index.slice(sections[0]).contains("\n\n"));
        assert!(sections.iter().all(|s| s.len() <= 140));
        // "Kort." is accumulated into the last section rather than dropped
        assert!(index.slice(sections[1]).ends_with("Kort."));
    }

    #[test]
    fn test_short_document_has_no_sections() {
        let index = TextIndex::new("Personnummer: 199001011234");
        assert!(assessor().split_sections(&index).is_empty());
        assert_eq!(
            SensitivityAssessor::overall_level(&[]),
            SensitivityLevel::Medium
        );
    }

    #[test]
    fn test_oversized_paragraph_is_cut() {
        let text = "ord ".repeat(100);
        let index = TextIndex::new(&text);
        let config = SensitivityConfig {
            max_section_chars: 60,
            min_section_chars: 1,
            ..Default::default()
        };
        let sections = SensitivityAssessor::new(config).unwrap().split_sections(&index);
        assert!(sections.len() > 1);
        assert!(sections.iter().all(|s| s.len() <= 60));
        for pair in sections.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_escalation_rule() {
        let assessor = assessor();
        let analysis = assessor.keyword_analysis("Hon har en diagnos.");
        let judgment = SectionJudgment {
            primary_category: SensitivityCategory::Neutral,
            secondary_categories: vec![],
            level: Some(SensitivityLevel::Low),
            action: Some(Disposition::Release),
            reasons: vec!["Neutral uppgift".to_string()],
            confidence: Some(0.9),
            legal_basis: None,
        };
        let assessment = assessor.combine(Span::new(0, 19), &analysis, judgment);
        assert_eq!(assessment.level, SensitivityLevel::High);
        assert_eq!(assessment.default_action, Disposition::MaskComplete);
        assert_eq!(assessment.reasons.last().map(String::as_str), Some(ESCALATION_REASON));
        assert_eq!(assessment.source, AssessmentSource::Adapter);
    }

    #[test]
    fn test_adapter_may_raise_level() {
        let assessor = assessor();
        let analysis = assessor.keyword_analysis("Familjen flyttar till en ny bostad.");
        let judgment = SectionJudgment {
            primary_category: SensitivityCategory::Family,
            secondary_categories: vec![],
            level: Some(SensitivityLevel::High),
            action: None,
            reasons: vec![],
            confidence: None,
            legal_basis: Some("OSL 26:5".to_string()),
        };
        let assessment = assessor.combine(Span::new(0, 10), &analysis, judgment);
        assert_eq!(assessment.level, SensitivityLevel::High);
        assert_eq!(assessment.default_action, Disposition::MaskComplete);
        assert_eq!(assessment.secondary_categories, vec![SensitivityCategory::Housing]);
        assert_eq!(assessment.legal_basis, "OSL 26:5");
    }

    #[tokio::test]
    async fn test_assess_with_failing_adapter() {
        let text = "Kvinnan berättar om misshandel och hot från sin partner under flera år.";
        let index = TextIndex::new(text);
        let oracle = Oracle::new(Arc::new(ScriptedAdapter::new()), Duration::from_secs(1));
        let assessments = assessor().assess(&index, Some(&oracle)).await;
        assert_eq!(assessments.len(), 1);
        assert_eq!(assessments[0].primary_category, SensitivityCategory::Violence);
        assert_eq!(assessments[0].source, AssessmentSource::Keywords);
        assert_eq!(oracle.failures(), 1);
    }

    #[tokio::test]
    async fn test_ownership_statements() {
        let text = "Kvinnan berättar om misshandel och hot från sin partner under flera år.";
        let index = TextIndex::new(text);
        let adapter = ScriptedAdapter::new().respond(
            JudgmentKind::AnalyzeOwnership,
            r#"{"information_concerns": "P1", "disclosed_by": "P1", "protect_from_parties": ["P2", "P7"]}"#,
        );
        let oracle = Oracle::new(Arc::new(adapter), Duration::from_secs(1));
        let party = |id: &str| Party {
            id: id.to_string(),
            name: format!("Namn {}", id),
            national_id: None,
            role: PersonRole::Unknown,
            relation: None,
            is_minor: false,
            aliases: vec![],
            mentions: vec![],
        };
        let graph = PartyGraph::new(vec![party("P1"), party("P2")]);

        let assessor = assessor();
        let assessments = assessor.assess(&index, None).await;
        let statements = assessor
            .analyze_ownership(&index, &assessments, &graph, Some(&oracle))
            .await;
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].owner_party_id, "P1");
        assert_eq!(statements[0].disclosed_by_party_id.as_deref(), Some("P1"));
        assert_eq!(statements[0].protect_from, vec!["P2"]);
        assert_eq!(statements[0].level, SensitivityLevel::Critical);
    }
}
