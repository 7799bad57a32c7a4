// Authenex Data Models
// Result records produced by the forensic scorers and the trust engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Highest probability any scorer may report. The remaining headroom is kept for ambiguity.
pub const PROBABILITY_CEILING: f64 = 95.0;

/// Clamp a probability-like value into `[0, 95]`; NaN collapses to 0.
pub fn clamp_probability(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, PROBABILITY_CEILING)
}

/// Round to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============ Evidence Signals ============

/// A single named measurement value. Numbers are bounded by the analyzer that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Flag(bool),
    Number(f64),
    Label(String),
}

impl SignalValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Number(value)
    }
}

impl From<usize> for SignalValue {
    fn from(value: usize) -> Self {
        SignalValue::Number(value as f64)
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Flag(value)
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        SignalValue::Label(value.to_string())
    }
}

/// Evidence signal name -> value. Ordered so serialized output is stable.
pub type CategoryScores = BTreeMap<String, SignalValue>;

// ============ Findings ============

/// Human-readable note about one evidence rule.
/// `signal` names the triggering measurement; informational notes carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    pub message: String,
}

impl Finding {
    pub fn triggered(signal: &str, message: impl Into<String>) -> Self {
        Self {
            signal: Some(signal.to_string()),
            message: message.into(),
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self {
            signal: None,
            message: message.into(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.is_some()
    }
}

// ============ Modality Results ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Email,
    Document,
    Audio,
    Video,
    Image,
}

impl Modality {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "email" => Some(Self::Email),
            "document" | "doc" | "pdf" | "docx" => Some(Self::Document),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Text => "text",
            Modality::Email => "email",
            Modality::Document => "document",
            Modality::Audio => "audio",
            Modality::Video => "video",
            Modality::Image => "image",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    /// Always within `[0, 95]`.
    pub ai_probability: f64,
    pub category_scores: CategoryScores,
    /// Never empty; order follows rule evaluation.
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forensic_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResult {
    pub id: String,
    pub ai_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub ai_probability: f64,
    pub category_scores: CategoryScores,
    /// First samples only; statistics cover the full set.
    pub sample_results: Vec<SampleResult>,
    pub findings: Vec<Finding>,
}

// ============ Reasoning Judgments ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SemanticPredictability {
    Low,
    #[default]
    Medium,
    High,
}

impl SemanticPredictability {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticPredictability::Low => "low",
            SemanticPredictability::Medium => "medium",
            SemanticPredictability::High => "high",
        }
    }
}

/// Structured qualitative judgment about a text sample from the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredJudgment {
    #[serde(alias = "ai_structural_patterns", alias = "structural_patterns")]
    pub structural_patterns: bool,
    #[serde(alias = "human_variability_present")]
    pub human_variability_present: bool,
    #[serde(alias = "overly_generic_language")]
    pub overly_generic_language: bool,
    #[serde(alias = "personal_context_present")]
    pub personal_context_present: bool,
    #[serde(default, alias = "semantic_predictability")]
    pub semantic_predictability: SemanticPredictability,
    #[serde(default, alias = "forensic_notes")]
    pub notes: String,
}

impl StructuredJudgment {
    /// Neutral judgment used whenever the reasoning service cannot answer.
    pub fn fallback() -> Self {
        Self {
            structural_patterns: false,
            human_variability_present: true,
            overly_generic_language: false,
            personal_context_present: true,
            semantic_predictability: SemanticPredictability::Medium,
            notes: "Reasoning service unavailable".to_string(),
        }
    }
}

/// Visual forensic judgment for one image or frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VisualJudgment {
    #[serde(default, alias = "ai_percentage")]
    pub ai_percentage: Option<serde_json::Value>,
    #[serde(default, alias = "category_scores")]
    pub category_scores: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub findings: Vec<String>,
}

// ============ Trust Verdict ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Real,
    LikelyReal,
    Suspicious,
    LikelyAiGenerated,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Real => "REAL",
            Verdict::LikelyReal => "LIKELY REAL",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::LikelyAiGenerated => "LIKELY AI-GENERATED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "camelCase")]
pub enum SourceData {
    Category(CategoryResult),
    Aggregate(AggregateResult),
}

impl SourceData {
    pub fn findings(&self) -> &[Finding] {
        match self {
            SourceData::Category(r) => &r.findings,
            SourceData::Aggregate(r) => &r.findings,
        }
    }

    pub fn ai_probability(&self) -> f64 {
        match self {
            SourceData::Category(r) => r.ai_probability,
            SourceData::Aggregate(r) => r.ai_probability,
        }
    }

    pub fn category_scores(&self) -> &CategoryScores {
        match self {
            SourceData::Category(r) => &r.category_scores,
            SourceData::Aggregate(r) => &r.category_scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustVerdict {
    /// `clamp(round(100 - final_ai_probability), 0, 100)`.
    pub trust_score: u8,
    pub verdict: Verdict,
    pub final_ai_probability: f64,
    /// Set when the fused probability lands above the per-modality ceiling.
    #[serde(default)]
    pub exceeds_ceiling: bool,
    pub source_data: SourceData,
}

// ============ Report ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub request_id: String,
    pub modality: Modality,
    pub generated_at: String,
    pub verdict: TrustVerdict,
    pub explanation: String,
}
