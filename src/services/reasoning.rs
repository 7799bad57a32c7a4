// Reasoning Adapter
// Wraps the external language-reasoning service behind total operations:
// any failure maps to a fixed neutral judgment, never to an error.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{StructuredJudgment, VisualJudgment};
use crate::services::config_store::ReasoningConfig;
use crate::services::providers::{
    extract_json, get_api_key, parse_provider, InlineImage, ProviderClient, ProviderError,
    ProviderSpec,
};
use crate::services::text_processor::word_overlap;

/// Paraphrase overlap above this marks templated phrasing.
pub const PARAPHRASE_OVERLAP_THRESHOLD: f64 = 0.75;

const JUDGMENT_MAX_TOKENS: i32 = 512;
const PARAPHRASE_MAX_TOKENS: i32 = 2048;
const VISION_MAX_TOKENS: i32 = 1024;

const TEXT_SYSTEM_PROMPT: &str = r#"You are a digital forensic language analyst.
You do not guess and you do not give opinions. You only report observable linguistic characteristics.

Analyze the given text and return strict JSON only, with this schema:
{
  "ai_structural_patterns": true/false,
  "human_variability_present": true/false,
  "overly_generic_language": true/false,
  "personal_context_present": true/false,
  "semantic_predictability": "low" | "medium" | "high",
  "forensic_notes": "short explanation"
}
Do not include any text outside the JSON object."#;

const VISION_PROMPT: &str = r#"You are a digital forensic analysis system.
Analyze the provided image for indicators of AI generation or digital manipulation.
Return strict JSON only:
{
  "aiPercentage": number (0-100),
  "categoryScores": {
    "texture": number (0-100),
    "lighting": number (0-100),
    "anatomy": number (0-100),
    "background": number (0-100),
    "semantics": number (0-100)
  },
  "findings": ["short factual observation"]
}
Category scores must justify aiPercentage. Be conservative and avoid absolute certainty.
Findings must be visual or semantic observations only."#;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed reasoning response: {0}")]
    Malformed(String),
    #[error("reasoning service unavailable: {0}")]
    Unavailable(String),
}

/// Raw access to the text reasoning service. Implementations may fail freely;
/// [`ReasoningAdapter`] absorbs every failure.
#[async_trait]
pub trait TextReasoner: Send + Sync {
    /// Structured judgment with zero sampling randomness.
    async fn reason(&self, text: &str) -> Result<StructuredJudgment, ReasoningError>;
    /// Free paraphrase of `text` with controlled randomness.
    async fn paraphrase(&self, text: &str) -> Result<String, ReasoningError>;
}

/// Visual judgment for one image or video frame.
#[async_trait]
pub trait VisionReasoner: Send + Sync {
    async fn inspect(&self, image: InlineImage) -> Result<VisualJudgment, ReasoningError>;
}

/// Total fallback mapping: the only way a reasoning result enters the scorers.
pub fn judgment_or_fallback(result: Result<StructuredJudgment, ReasoningError>) -> StructuredJudgment {
    match result {
        Ok(judgment) => judgment,
        Err(e) => {
            warn!("[REASONING] judgment unavailable, using neutral fallback: {}", e);
            StructuredJudgment::fallback()
        }
    }
}

/// Total mapping for the paraphrase step; the paraphrase text itself never leaves this module.
pub fn consistency_or_fallback(original: &str, result: Result<String, ReasoningError>) -> bool {
    match result {
        Ok(paraphrase) => word_overlap(original, &paraphrase) > PARAPHRASE_OVERLAP_THRESHOLD,
        Err(e) => {
            warn!("[REASONING] consistency check unavailable: {}", e);
            false
        }
    }
}

pub struct ReasoningAdapter {
    reasoner: Box<dyn TextReasoner>,
    timeout: Duration,
}

impl ReasoningAdapter {
    pub fn new(reasoner: Box<dyn TextReasoner>, timeout: Duration) -> Self {
        Self { reasoner, timeout }
    }

    /// Adapter whose every call takes the fallback path.
    pub fn offline() -> Self {
        Self::new(Box::new(OfflineReasoner), Duration::from_secs(1))
    }

    pub async fn judge(&self, text: &str) -> StructuredJudgment {
        let result = match tokio::time::timeout(self.timeout, self.reasoner.reason(text)).await {
            Ok(res) => res,
            Err(_) => Err(ReasoningError::Timeout(self.timeout)),
        };
        judgment_or_fallback(result)
    }

    pub async fn consistency_check(&self, text: &str) -> bool {
        let result = match tokio::time::timeout(self.timeout, self.reasoner.paraphrase(text)).await {
            Ok(res) => res,
            Err(_) => Err(ReasoningError::Timeout(self.timeout)),
        };
        consistency_or_fallback(text, result)
    }
}

/// Reasoner used when no service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineReasoner;

#[async_trait]
impl TextReasoner for OfflineReasoner {
    async fn reason(&self, _text: &str) -> Result<StructuredJudgment, ReasoningError> {
        Err(ReasoningError::Unavailable("offline".to_string()))
    }

    async fn paraphrase(&self, _text: &str) -> Result<String, ReasoningError> {
        Err(ReasoningError::Unavailable("offline".to_string()))
    }
}

#[async_trait]
impl VisionReasoner for OfflineReasoner {
    async fn inspect(&self, _image: InlineImage) -> Result<VisualJudgment, ReasoningError> {
        Err(ReasoningError::Unavailable("offline".to_string()))
    }
}

/// Reasoner backed by a hosted model through [`ProviderClient`].
#[derive(Clone)]
pub struct ServiceReasoner {
    client: ProviderClient,
    spec: ProviderSpec,
    api_key: String,
    paraphrase_temperature: f64,
}

impl ServiceReasoner {
    pub fn new(client: ProviderClient, spec: ProviderSpec, api_key: String, paraphrase_temperature: f64) -> Self {
        Self {
            client,
            spec,
            api_key,
            paraphrase_temperature,
        }
    }

    pub fn from_config(client: ProviderClient, config: &ReasoningConfig) -> Result<Self, ProviderError> {
        let spec = parse_provider(&config.provider);
        let key = get_api_key(&spec.name).ok_or_else(|| ProviderError::MissingApiKey(spec.name.clone()))?;
        info!("[REASONING] using provider={} model={}", spec.name, spec.model);
        Ok(Self::new(client, spec, key, config.paraphrase_temperature))
    }
}

#[async_trait]
impl TextReasoner for ServiceReasoner {
    async fn reason(&self, text: &str) -> Result<StructuredJudgment, ReasoningError> {
        let result = self
            .client
            .generate(&self.spec, &self.api_key, TEXT_SYSTEM_PROMPT, text, 0.0, JUDGMENT_MAX_TOKENS)
            .await?;
        let json = extract_json(&result.content)?;
        let judgment = serde_json::from_str::<StructuredJudgment>(json)
            .map_err(|e| ReasoningError::Malformed(e.to_string()))?;
        info!(
            "[REASONING] judgment received latency_ms={} predictability={}",
            result.latency_ms,
            judgment.semantic_predictability.as_str()
        );
        Ok(judgment)
    }

    async fn paraphrase(&self, text: &str) -> Result<String, ReasoningError> {
        let prompt = format!("Paraphrase the following text while preserving meaning:\n\n{}", text);
        let result = self
            .client
            .generate(
                &self.spec,
                &self.api_key,
                "",
                &prompt,
                self.paraphrase_temperature,
                PARAPHRASE_MAX_TOKENS,
            )
            .await?;
        Ok(result.content)
    }
}

#[async_trait]
impl VisionReasoner for ServiceReasoner {
    async fn inspect(&self, image: InlineImage) -> Result<VisualJudgment, ReasoningError> {
        if self.spec.name != "gemini" {
            return Err(ReasoningError::Unavailable(format!(
                "vision not supported by {}",
                self.spec.name
            )));
        }
        let result = self
            .client
            .call_gemini(
                &self.spec.model,
                &self.api_key,
                "",
                VISION_PROMPT,
                Some(&image),
                0.0,
                VISION_MAX_TOKENS,
            )
            .await?;
        let json = extract_json(&result.content)?;
        serde_json::from_str::<VisualJudgment>(json).map_err(|e| ReasoningError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::SemanticPredictability;

    /// Scripted reasoner for scorer tests.
    pub(crate) struct FakeReasoner {
        pub judgment: Option<StructuredJudgment>,
        pub paraphrase: Option<String>,
        pub delay: Option<Duration>,
    }

    #[async_trait]
    impl TextReasoner for FakeReasoner {
        async fn reason(&self, _text: &str) -> Result<StructuredJudgment, ReasoningError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.judgment
                .clone()
                .ok_or_else(|| ReasoningError::Provider(ProviderError::ApiError {
                    status: 503,
                    message: "overloaded".to_string(),
                }))
        }

        async fn paraphrase(&self, _text: &str) -> Result<String, ReasoningError> {
            self.paraphrase
                .clone()
                .ok_or_else(|| ReasoningError::Malformed("empty".to_string()))
        }
    }

    pub(crate) fn ai_like_judgment() -> StructuredJudgment {
        StructuredJudgment {
            structural_patterns: true,
            human_variability_present: false,
            overly_generic_language: true,
            personal_context_present: false,
            semantic_predictability: SemanticPredictability::High,
            notes: "templated".to_string(),
        }
    }

    #[tokio::test]
    async fn test_service_error_yields_fallback() {
        let adapter = ReasoningAdapter::new(
            Box::new(FakeReasoner { judgment: None, paraphrase: None, delay: None }),
            Duration::from_secs(5),
        );
        assert_eq!(adapter.judge("text").await, StructuredJudgment::fallback());
        assert!(!adapter.consistency_check("text").await);
    }

    #[tokio::test]
    async fn test_timeout_yields_fallback() {
        let adapter = ReasoningAdapter::new(
            Box::new(FakeReasoner {
                judgment: Some(ai_like_judgment()),
                paraphrase: None,
                delay: Some(Duration::from_millis(200)),
            }),
            Duration::from_millis(20),
        );
        assert_eq!(adapter.judge("text").await, StructuredJudgment::fallback());
    }

    #[tokio::test]
    async fn test_successful_judgment_passes_through() {
        let adapter = ReasoningAdapter::new(
            Box::new(FakeReasoner {
                judgment: Some(ai_like_judgment()),
                paraphrase: Some("the cat sat on the mat".to_string()),
                delay: None,
            }),
            Duration::from_secs(5),
        );
        assert!(adapter.judge("x").await.structural_patterns);
        assert!(adapter.consistency_check("the cat sat on the mat").await);
        assert!(!adapter.consistency_check("a dog ran in the park").await);
    }

    #[tokio::test]
    async fn test_offline_adapter() {
        let adapter = ReasoningAdapter::offline();
        let judgment = adapter.judge("anything").await;
        assert!(judgment.personal_context_present);
        assert_eq!(judgment.semantic_predictability, SemanticPredictability::Medium);
        assert!(!adapter.consistency_check("anything").await);
    }

    #[test]
    fn test_service_needs_an_api_key() {
        let config = ReasoningConfig {
            provider: "nokeyprovider:model-x".to_string(),
            ..ReasoningConfig::default()
        };
        match ServiceReasoner::from_config(ProviderClient::new(), &config) {
            Err(ProviderError::MissingApiKey(name)) => assert_eq!(name, "nokeyprovider"),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("service built without a key"),
        }
    }

    #[test]
    fn test_timeout_error_keeps_sub_second_precision() {
        let err = ReasoningError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "reasoning call timed out after 250ms");
    }

    #[test]
    fn test_fallback_mapping_is_total() {
        let mapped = judgment_or_fallback(Err(ReasoningError::Timeout(Duration::from_secs(30))));
        assert!(!mapped.structural_patterns);
        assert!(mapped.human_variability_present);
        assert!(!consistency_or_fallback("abc", Err(ReasoningError::Unavailable("x".into()))));
        // exactly 0.75 is not above the threshold
        assert!(!consistency_or_fallback("a b c d", Ok("a b c z".to_string())));
    }
}
