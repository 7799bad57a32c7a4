// Text Forensics
// Deterministic stylometry plus reasoning-service judgment, folded through one rule table.

use tracing::info;

use crate::models::{round2, CategoryResult, CategoryScores, SemanticPredictability, SignalValue, StructuredJudgment};
use crate::services::reasoning::ReasoningAdapter;
use crate::services::text_processor::{measure_text, TextMeasures};

use super::rules::{EvidenceRule, RuleOutcome};

pub const TEXT_BASELINE: f64 = 30.0;
const NO_INDICATORS: &str = "No strong textual indicators of AI generation";
const INSUFFICIENT_TEXT: &str = "Insufficient text for analysis";

/// Everything the text rules look at.
#[derive(Debug, Clone)]
pub struct TextSignals {
    pub measures: TextMeasures,
    pub judgment: StructuredJudgment,
    pub paraphrase_consistent: bool,
}

fn uniform_sentences(s: &TextSignals) -> bool {
    s.measures.sentence_variance < 8.0
}

fn repetitive(s: &TextSignals) -> bool {
    s.measures.repetition > 0.25
}

fn low_diversity(s: &TextSignals) -> bool {
    s.measures.lexical_diversity < 0.4
}

fn structural(s: &TextSignals) -> bool {
    s.judgment.structural_patterns
}

fn generic(s: &TextSignals) -> bool {
    s.judgment.overly_generic_language
}

fn impersonal(s: &TextSignals) -> bool {
    !s.judgment.personal_context_present
}

fn predictable(s: &TextSignals) -> bool {
    s.judgment.semantic_predictability == SemanticPredictability::High
}

fn paraphrase_stable(s: &TextSignals) -> bool {
    s.paraphrase_consistent
}

pub const TEXT_RULES: &[EvidenceRule<TextSignals>] = &[
    EvidenceRule {
        signal: "sentence_variance",
        predicate: uniform_sentences,
        delta: 10,
        finding: "Highly uniform sentence structure",
    },
    EvidenceRule {
        signal: "repetition",
        predicate: repetitive,
        delta: 10,
        finding: "Repetitive phrasing patterns detected",
    },
    EvidenceRule {
        signal: "lexical_diversity",
        predicate: low_diversity,
        delta: 10,
        finding: "Low lexical diversity",
    },
    EvidenceRule {
        signal: "structural_patterns",
        predicate: structural,
        delta: 15,
        finding: "AI-like structural patterns detected",
    },
    EvidenceRule {
        signal: "overly_generic_language",
        predicate: generic,
        delta: 10,
        finding: "Overly generic phrasing",
    },
    EvidenceRule {
        signal: "personal_context_present",
        predicate: impersonal,
        delta: 10,
        finding: "Lack of personal context",
    },
    EvidenceRule {
        signal: "semantic_predictability",
        predicate: predictable,
        delta: 10,
        finding: "High semantic predictability",
    },
    EvidenceRule {
        signal: "paraphrase_consistency",
        predicate: paraphrase_stable,
        delta: 15,
        finding: "High paraphrase consistency (AI-like behavior)",
    },
];

/// Pure scoring step. Same signals, same result.
pub fn score_text(signals: &TextSignals) -> CategoryResult {
    let m = &signals.measures;

    let mut scores = CategoryScores::new();
    scores.insert("sentence_variance".into(), round2(m.sentence_variance).into());
    scores.insert("repetition".into(), round2(m.repetition).into());
    scores.insert("lexical_diversity".into(), round2(m.lexical_diversity).into());
    scores.insert(
        "semantic_predictability".into(),
        signals.judgment.semantic_predictability.as_str().into(),
    );
    scores.insert(
        "human_variability".into(),
        SignalValue::Flag(signals.judgment.human_variability_present),
    );
    scores.insert("paraphrase_consistency".into(), signals.paraphrase_consistent.into());

    let mut outcome = RuleOutcome::new(TEXT_BASELINE);
    outcome.apply(TEXT_RULES, signals);

    let mut result = outcome.finish(scores, NO_INDICATORS);
    if !signals.judgment.notes.is_empty() {
        result.forensic_notes = Some(signals.judgment.notes.clone());
    }
    result
}

/// Result for input with no words at all: baseline only, reasoning skipped.
pub fn insufficient_text() -> CategoryResult {
    let mut scores = CategoryScores::new();
    scores.insert("word_count".into(), 0usize.into());
    let mut outcome = RuleOutcome::new(TEXT_BASELINE);
    outcome.note(INSUFFICIENT_TEXT);
    outcome.finish(scores, NO_INDICATORS)
}

/// Full text analysis: measures, reasoning judgment, paraphrase consistency, rules.
pub async fn analyze_text(text: &str, reasoning: &ReasoningAdapter) -> CategoryResult {
    let measures = measure_text(text);
    if measures.word_count == 0 {
        return insufficient_text();
    }

    let (judgment, paraphrase_consistent) =
        tokio::join!(reasoning.judge(text), reasoning.consistency_check(text));

    let result = score_text(&TextSignals {
        measures,
        judgment,
        paraphrase_consistent,
    });
    info!(
        "[TEXT_FORENSICS] words={} ai_probability={} findings={}",
        measures.word_count,
        result.ai_probability,
        result.findings.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reasoning::tests::{ai_like_judgment, FakeReasoner};
    use std::time::Duration;

    const REVIEW: &str = "The product is great. I love it. It works well. Highly recommend.";

    fn signals(text: &str, judgment: StructuredJudgment, paraphrase: bool) -> TextSignals {
        TextSignals {
            measures: measure_text(text),
            judgment,
            paraphrase_consistent: paraphrase,
        }
    }

    #[tokio::test]
    async fn test_short_review_with_fallback_reasoning() {
        let result = analyze_text(REVIEW, &ReasoningAdapter::offline()).await;
        assert!(result.ai_probability > TEXT_BASELINE);
        assert!(result
            .findings
            .iter()
            .any(|f| f.message == "Highly uniform sentence structure"));
        assert_eq!(result.forensic_notes.as_deref(), Some("Reasoning service unavailable"));
        assert_eq!(
            result.category_scores.get("paraphrase_consistency"),
            Some(&SignalValue::Flag(false))
        );
    }

    #[tokio::test]
    async fn test_service_error_still_produces_valid_result() {
        let adapter = ReasoningAdapter::new(
            Box::new(FakeReasoner { judgment: None, paraphrase: None, delay: None }),
            Duration::from_secs(5),
        );
        let result = analyze_text(REVIEW, &adapter).await;
        assert!((0.0..=95.0).contains(&result.ai_probability));
        assert!(!result.findings.is_empty());
    }

    #[test]
    fn test_all_rules_trigger_and_clamp() {
        let text = "word word word word word word word word word word word word.";
        let result = score_text(&signals(text, ai_like_judgment(), true));
        // 30 + 10*3 + 15 + 10*3 + 15 = 120 before the ceiling
        assert_eq!(result.ai_probability, 95.0);
        assert_eq!(result.findings.len(), TEXT_RULES.len());
    }

    #[test]
    fn test_varied_human_text_gets_benign_finding() {
        let text = "Yesterday my grandmother finally taught me her secret dumpling recipe after years of asking. \
                    We laughed. Honestly, I burned the first batch completely because I was distracted by the football match on the radio, \
                    but she insisted we eat them anyway and told stories about her village.";
        let result = score_text(&signals(text, StructuredJudgment::fallback(), false));
        assert_eq!(result.ai_probability, TEXT_BASELINE);
        assert_eq!(result.findings.len(), 1);
        assert!(result.findings[0].signal.is_none());
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let s = signals(REVIEW, ai_like_judgment(), false);
        assert_eq!(score_text(&s), score_text(&s));
    }

    #[tokio::test]
    async fn test_empty_text_short_circuits() {
        let result = analyze_text("  \n ", &ReasoningAdapter::offline()).await;
        assert_eq!(result.ai_probability, TEXT_BASELINE);
        assert_eq!(result.findings[0].message, INSUFFICIENT_TEXT);
    }
}
