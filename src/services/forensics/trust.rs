// Trust Fusion
// Blends the holistic AI probability with weighted category scores into a trust verdict.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::models::{clamp_probability, SourceData, TrustVerdict, Verdict, PROBABILITY_CEILING};
use crate::services::config_store::{FusionConfig, VerdictThresholds};

/// Used when the holistic probability is missing or unusable.
pub const DEFAULT_AI_PERCENTAGE: f64 = 50.0;

/// Read a number out of loosely typed input. Numeric strings are accepted;
/// anything else (null, bool, NaN, text) yields `None`.
fn numeric(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Category score clamped to `[0, 100]`, `None` when malformed.
pub fn category_value(value: Option<&Value>) -> Option<f64> {
    numeric(value).map(|n| n.clamp(0.0, 100.0))
}

pub fn coerce_category(value: Option<&Value>, default: f64) -> f64 {
    category_value(value).unwrap_or(default)
}

/// Holistic probability in `[0, 95]`, or the 50 default when malformed.
pub fn coerce_ai_percentage(value: Option<&Value>) -> f64 {
    numeric(value)
        .map(clamp_probability)
        .unwrap_or(DEFAULT_AI_PERCENTAGE)
}

/// Weighted sum over the configured categories, defaults filling the gaps.
pub fn weighted_category_score(categories: &Map<String, Value>, config: &FusionConfig) -> f64 {
    config
        .category_weights
        .iter()
        .map(|c| c.weight * coerce_category(categories.get(&c.name), c.default_score))
        .sum()
}

/// Lower bounds are inclusive.
pub fn verdict_for(trust_score: u8, thresholds: &VerdictThresholds) -> Verdict {
    let score = trust_score as i32;
    if score >= thresholds.real {
        Verdict::Real
    } else if score >= thresholds.likely_real {
        Verdict::LikelyReal
    } else if score >= thresholds.suspicious {
        Verdict::Suspicious
    } else {
        Verdict::LikelyAiGenerated
    }
}

pub fn trust_score_for(final_ai_probability: f64) -> u8 {
    (100.0 - final_ai_probability).round().clamp(0.0, 100.0) as u8
}

/// Fuse raw, possibly malformed, inputs. The fused probability is not re-clamped;
/// values above the per-modality ceiling are flagged instead.
pub fn compute_trust(
    ai_percentage: Option<&Value>,
    categories: &Map<String, Value>,
    config: &FusionConfig,
    source_data: SourceData,
) -> TrustVerdict {
    let ai_pct = coerce_ai_percentage(ai_percentage);
    let weighted = weighted_category_score(categories, config);
    let final_ai_probability = config.external_weight * ai_pct + config.category_weight * weighted;

    let exceeds_ceiling = final_ai_probability > PROBABILITY_CEILING;
    if exceeds_ceiling {
        warn!(
            "[TRUST] fused probability {:.2} exceeds the {} ceiling",
            final_ai_probability, PROBABILITY_CEILING
        );
    }

    let trust_score = trust_score_for(final_ai_probability);
    let verdict = verdict_for(trust_score, &config.thresholds);
    info!(
        "[TRUST] ai_pct={} weighted={:.2} final={:.2} trust={} verdict={}",
        ai_pct,
        weighted,
        final_ai_probability,
        trust_score,
        verdict.label()
    );

    TrustVerdict {
        trust_score,
        verdict,
        final_ai_probability,
        exceeds_ceiling,
        source_data,
    }
}

/// Fuse a modality result: its probability is the holistic input and its
/// category-score map supplies whatever fusion categories it carries.
pub fn trust_for_result(source_data: SourceData, config: &FusionConfig) -> TrustVerdict {
    let ai_pct = Value::from(source_data.ai_probability());
    let categories: Map<String, Value> = source_data
        .category_scores()
        .iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
        .collect();
    compute_trust(Some(&ai_pct), &categories, config, source_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryResult, CategoryScores, Finding, SignalValue};
    use serde_json::json;

    fn source(ai: f64) -> SourceData {
        SourceData::Category(CategoryResult {
            ai_probability: ai,
            category_scores: CategoryScores::new(),
            findings: vec![Finding::note("n")],
            forensic_notes: None,
        })
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_all_defaults_are_suspicious() {
        let v = compute_trust(None, &Map::new(), &FusionConfig::default(), source(50.0));
        assert!((v.final_ai_probability - 50.0).abs() < 1e-9);
        assert_eq!(v.trust_score, 50);
        assert_eq!(v.verdict, Verdict::Suspicious);
        assert!(!v.exceeds_ceiling);
    }

    #[test]
    fn test_verdict_boundaries() {
        let t = VerdictThresholds::default();
        assert_eq!(verdict_for(85, &t), Verdict::Real);
        assert_eq!(verdict_for(84, &t), Verdict::LikelyReal);
        assert_eq!(verdict_for(65, &t), Verdict::LikelyReal);
        assert_eq!(verdict_for(64, &t), Verdict::Suspicious);
        assert_eq!(verdict_for(45, &t), Verdict::Suspicious);
        assert_eq!(verdict_for(44, &t), Verdict::LikelyAiGenerated);
        assert_eq!(verdict_for(0, &t), Verdict::LikelyAiGenerated);
        assert_eq!(verdict_for(100, &t), Verdict::Real);
    }

    #[test]
    fn test_weighted_blend() {
        let categories = map(json!({
            "texture": 80, "lighting": 60, "anatomy": 40, "background": 20, "semantics": 100
        }));
        // 0.25*80 + 0.2*60 + 0.2*40 + 0.15*20 + 0.2*100 = 63
        let weighted = weighted_category_score(&categories, &FusionConfig::default());
        assert!((weighted - 63.0).abs() < 1e-9);

        let v = compute_trust(Some(&json!(20)), &categories, &FusionConfig::default(), source(20.0));
        // 0.6*20 + 0.4*63 = 37.2
        assert!((v.final_ai_probability - 37.2).abs() < 1e-9);
        assert_eq!(v.trust_score, 63);
        assert_eq!(v.verdict, Verdict::Suspicious);
    }

    #[test]
    fn test_malformed_input_coerces_to_defaults() {
        let categories = map(json!({
            "texture": "high", "lighting": null, "anatomy": "70", "background": true, "semantics": -20
        }));
        assert_eq!(coerce_category(categories.get("texture"), 50.0), 50.0);
        assert_eq!(coerce_category(categories.get("lighting"), 50.0), 50.0);
        assert_eq!(coerce_category(categories.get("anatomy"), 50.0), 70.0);
        assert_eq!(coerce_category(categories.get("background"), 50.0), 50.0);
        assert_eq!(coerce_category(categories.get("semantics"), 50.0), 0.0);
        assert_eq!(coerce_ai_percentage(Some(&json!("not a number"))), DEFAULT_AI_PERCENTAGE);
        assert_eq!(coerce_ai_percentage(Some(&json!(0))), 0.0);
        assert_eq!(coerce_ai_percentage(Some(&json!(140))), 95.0);

        let v = compute_trust(Some(&json!({"nested": 1})), &categories, &FusionConfig::default(), source(50.0));
        assert!(v.trust_score <= 100);
    }

    #[test]
    fn test_fused_probability_above_ceiling_is_flagged_not_clamped() {
        let categories = map(json!({
            "texture": 100, "lighting": 100, "anatomy": 100, "background": 100, "semantics": 100
        }));
        let v = compute_trust(Some(&json!(95)), &categories, &FusionConfig::default(), source(95.0));
        // 0.6*95 + 0.4*100 = 97
        assert!((v.final_ai_probability - 97.0).abs() < 1e-9);
        assert!(v.exceeds_ceiling);
        assert_eq!(v.trust_score, 3);
        assert_eq!(v.verdict, Verdict::LikelyAiGenerated);
    }

    #[test]
    fn test_trust_for_result_uses_carried_categories() {
        let mut scores = CategoryScores::new();
        scores.insert("texture".into(), SignalValue::Number(90.0));
        scores.insert("repetition".into(), SignalValue::Number(0.5));
        let data = SourceData::Category(CategoryResult {
            ai_probability: 30.0,
            category_scores: scores,
            findings: vec![Finding::note("n")],
            forensic_notes: None,
        });
        let v = trust_for_result(data, &FusionConfig::default());
        // weighted = 0.25*90 + 0.75*50 = 60; final = 18 + 24 = 42
        assert!((v.final_ai_probability - 42.0).abs() < 1e-9);
        assert_eq!(v.trust_score, 58);
    }
}
