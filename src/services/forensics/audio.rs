// Audio Forensics
// Spectral and pitch evidence typical of neural vocoders.

use std::path::Path;
use tracing::info;

use crate::models::{round2, CategoryResult, CategoryScores};
use crate::services::audio_processor::{measure_audio, AudioFeatureFrames, AudioFeatureSource, AudioMeasures};

use super::error::ForensicsError;
use super::rules::{EvidenceRule, RuleOutcome};

pub const AUDIO_BASELINE: f64 = 30.0;
const NO_INDICATORS: &str = "Audio characteristics consistent with natural human speech";
const INSUFFICIENT_AUDIO: &str = "Insufficient audio for spectral analysis";

// A measure that could not be computed never satisfies its rule.

fn low_centroid(m: &AudioMeasures) -> bool {
    m.centroid.is_some_and(|c| c < 2000.0)
}

fn narrow_bandwidth(m: &AudioMeasures) -> bool {
    m.bandwidth.is_some_and(|b| b < 1200.0)
}

fn smooth_pitch(m: &AudioMeasures) -> bool {
    m.pitch_variance.is_some_and(|v| v < 50.0)
}

fn abnormal_zcr(m: &AudioMeasures) -> bool {
    m.zero_crossing_rate.is_some_and(|z| !(0.02..=0.15).contains(&z))
}

pub const AUDIO_RULES: &[EvidenceRule<AudioMeasures>] = &[
    EvidenceRule {
        signal: "spectral_centroid",
        predicate: low_centroid,
        delta: 15,
        finding: "Unnaturally low spectral centroid detected",
    },
    EvidenceRule {
        signal: "spectral_bandwidth",
        predicate: narrow_bandwidth,
        delta: 15,
        finding: "Compressed spectral bandwidth detected",
    },
    EvidenceRule {
        signal: "pitch_variance",
        predicate: smooth_pitch,
        delta: 20,
        finding: "Unnaturally smooth pitch contours detected",
    },
    EvidenceRule {
        signal: "zero_crossing_rate",
        predicate: abnormal_zcr,
        delta: 10,
        finding: "Abnormal zero-crossing rate detected",
    },
];

fn audio_scores(m: &AudioMeasures) -> CategoryScores {
    let mut scores = CategoryScores::new();
    if let Some(centroid) = m.centroid {
        scores.insert("spectral_centroid".into(), round2(centroid).into());
    }
    if let Some(bandwidth) = m.bandwidth {
        scores.insert("spectral_bandwidth".into(), round2(bandwidth).into());
    }
    if let Some(variance) = m.pitch_variance {
        scores.insert("pitch_variance".into(), round2(variance).into());
    }
    if let Some(zcr) = m.zero_crossing_rate {
        scores.insert("zero_crossing_rate".into(), ((zcr * 10_000.0).round() / 10_000.0).into());
    }
    scores
}

pub fn score_audio(frames: &AudioFeatureFrames) -> CategoryResult {
    let measures = measure_audio(frames);
    let mut outcome = RuleOutcome::new(AUDIO_BASELINE);

    if frames.is_empty() {
        outcome.note(INSUFFICIENT_AUDIO);
    } else {
        outcome.apply(AUDIO_RULES, &measures);
        for series in measures.missing() {
            outcome.note(format!("Insufficient {} data, check skipped", series));
        }
    }

    outcome.finish(audio_scores(&measures), NO_INDICATORS)
}

/// Extract features for `path` and score them. Only an unreadable source is an error.
pub fn analyze_audio(path: &Path, source: &dyn AudioFeatureSource) -> Result<CategoryResult, ForensicsError> {
    let frames = source
        .extract(path)
        .map_err(|reason| ForensicsError::unreadable(path, reason))?;
    let result = score_audio(&frames);
    info!(
        "[AUDIO_FORENSICS] frames={} ai_probability={}",
        frames.spectral_centroid.len(),
        result.ai_probability
    );
    Ok(result)
}
