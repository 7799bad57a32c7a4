// Audio Processing Service
// Summary statistics over frame-level features handed over by the audio extractor.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::text_processor::{mean, population_variance};

/// Frame-level features for one recording. Series are per analysis frame; `pitches`
/// and `magnitudes` are parallel pitch-tracking bins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFeatureFrames {
    #[serde(default, alias = "spectral_centroid")]
    pub spectral_centroid: Vec<f64>,
    #[serde(default, alias = "spectral_bandwidth")]
    pub spectral_bandwidth: Vec<f64>,
    #[serde(default, alias = "zero_crossing_rate")]
    pub zero_crossing_rate: Vec<f64>,
    #[serde(default)]
    pub pitches: Vec<f64>,
    #[serde(default)]
    pub magnitudes: Vec<f64>,
}

impl AudioFeatureFrames {
    pub fn is_empty(&self) -> bool {
        self.spectral_centroid.is_empty()
            && self.spectral_bandwidth.is_empty()
            && self.zero_crossing_rate.is_empty()
            && self.pitches.is_empty()
    }
}

/// Produces frame features for an audio file.
pub trait AudioFeatureSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<AudioFeatureFrames, String>;
}

/// Reads features precomputed by an external extractor and stored as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFeatureFile;

impl AudioFeatureSource for JsonFeatureFile {
    fn extract(&self, path: &Path) -> Result<AudioFeatureFrames, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read audio features {}: {}", path.display(), e))?;
        serde_json::from_str(&content).map_err(|e| format!("Invalid audio feature file: {}", e))
    }
}

/// Per-recording summary. A measure is `None` when its source series carried no
/// finite values, so absent evidence never reads as a real value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioMeasures {
    pub centroid: Option<f64>,
    pub bandwidth: Option<f64>,
    pub pitch_variance: Option<f64>,
    pub zero_crossing_rate: Option<f64>,
}

impl AudioMeasures {
    /// Names of the measures that could not be computed, in rule order.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("spectral centroid", self.centroid),
            ("spectral bandwidth", self.bandwidth),
            ("pitch", self.pitch_variance),
            ("zero-crossing rate", self.zero_crossing_rate),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

pub fn spectral_centroid_mean(frames: &AudioFeatureFrames) -> Option<f64> {
    finite_mean(&frames.spectral_centroid)
}

pub fn spectral_bandwidth_mean(frames: &AudioFeatureFrames) -> Option<f64> {
    finite_mean(&frames.spectral_bandwidth)
}

pub fn zero_crossing_rate_mean(frames: &AudioFeatureFrames) -> Option<f64> {
    finite_mean(&frames.zero_crossing_rate)
}

/// Variance of pitch bins whose magnitude is strictly above the median magnitude.
/// `None` without paired pitch and magnitude bins.
pub fn pitch_variance(frames: &AudioFeatureFrames) -> Option<f64> {
    let n = frames.pitches.len().min(frames.magnitudes.len());
    if n == 0 {
        return None;
    }
    let magnitudes = &frames.magnitudes[..n];
    let threshold = median(magnitudes);
    let selected: Vec<f64> = frames.pitches[..n]
        .iter()
        .zip(magnitudes)
        .filter(|(p, m)| **m > threshold && p.is_finite())
        .map(|(p, _)| *p)
        .collect();
    Some(population_variance(&selected))
}

pub fn measure_audio(frames: &AudioFeatureFrames) -> AudioMeasures {
    AudioMeasures {
        centroid: spectral_centroid_mean(frames),
        bandwidth: spectral_bandwidth_mean(frames),
        pitch_variance: pitch_variance(frames),
        zero_crossing_rate: zero_crossing_rate_mean(frames),
    }
}

fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(mean(&finite))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
