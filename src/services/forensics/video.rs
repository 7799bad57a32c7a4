// Video Forensics
// Frame sampling, concurrent per-frame vision analysis and cross-frame aggregation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{clamp_probability, round2, AggregateResult, CategoryScores, Finding, SampleResult};
use crate::services::config_store::VideoConfig;
use crate::services::reasoning::VisionReasoner;
use crate::services::text_processor::{mean, population_variance};

use super::error::{ForensicsError, ForensicsResult};
use super::image::{load_image, score_visual};

/// Fewer analysable frames than this yields the neutral result.
pub const MIN_SAMPLES: usize = 3;
pub const NEUTRAL_PROBABILITY: f64 = 50.0;
pub const VARIANCE_THRESHOLD: f64 = 400.0;
pub const INCONSISTENCY_BONUS: f64 = 15.0;
/// Per-frame records kept in the report. Statistics use every frame.
pub const MAX_SAMPLE_RECORDS: usize = 10;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// One frame's analysis. `None` when the frame could not be analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub id: String,
    pub ai_probability: Option<f64>,
}

impl SampleOutcome {
    pub fn scored(id: impl Into<String>, ai_probability: f64) -> Self {
        Self { id: id.into(), ai_probability: Some(ai_probability) }
    }

    pub fn failed(id: impl Into<String>) -> Self {
        Self { id: id.into(), ai_probability: None }
    }
}

// ============ Frame Sources ============

/// Produces the ordered frame images to analyse for one video. May be empty.
pub trait FrameSource: Send + Sync {
    fn extract_frames(&self, video: &Path, interval_secs: f64) -> ForensicsResult<Vec<PathBuf>>;
}

/// Directory of already decoded frames, named so that lexical order is temporal order.
pub struct DirectoryFrames {
    pub source_fps: f64,
}

impl DirectoryFrames {
    pub fn new(source_fps: f64) -> Self {
        Self { source_fps }
    }

    fn step(&self, interval_secs: f64) -> usize {
        let step = (self.source_fps * interval_secs) as usize;
        step.max(1)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for DirectoryFrames {
    fn extract_frames(&self, video: &Path, interval_secs: f64) -> ForensicsResult<Vec<PathBuf>> {
        if !video.is_dir() {
            return Err(ForensicsError::UnsupportedFormat {
                modality: "video".to_string(),
                detail: format!("{} is not a directory of decoded frames", video.display()),
            });
        }
        let entries = std::fs::read_dir(video).map_err(|e| ForensicsError::unreadable(video, e))?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        frames.sort();

        let step = self.step(interval_secs);
        Ok(frames.into_iter().step_by(step).collect())
    }
}

// ============ Aggregation ============

fn frame_scores(average: f64, variance: f64, analyzed: usize) -> CategoryScores {
    let mut scores = CategoryScores::new();
    scores.insert("average_frame_ai".into(), round2(average).into());
    scores.insert("temporal_variance".into(), round2(variance).into());
    scores.insert("frames_analyzed".into(), analyzed.into());
    scores
}

fn neutral(message: &str, analyzed: usize) -> AggregateResult {
    AggregateResult {
        ai_probability: NEUTRAL_PROBABILITY,
        category_scores: frame_scores(NEUTRAL_PROBABILITY, 0.0, analyzed),
        sample_results: Vec::new(),
        findings: vec![Finding::note(message)],
    }
}

pub fn insufficient_samples() -> AggregateResult {
    neutral("Insufficient frames for reliable analysis", 0)
}

/// Combine per-frame outcomes into one result. Pure and order-preserving.
pub fn aggregate_samples(samples: &[SampleOutcome]) -> AggregateResult {
    if samples.len() < MIN_SAMPLES {
        return insufficient_samples();
    }

    let scored: Vec<(&str, f64)> = samples
        .iter()
        .filter_map(|s| s.ai_probability.map(|p| (s.id.as_str(), clamp_probability(p))))
        .collect();
    if scored.is_empty() {
        return neutral("Frame analysis failed", 0);
    }

    let values: Vec<f64> = scored.iter().map(|(_, p)| *p).collect();
    let variance = population_variance(&values);
    let mut average = mean(&values);
    let mut findings = Vec::new();

    if variance > VARIANCE_THRESHOLD {
        average += INCONSISTENCY_BONUS;
        findings.push(Finding::triggered(
            "temporal_variance",
            "Significant temporal inconsistency detected across frames",
        ));
    }
    if average > 60.0 {
        findings.push(Finding::triggered(
            "average_frame_ai",
            "Multiple frames exhibit AI-generated characteristics",
        ));
    }
    if average < 35.0 {
        findings.push(Finding::note("Frames show consistent real-world visual patterns"));
    }
    if findings.is_empty() {
        findings.push(Finding::note("Frame-level probabilities are temporally consistent"));
    }

    AggregateResult {
        ai_probability: clamp_probability(average),
        category_scores: frame_scores(average, variance, values.len()),
        sample_results: scored
            .iter()
            .take(MAX_SAMPLE_RECORDS)
            .map(|(id, p)| SampleResult { id: id.to_string(), ai_probability: *p })
            .collect(),
        findings,
    }
}

// ============ Frame Analysis ============

async fn analyze_frame(path: PathBuf, vision: Arc<dyn VisionReasoner>, timeout: Duration) -> SampleOutcome {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let image = match load_image(&path) {
        Ok(image) => image,
        Err(e) => {
            warn!("[VIDEO_FORENSICS] frame {} unreadable: {}", id, e);
            return SampleOutcome::failed(id);
        }
    };

    match tokio::time::timeout(timeout, vision.inspect(image)).await {
        Ok(Ok(judgment)) => SampleOutcome::scored(id, score_visual(&judgment).ai_probability),
        Ok(Err(e)) => {
            warn!("[VIDEO_FORENSICS] frame {} analysis failed: {}", id, e);
            SampleOutcome::failed(id)
        }
        Err(_) => {
            warn!("[VIDEO_FORENSICS] frame {} timed out after {:?}", id, timeout);
            SampleOutcome::failed(id)
        }
    }
}

/// Analyse every frame with at most `max_concurrency` in flight.
/// Results come back in frame order whatever order the tasks finish in.
pub async fn analyze_frames(
    frames: Vec<PathBuf>,
    vision: Arc<dyn VisionReasoner>,
    config: &VideoConfig,
) -> Vec<SampleOutcome> {
    let started = Instant::now();
    let total = frames.len();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let timeout = Duration::from_secs(config.frame_timeout_secs);
    let mut join_set: JoinSet<(usize, SampleOutcome)> = JoinSet::new();

    for (idx, path) in frames.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let vision = vision.clone();
        join_set.spawn(async move {
            let id = path.display().to_string();
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => analyze_frame(path, vision, timeout).await,
                Err(_) => SampleOutcome::failed(id),
            };
            (idx, outcome)
        });
    }

    let mut outcomes: Vec<(usize, SampleOutcome)> = Vec::with_capacity(total);
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(pair) => outcomes.push(pair),
            Err(e) => warn!("[VIDEO_FORENSICS] frame task failed: {}", e),
        }
    }
    outcomes.sort_by_key(|(idx, _)| *idx);

    info!(
        "[VIDEO_FORENSICS] analysed {}/{} frames (elapsed_ms={})",
        outcomes.iter().filter(|(_, o)| o.ai_probability.is_some()).count(),
        total,
        started.elapsed().as_millis()
    );
    outcomes.into_iter().map(|(_, o)| o).collect()
}

/// Sample frames, analyse them concurrently and aggregate. Only an unreadable
/// frame source is an error; individual frame failures are absorbed.
pub async fn analyze_video(
    video: &Path,
    source: &dyn FrameSource,
    vision: Arc<dyn VisionReasoner>,
    config: &VideoConfig,
) -> ForensicsResult<AggregateResult> {
    let frames = source.extract_frames(video, config.frame_interval_secs)?;
    if frames.len() < MIN_SAMPLES {
        info!("[VIDEO_FORENSICS] only {} frames sampled", frames.len());
        return Ok(insufficient_samples());
    }

    let outcomes = analyze_frames(frames, vision, config).await;
    let result = aggregate_samples(&outcomes);
    info!(
        "[VIDEO_FORENSICS] frames={} ai_probability={:.2}",
        outcomes.len(),
        result.ai_probability
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalValue;
    use crate::services::forensics::image::tests::ByteVision;

    fn scored(values: &[f64]) -> Vec<SampleOutcome> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SampleOutcome::scored(format!("frame_{}.jpg", i), *v))
            .collect()
    }

    #[test]
    fn test_two_samples_are_insufficient() {
        let result = aggregate_samples(&scored(&[90.0, 90.0]));
        assert_eq!(result.ai_probability, 50.0);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].message, "Insufficient frames for reliable analysis");
        assert!(result.sample_results.is_empty());
    }

    #[test]
    fn test_identical_samples() {
        let result = aggregate_samples(&scored(&[40.0, 40.0, 40.0]));
        assert_eq!(result.ai_probability, 40.0);
        assert_eq!(result.category_scores["temporal_variance"], SignalValue::Number(0.0));
        assert!(result.findings.iter().all(|f| f.signal.as_deref() != Some("temporal_variance")));
        assert_eq!(result.sample_results.len(), 3);
    }

    #[test]
    fn test_inconsistent_samples_get_bonus() {
        let result = aggregate_samples(&scored(&[10.0, 90.0, 10.0]));
        assert_eq!(
            result.findings[0].message,
            "Significant temporal inconsistency detected across frames"
        );
        // mean 36.67 + 15
        assert!((result.ai_probability - 51.666_666).abs() < 1e-3);
        match result.category_scores["temporal_variance"] {
            SignalValue::Number(v) => assert!(v > 400.0),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bonus_is_capped() {
        let result = aggregate_samples(&scored(&[95.0, 95.0, 95.0, 95.0, 20.0]));
        assert_eq!(result.ai_probability, 95.0);
        assert!(result
            .findings
            .iter()
            .any(|f| f.message == "Multiple frames exhibit AI-generated characteristics"));
    }

    #[test]
    fn test_all_failed() {
        let samples: Vec<_> = (0..4).map(|i| SampleOutcome::failed(format!("f{}", i))).collect();
        let result = aggregate_samples(&samples);
        assert_eq!(result.ai_probability, 50.0);
        assert_eq!(result.findings[0].message, "Frame analysis failed");
    }

    #[test]
    fn test_sample_records_are_bounded() {
        let result = aggregate_samples(&scored(&[20.0; 25]));
        assert_eq!(result.sample_results.len(), MAX_SAMPLE_RECORDS);
        assert_eq!(result.category_scores["frames_analyzed"], SignalValue::Number(25.0));
        assert_eq!(result.findings[0].message, "Frames show consistent real-world visual patterns");
    }

    #[test]
    fn test_directory_frames_sampling() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("frame_{:03}.jpg", i)), [1u8]).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let frames = DirectoryFrames::new(3.0).extract_frames(dir.path(), 1.0).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_000.jpg", "frame_003.jpg", "frame_006.jpg", "frame_009.jpg"]);
    }

    #[test]
    fn test_directory_frames_rejects_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(DirectoryFrames::new(1.0).extract_frames(file.path(), 1.0).is_err());
    }

    #[tokio::test]
    async fn test_analyze_video_with_partial_failures() {
        let dir = tempfile::tempdir().unwrap();
        // first byte drives the fake vision score; 0xFF fails
        for (i, b) in [30u8, 0xFF, 50, 40, 0xFF].iter().enumerate() {
            std::fs::write(dir.path().join(format!("frame_{}.png", i)), [*b]).unwrap();
        }
        let config = VideoConfig { max_concurrency: 2, ..VideoConfig::default() };
        let result = analyze_video(dir.path(), &DirectoryFrames::new(1.0), Arc::new(ByteVision), &config)
            .await
            .unwrap();

        assert_eq!(result.category_scores["frames_analyzed"], SignalValue::Number(3.0));
        let ids: Vec<_> = result.sample_results.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["frame_0.png", "frame_2.png", "frame_3.png"]);
        assert!((result.ai_probability - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_too_few_frames_skip_analysis() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), [10u8]).unwrap();
        let result = analyze_video(dir.path(), &DirectoryFrames::new(1.0), Arc::new(ByteVision), &VideoConfig::default())
            .await
            .unwrap();
        assert_eq!(result.findings[0].message, "Insufficient frames for reliable analysis");
    }
}
