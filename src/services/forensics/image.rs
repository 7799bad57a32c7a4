// Image Forensics
// Vision reasoning judgment mapped onto fusion categories.

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::{round2, CategoryResult, CategoryScores, Finding, VisualJudgment};
use crate::services::providers::InlineImage;
use crate::services::reasoning::{ReasoningError, VisionReasoner};

use super::error::{ForensicsError, ForensicsResult};
use super::trust::{category_value, coerce_ai_percentage};

/// Visual categories the vision service is asked to score.
pub const VISUAL_CATEGORIES: &[&str] = &["texture", "lighting", "anatomy", "background", "semantics"];

const NO_INDICATORS: &str = "No visual manipulation indicators reported";
const VISION_UNAVAILABLE: &str = "Visual reasoning unavailable";

/// Map a vision judgment onto a bounded result. Categories the service left out,
/// or sent in an unusable shape, are omitted so fusion applies its defaults.
pub fn score_visual(judgment: &VisualJudgment) -> CategoryResult {
    let ai_probability = coerce_ai_percentage(judgment.ai_percentage.as_ref());

    let mut category_scores = CategoryScores::new();
    for name in VISUAL_CATEGORIES {
        if let Some(score) = category_value(judgment.category_scores.get(*name)) {
            category_scores.insert(name.to_string(), round2(score).into());
        }
    }

    let mut findings: Vec<Finding> = judgment
        .findings
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(|f| Finding::triggered("visual_reasoning", f))
        .collect();
    if findings.is_empty() {
        findings.push(Finding::note(NO_INDICATORS));
    }

    CategoryResult {
        ai_probability,
        category_scores,
        findings,
        forensic_notes: None,
    }
}

/// Neutral result when the vision service cannot answer.
pub fn vision_fallback() -> CategoryResult {
    CategoryResult {
        ai_probability: coerce_ai_percentage(None),
        category_scores: CategoryScores::new(),
        findings: vec![Finding::note(VISION_UNAVAILABLE)],
        forensic_notes: None,
    }
}

/// Ask the vision service about an already loaded image. Never fails.
pub async fn inspect_image(image: InlineImage, vision: &dyn VisionReasoner, timeout: Duration) -> CategoryResult {
    let result = match tokio::time::timeout(timeout, vision.inspect(image)).await {
        Ok(res) => res,
        Err(_) => Err(ReasoningError::Timeout(timeout)),
    };
    match result {
        Ok(judgment) => score_visual(&judgment),
        Err(e) => {
            warn!("[IMAGE_FORENSICS] vision reasoning unavailable: {}", e);
            vision_fallback()
        }
    }
}

pub fn load_image(path: &Path) -> ForensicsResult<InlineImage> {
    let data = std::fs::read(path).map_err(|e| ForensicsError::unreadable(path, e))?;
    if data.is_empty() {
        return Err(ForensicsError::unreadable(path, "empty file"));
    }
    Ok(InlineImage {
        mime_type: InlineImage::mime_for_path(path).to_string(),
        data,
    })
}

/// Only an unreadable image is an error.
pub async fn analyze_image(
    path: &Path,
    vision: &dyn VisionReasoner,
    timeout: Duration,
) -> ForensicsResult<CategoryResult> {
    let image = load_image(path)?;
    let bytes = image.data.len();
    let result = inspect_image(image, vision, timeout).await;
    info!(
        "[IMAGE_FORENSICS] bytes={} ai_probability={} categories={}",
        bytes,
        result.ai_probability,
        result.category_scores.len()
    );
    Ok(result)
}
