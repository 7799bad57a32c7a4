// Forensics Engine
// Runs one modality scorer, fuses its result into a trust verdict and explains it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::{AnalysisReport, Modality, SourceData};
use crate::services::audio_processor::{AudioFeatureSource, JsonFeatureFile};
use crate::services::config_store::AppConfig;
use crate::services::providers::ProviderClient;
use crate::services::reasoning::{OfflineReasoner, ReasoningAdapter, ServiceReasoner, VisionReasoner};

use super::error::{ForensicsError, ForensicsResult};
use super::explain::generate_explanation;
use super::trust::trust_for_result;
use super::video::{DirectoryFrames, FrameSource};
use super::{audio, document, email, image, text, video};

pub struct ForensicsEngine {
    config: AppConfig,
    reasoning: ReasoningAdapter,
    vision: Arc<dyn VisionReasoner>,
    audio_source: Box<dyn AudioFeatureSource>,
    frame_source: Box<dyn FrameSource>,
}

impl ForensicsEngine {
    pub fn new(config: AppConfig, reasoning: ReasoningAdapter, vision: Arc<dyn VisionReasoner>) -> Self {
        let frame_source = Box::new(DirectoryFrames::new(config.video.source_fps));
        Self {
            config,
            reasoning,
            vision,
            audio_source: Box::new(JsonFeatureFile),
            frame_source,
        }
    }

    /// Wire the hosted reasoning service when it is enabled and has a key;
    /// otherwise every reasoning call takes the fallback path.
    pub fn from_config(config: AppConfig, offline: bool) -> Self {
        let service = if offline || !config.reasoning.enabled {
            None
        } else {
            let base_url = |name: &str| config.providers.get(name).and_then(|p| p.base_url.clone());
            let client = ProviderClient::new().with_urls(base_url("gemini"), base_url("openai"));
            match ServiceReasoner::from_config(client, &config.reasoning) {
                Ok(service) => Some(service),
                Err(e) => {
                    warn!("[ENGINE] {}, reasoning disabled", e);
                    None
                }
            }
        };
        let timeout = Duration::from_secs(config.reasoning.timeout_secs);

        match service {
            Some(service) => {
                let reasoning = ReasoningAdapter::new(Box::new(service.clone()), timeout);
                Self::new(config, reasoning, Arc::new(service))
            }
            None => {
                info!("[ENGINE] reasoning service offline, using fallback judgments");
                Self::new(config, ReasoningAdapter::new(Box::new(OfflineReasoner), timeout), Arc::new(OfflineReasoner))
            }
        }
    }

    pub fn with_audio_source(mut self, source: Box<dyn AudioFeatureSource>) -> Self {
        self.audio_source = source;
        self
    }

    pub fn with_frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.frame_source = source;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn report(&self, modality: Modality, source: SourceData) -> AnalysisReport {
        let verdict = trust_for_result(source, &self.config.fusion);
        let explanation = generate_explanation(verdict.source_data.findings(), verdict.final_ai_probability);
        AnalysisReport {
            request_id: uuid::Uuid::new_v4().to_string(),
            modality,
            generated_at: chrono::Utc::now().to_rfc3339(),
            verdict,
            explanation,
        }
    }

    pub async fn analyze_text(&self, body: &str) -> AnalysisReport {
        let result = text::analyze_text(body, &self.reasoning).await;
        self.report(Modality::Text, SourceData::Category(result))
    }

    pub async fn analyze_email(&self, body: &str) -> AnalysisReport {
        let result = email::analyze_email(body, &self.reasoning).await;
        self.report(Modality::Email, SourceData::Category(result))
    }

    pub async fn analyze_document(&self, path: &Path) -> ForensicsResult<AnalysisReport> {
        let result = document::analyze_document(path, None, &self.reasoning).await?;
        Ok(self.report(Modality::Document, SourceData::Category(result)))
    }

    pub fn analyze_audio(&self, path: &Path) -> ForensicsResult<AnalysisReport> {
        let result = audio::analyze_audio(path, self.audio_source.as_ref())?;
        Ok(self.report(Modality::Audio, SourceData::Category(result)))
    }

    pub async fn analyze_image(&self, path: &Path) -> ForensicsResult<AnalysisReport> {
        let timeout = Duration::from_secs(self.config.reasoning.timeout_secs);
        let result = image::analyze_image(path, self.vision.as_ref(), timeout).await?;
        Ok(self.report(Modality::Image, SourceData::Category(result)))
    }

    pub async fn analyze_video(&self, path: &Path) -> ForensicsResult<AnalysisReport> {
        let result = video::analyze_video(
            path,
            self.frame_source.as_ref(),
            self.vision.clone(),
            &self.config.video,
        )
        .await?;
        Ok(self.report(Modality::Video, SourceData::Aggregate(result)))
    }

    /// Dispatch on modality. Text and email inputs are read from `path` as UTF-8.
    pub async fn analyze_path(&self, modality: Modality, path: &Path) -> ForensicsResult<AnalysisReport> {
        info!("[ENGINE] analyzing {} input {}", modality, path.display());
        match modality {
            Modality::Text => Ok(self.analyze_text(&read_text(path)?).await),
            Modality::Email => Ok(self.analyze_email(&read_text(path)?).await),
            Modality::Document => self.analyze_document(path).await,
            Modality::Audio => self.analyze_audio(path),
            Modality::Image => self.analyze_image(path).await,
            Modality::Video => self.analyze_video(path).await,
        }
    }
}

fn read_text(path: &Path) -> ForensicsResult<String> {
    std::fs::read_to_string(path).map_err(|e| ForensicsError::unreadable(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignalValue, Verdict};
    use crate::services::forensics::image::tests::ByteVision;

    fn offline_engine() -> ForensicsEngine {
        ForensicsEngine::from_config(AppConfig::default(), true)
    }

    #[tokio::test]
    async fn test_text_report_end_to_end() {
        let report = offline_engine()
            .analyze_text("The product is great. I love it. It works well. Highly recommend.")
            .await;
        assert_eq!(report.modality, Modality::Text);
        assert!(report.explanation.starts_with("Deepfake probability "));
        assert!(report.explanation.contains("Highly uniform sentence structure"));
        let v = &report.verdict;
        assert_eq!(v.trust_score as f64, (100.0 - v.final_ai_probability).round());
        assert!(!report.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_image_report_uses_vision_probability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.jpg");
        std::fs::write(&path, [90u8]).unwrap();

        let engine = ForensicsEngine::new(AppConfig::default(), ReasoningAdapter::offline(), Arc::new(ByteVision));
        let report = engine.analyze_path(Modality::Image, &path).await.unwrap();
        // 0.6*90 + 0.4*50
        assert!((report.verdict.final_ai_probability - 74.0).abs() < 1e-9);
        assert_eq!(report.verdict.trust_score, 26);
        assert_eq!(report.verdict.verdict, Verdict::LikelyAiGenerated);
    }

    #[tokio::test]
    async fn test_video_report_carries_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(dir.path().join(format!("f{}.jpg", i)), [20u8]).unwrap();
        }
        let engine = ForensicsEngine::new(AppConfig::default(), ReasoningAdapter::offline(), Arc::new(ByteVision));
        let report = engine.analyze_video(dir.path()).await.unwrap();
        match &report.verdict.source_data {
            SourceData::Aggregate(agg) => {
                assert_eq!(agg.ai_probability, 20.0);
                assert_eq!(agg.category_scores["frames_analyzed"], SignalValue::Number(3.0));
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_text_file_is_fatal() {
        let err = offline_engine()
            .analyze_path(Modality::Text, Path::new("/nonexistent/input.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForensicsError::Unreadable { .. }));
    }
}
