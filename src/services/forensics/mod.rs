// Forensics Module
// Per-modality scorers, cross-frame aggregation, trust fusion and explanations

pub mod audio;
pub mod document;
pub mod email;
pub mod engine;
pub mod error;
pub mod explain;
pub mod image;
pub mod rules;
pub mod text;
pub mod trust;
pub mod video;

pub use audio::{analyze_audio, score_audio};
pub use document::{analyze_document, score_document};
pub use email::{analyze_email, score_email};
pub use engine::ForensicsEngine;
pub use error::{ForensicsError, ForensicsResult};
pub use explain::generate_explanation;
pub use image::{analyze_image, score_visual};
pub use rules::{EvidenceRule, RuleOutcome};
pub use text::{analyze_text, score_text, TextSignals};
pub use trust::{compute_trust, trust_for_result, verdict_for};
pub use video::{aggregate_samples, analyze_video, DirectoryFrames, FrameSource, SampleOutcome};
