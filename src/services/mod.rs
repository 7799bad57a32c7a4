// Authenex Core Services
// Signal analyzers, extractors, reasoning adapters and the forensic scorers

pub mod text_processor;
pub mod audio_processor;
pub mod document_extractor;
pub mod config_store;
pub mod providers;
pub mod reasoning;
pub mod forensics;

pub use config_store::{AppConfig, ConfigStore};
pub use providers::{ProviderClient, ProviderError};
pub use reasoning::{ReasoningAdapter, TextReasoner, VisionReasoner};

pub use forensics::{ForensicsEngine, ForensicsError};
