// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningConfig {
    /// `name[:model]`, e.g. `gemini:gemini-2.5-flash`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_paraphrase_temperature")]
    pub paraphrase_temperature: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_reasoning_timeout(),
            paraphrase_temperature: default_paraphrase_temperature(),
            enabled: true,
        }
    }
}

/// Fusion weights, category defaults and verdict thresholds in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    #[serde(default = "default_category_weights")]
    pub category_weights: Vec<CategoryWeight>,
    #[serde(default = "default_external_weight")]
    pub external_weight: f64,
    #[serde(default = "default_category_blend")]
    pub category_weight: f64,
    #[serde(default)]
    pub thresholds: VerdictThresholds,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            category_weights: default_category_weights(),
            external_weight: default_external_weight(),
            category_weight: default_category_blend(),
            thresholds: VerdictThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWeight {
    pub name: String,
    pub weight: f64,
    #[serde(default = "default_category_score")]
    pub default_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictThresholds {
    pub real: i32,
    pub likely_real: i32,
    pub suspicious: i32,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            real: 85,
            likely_real: 65,
            suspicious: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    #[serde(default = "default_frame_interval")]
    pub frame_interval_secs: f64,
    #[serde(default = "default_source_fps")]
    pub source_fps: f64,
    #[serde(default = "default_frame_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_frame_timeout")]
    pub frame_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: default_frame_interval(),
            source_fps: default_source_fps(),
            max_concurrency: default_frame_concurrency(),
            frame_timeout_secs: default_frame_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_true() -> bool { true }
fn default_provider() -> String { "gemini:gemini-2.5-flash".to_string() }
fn default_reasoning_timeout() -> u64 { 30 }
fn default_paraphrase_temperature() -> f64 { 0.7 }
fn default_external_weight() -> f64 { 0.6 }
fn default_category_blend() -> f64 { 0.4 }
fn default_category_score() -> f64 { 50.0 }
fn default_frame_interval() -> f64 { 1.0 }
fn default_source_fps() -> f64 { 1.0 }
fn default_frame_concurrency() -> usize { 4 }
fn default_frame_timeout() -> u64 { 45 }

fn default_category_weights() -> Vec<CategoryWeight> {
    [
        ("texture", 0.25),
        ("lighting", 0.20),
        ("anatomy", 0.20),
        ("background", 0.15),
        ("semantics", 0.20),
    ]
    .into_iter()
    .map(|(name, weight)| CategoryWeight {
        name: name.to_string(),
        weight,
        default_score: default_category_score(),
    })
    .collect()
}

const BACKUP_KEEP: usize = 10;

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("authenex"))
    }

    /// Load from the default location, falling back to built-in defaults.
    pub fn load_default() -> AppConfig {
        Self::default_config_dir()
            .map(Self::new)
            .and_then(|store| match store.load() {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("[CONFIG] {}; using defaults", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Write `config`, first copying the current file into `backups/`.
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            let backup = self.create_backup()?;
            tracing::info!("[CONFIG] previous config backed up to {}", backup.display());
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config {}: {}", self.config_file.display(), e))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    fn create_backup(&self) -> Result<PathBuf, String> {
        let backup_dir = self.backup_dir();
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", stamp));
        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        prune_backups(&backup_dir, BACKUP_KEEP)?;
        Ok(backup_file)
    }

    /// Read the file at this store's location without the defaults fallback.
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        Ok(self.load()?.api_keys.get(provider).cloned())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Refusing to store an empty API key for {}", provider));
        }
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Point `provider` at a different endpoint, e.g. a self-hosted gateway.
    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Provider URL must be http(s): {}", url));
        }
        let mut config = self.load()?;
        config
            .providers
            .entry(provider.to_string())
            .or_insert_with(|| ProviderConfig {
                enabled: true,
                ..ProviderConfig::default()
            })
            .base_url = Some(url.trim_end_matches('/').to_string());
        self.save(&config)
    }
}

/// Backup names embed a sortable UTC timestamp, so name order is age order.
fn prune_backups(backup_dir: &Path, keep: usize) -> Result<(), String> {
    let mut backups: Vec<PathBuf> = fs::read_dir(backup_dir)
        .map_err(|e| format!("Failed to read backup dir: {}", e))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("config_") && n.ends_with(".json"))
        })
        .collect();

    if backups.len() <= keep {
        return Ok(());
    }
    backups.sort();
    let excess = backups.len() - keep;
    for old in backups.into_iter().take(excess) {
        if let Err(e) = fs::remove_file(&old) {
            tracing::warn!("[CONFIG] failed to remove old backup {}: {}", old.display(), e);
        }
    }
    Ok(())
}
