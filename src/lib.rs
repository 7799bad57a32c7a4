pub mod models;
pub mod services;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use models::{AnalysisReport, Modality};
use services::config_store::{AppConfig, ConfigStore};
use services::forensics::{ForensicsEngine, ForensicsError};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "authenex_";
const LOG_KEEP: usize = 30;

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Initialize logging: console on stderr plus one log file per session.
/// Stdout stays clean for report JSON.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env_flag("AUTHENEX_DISABLE_FILE_LOG") {
        init_console_only_logging(env_filter);
        info!("File logging disabled via AUTHENEX_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("AUTHENEX_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => get_logs_dir(),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        init_console_only_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_PREFIX, timestamp);

    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    info!("=== Authenex {} ===", env!("CARGO_PKG_VERSION"));
    info!("Log file: {}/{}", logs_dir.display(), log_filename);

    // Cleanup runs off the startup path.
    std::thread::spawn(move || {
        cleanup_old_logs(&logs_dir, LOG_KEEP);
    });
}

fn get_logs_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("logs")
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(data_dir) = dirs::data_local_dir() {
            return data_dir.join("authenex").join("logs");
        }
        PathBuf::from("logs")
    }
}

fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with(LOG_PREFIX) && name.ends_with(".log")
    });

    if entries.len() <= keep {
        return;
    }

    entries.sort_by_key(|e| {
        e.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let remove_count = entries.len().saturating_sub(keep);
    for entry in entries.into_iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
}

fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

// ============ Command Line ============

pub const USAGE: &str = "Usage:\n  authenex <text|email|document|audio|video|image> <path> [--provider <name[:model]>] [--out <json_path>] [--offline]\n  authenex config <set-key|set-url|show> ...\n\nNotes:\n  - text/email read the file as UTF-8.\n  - audio expects a JSON feature file; video expects a directory of decoded frames.\n  - --offline skips the reasoning service and uses fallback judgments.";

pub fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

pub fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub modality: Modality,
    pub path: PathBuf,
    pub provider: Option<String>,
    pub out: Option<PathBuf>,
    pub offline: bool,
}

impl CliArgs {
    /// `args` excludes the program name.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let modality_arg = args.first().ok_or_else(|| USAGE.to_string())?;
        let modality = Modality::parse(modality_arg)
            .ok_or_else(|| format!("unknown modality '{}'\n\n{}", modality_arg, USAGE))?;
        let path = args
            .get(1)
            .filter(|p| !p.starts_with("--"))
            .ok_or_else(|| format!("missing input path\n\n{}", USAGE))?;

        Ok(Self {
            modality,
            path: PathBuf::from(path),
            provider: parse_arg_value(args, "--provider"),
            out: parse_arg_value(args, "--out").map(PathBuf::from),
            offline: has_flag(args, "--offline"),
        })
    }

    /// Apply command-line overrides on top of the stored configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = &self.provider {
            config.reasoning.provider = provider.clone();
        }
        if self.offline {
            config.reasoning.enabled = false;
        }
    }
}

// ============ Config Command ============

pub const CONFIG_USAGE: &str = "Usage:\n  authenex config set-key <provider> <api_key>\n  authenex config set-url <provider> <base_url>\n  authenex config show";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    SetKey { provider: String, key: String },
    SetUrl { provider: String, url: String },
    Show,
}

impl ConfigCommand {
    /// `args` are the words after `config`.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["set-key", provider, key] => Ok(Self::SetKey {
                provider: provider.to_lowercase(),
                key: key.to_string(),
            }),
            ["set-url", provider, url] => Ok(Self::SetUrl {
                provider: provider.to_lowercase(),
                url: url.to_string(),
            }),
            ["show"] => Ok(Self::Show),
            _ => Err(CONFIG_USAGE.to_string()),
        }
    }
}

fn mask_key(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if key.chars().count() <= 8 {
        "********".to_string()
    } else {
        format!("****{}", tail)
    }
}

/// Apply `cmd` to `store` and return the text to show the user.
pub fn run_config(cmd: &ConfigCommand, store: &ConfigStore) -> Result<String, String> {
    match cmd {
        ConfigCommand::SetKey { provider, key } => {
            store.set_api_key(provider, key)?;
            info!("[CONFIG] stored API key for {}", provider);
            Ok(format!("Stored API key for {}", provider))
        }
        ConfigCommand::SetUrl { provider, url } => {
            store.set_provider_url(provider, url)?;
            info!("[CONFIG] base URL for {} set to {}", provider, url);
            Ok(format!("Base URL for {} set to {}", provider, url))
        }
        ConfigCommand::Show => {
            let mut config = store.load()?;
            for key in config.api_keys.values_mut() {
                *key = mask_key(key);
            }
            serde_json::to_string_pretty(&config).map_err(|e| format!("Failed to serialize config: {}", e))
        }
    }
}

/// Load config, build the engine and analyze the requested input.
pub async fn run(args: &CliArgs) -> Result<AnalysisReport, ForensicsError> {
    let mut config = ConfigStore::load_default();
    args.apply(&mut config);
    let engine = ForensicsEngine::from_config(config, args.offline);
    engine.analyze_path(args.modality, &args.path).await
}
