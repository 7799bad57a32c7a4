// AI Provider Service
// Implements Gemini (native generateContent) and OpenAI-compatible chat calls

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for {0}")]
    MissingApiKey(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    let (name, model) = if parts.len() == 2 {
        (parts[0].trim().to_lowercase(), parts[1].trim().to_string())
    } else {
        (spec.trim().to_lowercase(), String::new())
    };
    let model = if model.is_empty() {
        match name.as_str() {
            "gemini" => GEMINI_DEFAULT_MODEL.to_string(),
            "openai" => "gpt-4o-mini".to_string(),
            _ => model,
        }
    } else {
        model
    };
    ProviderSpec { name, model }
}

/// Binary attachment sent alongside a prompt (vision calls).
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn mime_for_path(path: &std::path::Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// Shared HTTP client. `reqwest::Client` is internally reference counted, so one
/// instance can serve concurrent frame analyses.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    gemini_url: String,
    openai_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let gemini_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string());
        let openai_url =
            env::var("OPENAI_API_URL").unwrap_or_else(|_| OPENAI_DEFAULT_URL.to_string());

        Self {
            client,
            gemini_url,
            openai_url,
        }
    }

    /// Override endpoints (config file `providers.<name>.baseUrl`).
    pub fn with_urls(mut self, gemini_url: Option<String>, openai_url: Option<String>) -> Self {
        if let Some(url) = gemini_url {
            self.gemini_url = url;
        }
        if let Some(url) = openai_url {
            self.openai_url = url;
        }
        self
    }

    /// Dispatch a text prompt to the provider named in `spec`.
    pub async fn generate(
        &self,
        spec: &ProviderSpec,
        api_key: &str,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        match spec.name.as_str() {
            "gemini" => {
                self.call_gemini(&spec.model, api_key, system, user, None, temperature, max_tokens)
                    .await
            }
            "openai" => {
                self.call_chat_api(&spec.model, api_key, system, user, temperature, max_tokens)
                    .await
            }
            other => Err(ProviderError::UnsupportedProvider(other.to_string())),
        }
    }

    pub async fn call_gemini(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        image: Option<&InlineImage>,
        temperature: f64,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let url = format!("{}/{}:generateContent", self.gemini_url.trim_end_matches('/'), model);

        let mut parts = vec![serde_json::json!({ "text": user })];
        if let Some(img) = image {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": img.mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(&img.data),
                }
            }));
        }

        let mut request = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            }
        });
        if !system.is_empty() {
            request["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        // {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|s| !s.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_chat_api(
        &self,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature,
            response_format: if system.to_lowercase().contains("json") {
                Some(ResponseFormat {
                    r#type: "json_object".to_string(),
                })
            } else {
                None
            },
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.openai_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

/// Pull the outermost JSON object out of a model response that may carry prose or code fences.
pub fn extract_json(content: &str) -> Result<&str, ProviderError> {
    let content = content.trim();
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&content[start..=end]),
        _ => Err(ProviderError::JsonError("No JSON object in response".to_string())),
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys: &[&str] = match provider {
        "gemini" => &["GEMINI_API_KEY", "AUTHENEX_GEMINI_API_KEY"],
        "openai" => &["OPENAI_API_KEY", "AUTHENEX_OPENAI_API_KEY"],
        _ => &[],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
    }

    None
}
