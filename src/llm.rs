//! Chat-completion backend.
//!
//! [`ChatModel`] is the seam between the orchestrator and the language
//! model; the production implementation speaks the OpenAI-compatible
//! `/chat/completions` protocol and works against OpenRouter or OpenAI,
//! picking sensible defaults from the shape of the credential.
//!
//! The API key lives only in the client struct. It is never logged and
//! never persisted, and it can be swapped at runtime without rebuilding
//! anything else.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LlmConfig;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-oss-120b:free";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Failure while configuring or calling the chat backend.
#[derive(Debug)]
pub enum LlmError {
    /// No API key was supplied and none was found in the environment.
    MissingCredential,
    Config(String),
    /// The backend refused or the response was unusable. The backend's own
    /// message is preserved verbatim.
    Backend(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::MissingCredential => write!(
                f,
                "no API key found; pass one explicitly or set OPENROUTER_API_KEY / OPENAI_API_KEY"
            ),
            LlmError::Config(e) => write!(f, "chat model configuration error: {}", e),
            LlmError::Backend(e) => write!(f, "chat backend error: {}", e),
        }
    }
}

impl std::error::Error for LlmError {}

/// Trait for chat-completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion: system instructions plus a single user message,
    /// returning the generated text. Not retried internally.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Replace the credential used for subsequent calls.
    fn set_api_key(&mut self, key: String);
}

/// Chat client for OpenAI-compatible completion endpoints.
pub struct OpenAiChat {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Resolve the credential: explicit argument first, then the OpenRouter and
/// OpenAI environment variables.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<String, LlmError> {
    if let Some(key) = explicit {
        if !key.trim().is_empty() {
            return Ok(key.to_string());
        }
    }
    for var in ["OPENROUTER_API_KEY", "OPENAI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
    }
    Err(LlmError::MissingCredential)
}

/// Pick (model, base URL) defaults from the credential's shape: OpenRouter
/// keys start with `sk-or-`, and an OpenRouter key in the environment also
/// signals OpenRouter usage. Config values override both.
fn resolve_endpoint(config: &LlmConfig, api_key: &str) -> (String, String) {
    let is_openrouter =
        api_key.starts_with("sk-or-") || std::env::var("OPENROUTER_API_KEY").is_ok();

    let (default_model, default_base) = if is_openrouter {
        (OPENROUTER_DEFAULT_MODEL, OPENROUTER_BASE_URL)
    } else {
        (OPENAI_DEFAULT_MODEL, OPENAI_BASE_URL)
    };

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| default_model.to_string());
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base.to_string())
        .trim_end_matches('/')
        .to_string();

    (model, base_url)
}

impl OpenAiChat {
    /// Build a client from config plus an optional explicit key.
    ///
    /// Fails with [`LlmError::MissingCredential`] when no key can be
    /// resolved — the caller decides whether to defer construction or
    /// reject the request.
    pub fn new(config: &LlmConfig, api_key: Option<&str>) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(api_key)?;
        let (model, base_url) = resolve_endpoint(config, &api_key);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            model,
            base_url,
            api_key,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "chat API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Backend("chat response contained no content".to_string()))
    }

    fn set_api_key(&mut self, key: String) {
        self.api_key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let key = resolve_api_key(Some("sk-explicit")).unwrap();
        assert_eq!(key, "sk-explicit");
    }

    #[test]
    fn test_blank_explicit_key_rejected_without_env() {
        // Only meaningful when the environment has no keys; skip otherwise
        // rather than mutate process-global env from a test.
        if std::env::var("OPENROUTER_API_KEY").is_err()
            && std::env::var("OPENAI_API_KEY").is_err()
        {
            assert!(matches!(
                resolve_api_key(Some("   ")),
                Err(LlmError::MissingCredential)
            ));
            assert!(matches!(
                resolve_api_key(None),
                Err(LlmError::MissingCredential)
            ));
        }
    }

    #[test]
    fn test_openrouter_key_selects_openrouter_defaults() {
        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            return;
        }
        let config = LlmConfig::default();
        let (model, base) = resolve_endpoint(&config, "sk-or-v1-abcdef");
        assert_eq!(base, OPENROUTER_BASE_URL);
        assert_eq!(model, OPENROUTER_DEFAULT_MODEL);
    }

    #[test]
    fn test_plain_key_selects_openai_defaults() {
        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            return;
        }
        let config = LlmConfig::default();
        let (model, base) = resolve_endpoint(&config, "sk-plain");
        assert_eq!(base, OPENAI_BASE_URL);
        assert_eq!(model, OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn test_config_overrides_endpoint_defaults() {
        let config = LlmConfig {
            model: Some("my-model".to_string()),
            base_url: Some("https://llm.internal/v1/".to_string()),
            timeout_secs: 60,
        };
        let (model, base) = resolve_endpoint(&config, "sk-or-whatever");
        assert_eq!(model, "my-model");
        assert_eq!(base, "https://llm.internal/v1");
    }

    #[test]
    fn test_debug_never_shows_key() {
        let config = LlmConfig::default();
        let chat = OpenAiChat::new(&config, Some("sk-secret-123")).unwrap();
        let rendered = format!("{:?}", chat);
        assert!(!rendered.contains("sk-secret-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
