//! OpenAI-compatible remote backend.
//!
//! [`RemoteBackend`] works with any API that follows the OpenAI chat
//! completion format, which covers all three remote scoring sources
//! (OpenAI, Gemini's compatibility endpoint, xAI).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sentira_types::BackendId;

use crate::error::{BackendError, Result};
use crate::transport::{BackendRequest, Transport};
use crate::wire::{ChatMessage, ChatRequest, ChatResponse};

/// Configuration for one remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Which backend identity this endpoint serves.
    pub id: BackendId,

    /// Base URL for the OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable that holds the API key.
    pub api_key_env: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Extra HTTP headers to include in every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds. Defaults to 120.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// The built-in remote endpoint table.
pub fn builtin_remotes() -> Vec<RemoteConfig> {
    vec![
        RemoteConfig {
            id: BackendId::Gpt4,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            model: "gpt-4o".into(),
            headers: HashMap::new(),
            timeout_secs: None,
        },
        RemoteConfig {
            id: BackendId::Gemini,
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key_env: "GOOGLE_GEMINI_API_KEY".into(),
            model: "gemini-2.5-flash".into(),
            headers: HashMap::new(),
            timeout_secs: None,
        },
        RemoteConfig {
            id: BackendId::Grok,
            base_url: "https://api.x.ai/v1".into(),
            api_key_env: "XAI_API_KEY".into(),
            model: "grok-3-mini".into(),
            headers: HashMap::new(),
            timeout_secs: None,
        },
    ]
}

/// A remote scoring backend speaking the OpenAI chat-completions protocol.
pub struct RemoteBackend {
    config: RemoteConfig,
    http: reqwest::Client,
    api_key: Option<String>,
}

impl RemoteBackend {
    /// Create a backend from configuration. The API key is resolved from
    /// `config.api_key_env` at request time.
    pub fn new(config: RemoteConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_secs.unwrap_or(120),
            ))
            .build()
            .unwrap_or_default();
        Self { config, http, api_key: None }
    }

    /// Create a backend with an explicit API key, bypassing the
    /// environment lookup.
    pub fn with_api_key(config: RemoteConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::new(config)
        }
    }

    /// Returns the endpoint configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Resolve the API key: explicit key > environment variable.
    fn resolve_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.config.api_key_env).map_err(|_| {
            BackendError::NotConfigured(format!("set {} env var", self.config.api_key_env))
        })
    }
}

/// Pull a retry delay (in ms) out of a 429 response's Retry-After header.
fn parse_retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .map(|secs| (secs * 1000.0) as u64)
}

#[async_trait]
impl Transport for RemoteBackend {
    fn id(&self) -> BackendId {
        self.config.id
    }

    async fn send(&self, request: &BackendRequest) -> Result<String> {
        let api_key = self.resolve_api_key()?;
        let url = self.completions_url();

        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &request.instruction {
            messages.push(ChatMessage::system(instruction.clone()));
        }
        messages.push(ChatMessage::user(request.text.clone()));

        let chat_request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(512),
            temperature: Some(0.0),
        };

        debug!(
            backend = %self.config.id,
            model = %self.config.model,
            "sending chat completion request"
        );

        let mut req = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");

        for (k, v) in &self.config.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.json(&chat_request).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_ms = parse_retry_after_ms(&response).unwrap_or(1000);
                warn!(
                    backend = %self.config.id,
                    retry_after_ms = retry_ms,
                    "rate limited"
                );
                return Err(BackendError::RateLimited { retry_after_ms: retry_ms });
            }

            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(BackendError::AuthFailed(body));
            }

            return Err(BackendError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("response carried no choices".into()))?;

        Ok(choice.message.content)
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("id", &self.config.id)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
