//! Language-model clients.
//!
//! | Config value | Client | Default model |
//! |--------------|--------|---------------|
//! | `"disabled"` | [`DisabledModel`] | none |
//! | `"openai"` | [`ChatCompletionsModel`] against `api.openai.com` (`OPENAI_API_KEY`) | `gpt-4o-mini` |
//! | `"groq"` | [`ChatCompletionsModel`] against Groq's OpenAI-compatible API (`GROQ_API_KEY`) | `llama3-70b-8192` |
//! | `"ollama"` | [`OllamaChatModel`] against `/api/chat` | `llama3` |
//!
//! All clients send a single user message and return the assistant text.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lexctx_core::llm::LanguageModel;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::http;

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OutMsg {
    content: Option<String>,
}

/// Placeholder used when no provider is configured. Every call fails with
/// [`LlmError::Disabled`], which callers treat as "skip this step".
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(LlmError::Disabled.into())
    }
}

// ============ OpenAI-compatible chat completions (OpenAI, Groq) ============

pub struct ChatCompletionsModel {
    service: &'static str,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsModel {
    pub fn openai(config: &LlmConfig) -> Result<Self> {
        Self::build(
            config,
            "OpenAI chat",
            "OPENAI_API_KEY",
            "https://api.openai.com/v1",
            "gpt-4o-mini",
        )
    }

    pub fn groq(config: &LlmConfig) -> Result<Self> {
        Self::build(
            config,
            "Groq chat",
            "GROQ_API_KEY",
            "https://api.groq.com/openai/v1",
            "llama3-70b-8192",
        )
    }

    fn build(
        config: &LlmConfig,
        service: &'static str,
        key_var: &str,
        default_base: &str,
        default_model: &str,
    ) -> Result<Self> {
        let api_key = std::env::var(key_var)
            .map_err(|_| anyhow!("{} environment variable not set", key_var))?;
        let base = config
            .url
            .as_deref()
            .unwrap_or(default_base)
            .trim_end_matches('/');

        Ok(Self {
            service,
            url: format!("{}/chat/completions", base),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: OutMsg,
        }

        let body = serde_json::to_value(Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })?;

        let json = http::post_json(
            &self.client,
            &self.url,
            Some(self.api_key.as_str()),
            &body,
            self.max_retries,
            self.service,
        )
        .await
        .map_err(LlmError::from)?;

        let resp: Resp = serde_json::from_value(json)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;
        Ok(text)
    }
}

// ============ Ollama ============

pub struct OllamaChatModel {
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = config
            .url
            .as_deref()
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');
        Ok(Self {
            url: format!("{}/api/chat", base),
            model: config.model.clone().unwrap_or_else(|| "llama3".to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            stream: bool,
            options: Options,
        }
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
            num_predict: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            message: Option<OutMsg>,
        }

        let body = serde_json::to_value(Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: Options {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        })?;

        let json = http::post_json(
            &self.client,
            &self.url,
            None,
            &body,
            self.max_retries,
            "Ollama chat",
        )
        .await
        .map_err(LlmError::from)?;

        let resp: Resp = serde_json::from_value(json)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(resp
            .message
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

/// Build the [`LanguageModel`] named by `config.provider`.
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(ChatCompletionsModel::openai(config)?)),
        "groq" => Ok(Arc::new(ChatCompletionsModel::groq(config)?)),
        "ollama" => Ok(Arc::new(OllamaChatModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_model_reports_disabled() {
        let llm = create_llm(&LlmConfig::default()).unwrap();
        let err = llm.complete("anything").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::Disabled)));
    }

    #[test]
    fn ollama_defaults_to_local_host() {
        let cfg = LlmConfig {
            provider: "ollama".into(),
            ..LlmConfig::default()
        };
        let model = OllamaChatModel::new(&cfg).unwrap();
        assert_eq!(model.url, "http://localhost:11434/api/chat");
        assert_eq!(model.model_name(), "llama3");
    }

    #[test]
    fn chat_completions_url_respects_override() {
        std::env::set_var("LEXCTX_TEST_KEY", "k");
        let cfg = LlmConfig {
            url: Some("http://gateway.local/v1/".into()),
            ..LlmConfig::default()
        };
        let model = ChatCompletionsModel::build(
            &cfg,
            "test",
            "LEXCTX_TEST_KEY",
            "https://unused",
            "m",
        )
        .unwrap();
        assert_eq!(model.url, "http://gateway.local/v1/chat/completions");
        assert_eq!(model.model_name(), "m");
    }
}
