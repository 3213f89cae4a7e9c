//! Answer generation with a provider fallback chain.
//!
//! Providers implement [`AnswerProvider`] and are tried in order: the
//! operator-preferred cloud provider first (`AI_PROVIDER`), then any other
//! configured cloud provider, then [`LocalFallback`], which needs no
//! credentials and always succeeds. The pipeline therefore never hard-fails
//! at the generation stage for lack of an API key.
//!
//! The fallback receives the structured [`Prompt`] (question and context)
//! directly rather than re-parsing the rendered template, so template
//! changes cannot silently break it.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::Config;

/// Fixed system instruction restricting answers to the supplied context.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers strictly using the \
    provided context. If the answer is not in the context, say you don't know and suggest \
    where to look in the document.";

/// Generation parameters, fixed low-temperature for grounded answers.
const TEMPERATURE: f64 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Structured question-plus-context input for answer generation.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub question: String,
    /// Retrieved chunk texts as a bulleted list, ranked order.
    pub context: String,
}

impl Prompt {
    /// Assemble a prompt from the question and retrieved chunk texts.
    pub fn new(question: &str, chunk_texts: &[String]) -> Self {
        let context = chunk_texts
            .iter()
            .map(|t| format!("- {}", t))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            question: question.to_string(),
            context,
        }
    }

    /// Render the fixed user-prompt template sent to cloud providers.
    pub fn render(&self) -> String {
        format!(
            "Answer the question using only the context below.\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
            self.context, self.question
        )
    }
}

/// A single answer backend.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, system_prompt: &str, prompt: &Prompt) -> Result<String>;
}

// ============ OpenAI ============

/// Chat completions via `POST https://api.openai.com/v1/chat/completions`.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.openai_chat_model.clone(),
        })
    }
}

#[async_trait]
impl AnswerProvider for OpenAiChat {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, system_prompt: &str, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": prompt.render()},
            ],
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI chat error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI chat response: missing content"))
    }
}

// ============ Gemini ============

/// Generation via the Gemini `generateContent` REST endpoint.
///
/// Gemini has no separate system role in this API shape, so the system
/// instruction is prepended to the user prompt, as the upstream SDKs do.
pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiChat {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.gemini_model.clone(),
        })
    }
}

#[async_trait]
impl AnswerProvider for GeminiChat {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, system_prompt: &str, prompt: &Prompt) -> Result<String> {
        let full_prompt = format!("{}\n\n{}", system_prompt, prompt.render());
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": full_prompt}]}],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate text"))
    }
}

// ============ Local fallback ============

/// Terminal fallback provider: no external model, no credentials.
///
/// Echoes the retrieved context back in a templated message that is
/// explicitly flagged as degraded and tells the operator how to configure a
/// real provider.
pub struct LocalFallback;

#[async_trait]
impl AnswerProvider for LocalFallback {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate(&self, _system_prompt: &str, prompt: &Prompt) -> Result<String> {
        let question = if prompt.question.trim().is_empty() {
            "your question"
        } else {
            prompt.question.trim()
        };
        let context = if prompt.context.trim().is_empty() {
            "the provided context"
        } else {
            prompt.context.trim()
        };

        Ok(format!(
            "Based on the document content, here's what I found regarding your question about \
             \"{}\":\n\n{}\n\nNote: This is a basic local response. For more sophisticated \
             AI-powered answers, please configure either an OpenAI API key or a Google Gemini \
             API key.\n\nTo get better responses:\n1. Get an OpenAI API key from \
             https://platform.openai.com/api-keys\n2. Or get a Gemini API key from \
             https://aistudio.google.com/app/apikey\n3. Set OPENAI_API_KEY or GEMINI_API_KEY in \
             the service environment.\n\nThe document has been successfully processed and \
             indexed. You can see the relevant chunks above that match your question.",
            question, context
        ))
    }
}

// ============ Fallback chain ============

/// Ordered provider chain ending in the always-available local fallback.
pub struct AnswerGenerator {
    providers: Vec<Box<dyn AnswerProvider>>,
}

impl AnswerGenerator {
    /// Build the chain from configuration: the preferred provider first,
    /// then the other cloud provider when configured, then the local
    /// fallback.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Box<dyn AnswerProvider>> = Vec::new();

        let openai: Option<Box<dyn AnswerProvider>> = OpenAiChat::new(config)
            .ok()
            .map(|p| Box::new(p) as Box<dyn AnswerProvider>);
        let gemini: Option<Box<dyn AnswerProvider>> = GeminiChat::new(config)
            .ok()
            .map(|p| Box::new(p) as Box<dyn AnswerProvider>);

        let ordered = if config.ai_provider == "gemini" {
            [gemini, openai]
        } else {
            [openai, gemini]
        };
        for provider in ordered.into_iter().flatten() {
            providers.push(provider);
        }
        providers.push(Box::new(LocalFallback));

        Self { providers }
    }

    /// Names of the providers in fall-through order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Generate an answer, falling through the chain on provider failure.
    pub async fn generate(&self, system_prompt: &str, prompt: &Prompt) -> Result<String> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.generate(system_prompt, prompt).await {
                Ok(answer) => {
                    tracing::debug!(provider = provider.name(), "answer generated");
                    return Ok(answer);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "answer provider failed, falling through");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("No answer providers configured")))
    }
}
