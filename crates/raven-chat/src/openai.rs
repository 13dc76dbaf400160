//! OpenAI chat-completions generator.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use raven_core::{Error, RavenConfig, Result};

use crate::types::{ContextPassage, GeneratedAnswer};
use crate::Generator;

const SYSTEM_PROMPT: &str = "\
You are an AI assistant for answering questions about laboratory regulatory matters.
You are given the following extracted text from a list of regulations and a question.
Provide a professional and complete answer.
Base your answer solely on the information provided in the prompts.
Do not make up answers or provide answers from sources other than the extracted text.
Provide a reference for each assertion you make.
If you don't know the answer, say 'Sorry, I am not sure.'.
If the question is not about laboratory policies or regulations, inform them that you are tuned to only answer questions about laboratory regulations.";

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Generator backed by the OpenAI `/chat/completions` endpoint,
/// non-streaming.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &RavenConfig) -> Result<Self> {
        Self::with_endpoint(
            &config.api_base,
            &config.api_key,
            &config.chat_model,
            config.request_timeout_secs,
        )
    }

    pub fn with_endpoint(
        api_base: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

/// Render the retrieved passages into one prompt block, each passage tagged
/// with its section identifier so the model can cite it.
fn render_context(context: &[ContextPassage]) -> String {
    context
        .iter()
        .map(|p| format!("[{}]\n{}", p.source, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &[ContextPassage],
    ) -> Result<GeneratedAnswer> {
        let url = format!("{}/chat/completions", self.api_base);
        let user_message = format!(
            "Extracted regulation text:\n\n{}\n\nQuestion: {}",
            render_context(context),
            question
        );
        debug!(
            "Generating answer with {} context passages",
            context.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": user_message },
                ],
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("chat request: {}", e))
                } else {
                    Error::Generation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "chat request failed with {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Generation("chat response had no choices".into()))?;
        Ok(GeneratedAnswer {
            text: choice.message.content,
            model: parsed.model,
        })
    }
}
