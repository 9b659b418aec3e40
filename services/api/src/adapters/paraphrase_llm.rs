//! services/api/src/adapters/paraphrase_llm.rs
//!
//! This module contains the adapter for the paraphrasing LLM.
//! It implements the `ParaphraseService` port from the `core` crate against any
//! OpenAI-compatible chat endpoint; by default a local Ollama server.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use pharmacheck_core::ports::{ParaphraseService, PortError, PortResult};
use regex::Regex;
use tracing::debug;

const PROMPT_TEMPLATE: &str = "Pretend you are a clinical physician. Translate the following \
professional drug interaction description into a more consumer-friendly description. Write the \
consumer-friendly description only; do not prepend anything before your response:\n\n{text}";

// Lead-ins small models add despite the instruction.
const PREAMBLE_PATTERN: &str =
    r#"(?i)^\s*(?:sure[!.,]?\s*)?(?:here(?:'s| is)[^:\n]*:|consumer[- ]friendly description:)\s*"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ParaphraseService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiParaphraseAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    preamble: Regex,
}

impl OpenAiParaphraseAdapter {
    /// Creates a new `OpenAiParaphraseAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> PortResult<Self> {
        let preamble =
            Regex::new(PREAMBLE_PATTERN).map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            client,
            model,
            preamble,
        })
    }

    /// Trims the reply and removes a leading "Here is ...:" line.
    fn clean_reply(&self, reply: &str) -> String {
        let stripped = self.preamble.replace(reply, "");
        stripped.trim().trim_matches('"').trim().to_string()
    }
}

//=========================================================================================
// `ParaphraseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ParaphraseService for OpenAiParaphraseAdapter {
    async fn paraphrase(&self, professional_text: &str) -> PortResult<String> {
        let prompt = PROMPT_TEMPLATE.replace("{text}", professional_text);

        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        )];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let reply = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No description generated".to_string()))?;

        let cleaned = self.clean_reply(&reply);
        if cleaned.is_empty() {
            return Err(PortError::Unexpected("Empty description generated".to_string()));
        }
        debug!(model = %self.model, chars = cleaned.len(), "paraphrase received");
        Ok(cleaned)
    }
}
