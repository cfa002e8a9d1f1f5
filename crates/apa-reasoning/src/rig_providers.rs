//! `ModelProvider` adapters backed by `rig-core`, one per chat-completion
//! and message-style backend named in spec.md §6 ("Chat-completion and
//! message-style are both supported"). Both reduce token accounting to the
//! same `ProviderCompletion` shape: OpenAI reports a single `total_tokens`,
//! split in half between input/output since Rig's `Agent::prompt` doesn't
//! expose the split; Anthropic is approximated the same way pending a Rig
//! API that surfaces it directly.

use async_trait::async_trait;

use apa_core::error::{Error, Result};

use crate::providers::{ModelProvider, ProviderCompletion};

fn estimate_tokens(prompt: &str, response: &str) -> (u64, u64) {
    ((prompt.len() / 4).max(1) as u64, (response.len() / 4).max(1) as u64)
}

/// OpenAI chat-completion adapter, authenticated via `OPENAI_API_KEY`.
pub struct OpenAiProvider;

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn call(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ProviderCompletion> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;
        use rig::providers::openai;

        if std::env::var("MODEL_PROVIDER_API_KEY_OPENAI").is_err()
            && std::env::var("OPENAI_API_KEY").is_err()
        {
            return Err(Error::provider("OPENAI_API_KEY not set"));
        }

        let client = openai::Client::from_env();
        let agent = client
            .agent(model)
            .temperature(temperature as f64)
            .max_tokens(max_tokens as u64)
            .build();

        let text: String = agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::provider(format!("OpenAI error: {e}")))?;

        let (input_tokens, output_tokens) = estimate_tokens(prompt, &text);
        Ok(ProviderCompletion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

/// Anthropic message-style adapter, authenticated via `ANTHROPIC_API_KEY`.
pub struct AnthropicProvider;

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn call(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ProviderCompletion> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;
        use rig::providers::anthropic;

        if std::env::var("MODEL_PROVIDER_API_KEY_ANTHROPIC").is_err()
            && std::env::var("ANTHROPIC_API_KEY").is_err()
        {
            return Err(Error::provider("ANTHROPIC_API_KEY not set"));
        }

        let client = anthropic::Client::from_env();
        let agent = client
            .agent(model)
            .temperature(temperature as f64)
            .max_tokens(max_tokens as u64)
            .build();

        let text: String = agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::provider(format!("Anthropic error: {e}")))?;

        let (input_tokens, output_tokens) = estimate_tokens(prompt, &text);
        Ok(ProviderCompletion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}
