use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{non_empty, CompletionProvider, GenerationSettings};
use crate::error::TransportError;
use crate::http::{join_url, read_json};
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
    #[allow(dead_code)]
    #[serde(default)]
    done: bool,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    settings: GenerationSettings,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            settings: GenerationSettings::default(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, history: &[ChatMessage]) -> Result<String, TransportError> {
        let url = join_url(&self.base_url, "api/chat");

        let request = OllamaChatRequest {
            model: &self.model,
            messages: history,
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let ollama_response: OllamaChatResponse = read_json(response, "Ollama").await?;
        let text = ollama_response
            .message
            .map(|m| m.content)
            .unwrap_or_default();

        non_empty(text, "Ollama")
    }
}
