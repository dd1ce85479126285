use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{non_empty, CompletionProvider, GenerationSettings};
use crate::error::TransportError;
use crate::http::read_json;
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    settings: GenerationSettings,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            settings: GenerationSettings::default(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, history: &[ChatMessage]) -> Result<String, TransportError> {
        let request = OpenAIRequest {
            model: &self.model,
            messages: history
                .iter()
                .map(|msg| OpenAIMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_output_tokens,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let openai_response: OpenAIResponse = read_json(response, "OpenAI API").await?;
        let text = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        non_empty(text, "OpenAI API")
    }
}
