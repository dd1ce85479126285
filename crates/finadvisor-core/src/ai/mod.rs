pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod transport;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::state::ChatMessage;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use transport::{ChatTransport, RetryPolicy};

/// Sampling settings sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }
}

/// A hosted model that turns a full conversation into one reply.
///
/// Implementations are stateless: the whole history goes over the wire on
/// every call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, history: &[ChatMessage]) -> Result<String, TransportError>;
}

/// Reject blank completions so they go through the retry path.
pub(crate) fn non_empty(text: String, endpoint: &str) -> Result<String, TransportError> {
    if text.trim().is_empty() {
        Err(TransportError::EmptyResponse(endpoint.to_string()))
    } else {
        Ok(text)
    }
}
