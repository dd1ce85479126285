pub mod ai;
pub mod config;
pub mod error;
pub mod format;
mod http;
pub mod jobs;
pub mod profile;
pub mod provider;
pub mod state;
pub mod summary;

// Re-export main types for convenience
pub use ai::{ChatTransport, CompletionProvider, GeminiClient, OllamaClient, OpenAIClient, RetryPolicy};
pub use config::Config;
pub use error::{ChatError, SubmitError, TransportError, ValidationError};
pub use format::{final_output, format_agent_message};
pub use jobs::{AdvisorSession, AgentMessage, HttpJobBackend, JobBackend, JobPhase, PollSnapshot, Transition};
pub use profile::{FinancialProfile, ProfileSync, RiskTolerance};
pub use provider::Provider;
pub use state::{ChatMessage, ChatRole};
pub use summary::{ScratchStorage, SummaryStore};
