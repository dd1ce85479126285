//! Chat transport with bounded linear retry
//!
//! Wraps any [`CompletionProvider`] and resends the full history on every
//! attempt. After the last retry the caller gets one [`ChatError`] instead of
//! the individual transport failures, which are only logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use super::CompletionProvider;
use crate::error::ChatError;
use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based): base, 2x base, 3x base...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

#[derive(Clone)]
pub struct ChatTransport {
    provider: Arc<dyn CompletionProvider>,
    policy: RetryPolicy,
}

impl ChatTransport {
    pub fn new(provider: Arc<dyn CompletionProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn send_message(&self, history: &[ChatMessage]) -> Result<String, ChatError> {
        let mut retry = 0;
        loop {
            match self.provider.complete(history).await {
                Ok(text) => return Ok(text),
                Err(e) if retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        "{} attempt {} failed, retrying in {:?}: {}",
                        self.provider_name(),
                        retry,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("Error sending message to {}: {}", self.provider_name(), e);
                    return Err(ChatError::Unavailable { attempts: retry + 1 });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted outcomes and records when and with what it was called
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: Mutex<Vec<(Instant, usize)>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Instant, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(&self, history: &[ChatMessage]) -> Result<String, TransportError> {
            self.calls.lock().unwrap().push((Instant::now(), history.len()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::EmptyResponse("scripted".into())))
        }
    }

    fn failure() -> Result<String, TransportError> {
        Err(TransportError::EmptyResponse("scripted".into()))
    }

    #[test]
    fn test_delays_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_needs_no_retry() {
        let provider = ScriptedProvider::new(vec![Ok("Diversify.".into())]);
        let transport = ChatTransport::new(provider.clone(), RetryPolicy::default());

        let reply = transport
            .send_message(&[ChatMessage::user("Advice?")])
            .await
            .unwrap();

        assert_eq!(reply, "Diversify.");
        assert_eq!(provider.calls().len(), 1);
        assert_eq!(transport.provider_name(), "scripted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let provider = ScriptedProvider::new(vec![failure(), failure(), Ok("Index funds.".into())]);
        let transport = ChatTransport::new(provider.clone(), RetryPolicy::default());
        let history = vec![ChatMessage::assistant("Hello!"), ChatMessage::user("Advice?")];

        let reply = transport.send_message(&history).await.unwrap();

        assert_eq!(reply, "Index funds.");
        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        // full history resent on every attempt
        assert!(calls.iter().all(|(_, len)| *len == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_single_consolidated_error() {
        let provider = ScriptedProvider::new(vec![failure(), failure(), failure(), failure()]);
        let transport = ChatTransport::new(provider.clone(), RetryPolicy::default());

        let err = transport
            .send_message(&[ChatMessage::user("Advice?")])
            .await
            .unwrap_err();

        assert_eq!(err, ChatError::Unavailable { attempts: 4 });
        assert!(!err.to_string().contains("Empty response"));

        let calls = provider.calls();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].0 - w[0].0).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_fails_immediately() {
        let provider = ScriptedProvider::new(vec![failure(), Ok("never".into())]);
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        };
        let transport = ChatTransport::new(provider.clone(), policy);

        let err = transport.send_message(&[]).await.unwrap_err();

        assert_eq!(err, ChatError::Unavailable { attempts: 1 });
        assert_eq!(provider.calls().len(), 1);
    }
}
