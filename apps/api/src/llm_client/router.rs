//! Priority-ordered fallback across the configured backends.
//!
//! Each backend gets its own retry budget and a hard per-attempt timeout. A
//! backend that is exhausted (or fails fatally) is skipped for the rest of the
//! call; the next one in the chain takes over.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use super::backends::BackendConfig;
use super::metrics::ModelMetrics;
use super::retry::{execute_with_retry, RetryConfig, RetryError, Retried};
use super::{ChatTurn, LlmError, ModelClient, ModelReply};

#[derive(Debug, Clone, PartialEq)]
pub struct RouterResponse {
    pub text: String,
    pub backend_used: String,
    pub tokens_used: u32,
    pub finish_reason: String,
    /// Attempts across every backend touched, including failed ones.
    pub attempts_made: u32,
    /// Number of backends skipped before one succeeded.
    pub fallbacks_used: u32,
    pub total_duration: Duration,
}

pub struct BackendRouter {
    client: Arc<dyn ModelClient>,
    backends: Vec<BackendConfig>,
    retry: RetryConfig,
    fallback_enabled: bool,
    metrics: Arc<ModelMetrics>,
}

impl BackendRouter {
    pub fn new(
        client: Arc<dyn ModelClient>,
        mut backends: Vec<BackendConfig>,
        metrics: Arc<ModelMetrics>,
    ) -> Self {
        backends.sort_by_key(|b| b.priority);
        Self {
            client,
            backends,
            retry: RetryConfig::default(),
            fallback_enabled: true,
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// With fallback disabled only the top-priority backend is ever tried.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    fn chain(&self, preferred: Option<&str>) -> Vec<&BackendConfig> {
        if let Some(name) = preferred {
            if let Some(backend) = self.backends.iter().find(|b| b.name == name) {
                return vec![backend];
            }
            warn!("Preferred model {name} is not configured, using the full chain");
        }
        if !self.fallback_enabled {
            return self.backends.iter().take(1).collect();
        }
        self.backends.iter().collect()
    }

    pub async fn invoke(
        &self,
        prompt: &str,
        history: &[ChatTurn],
        preferred: Option<&str>,
    ) -> Result<RouterResponse, LlmError> {
        let started = Instant::now();
        let chain = self.chain(preferred);
        let chain_names: Vec<String> = chain.iter().map(|b| b.name.clone()).collect();
        self.metrics.record_request();

        let mut attempts_made = 0;
        let mut last_error = None;

        for (index, backend) in chain.iter().enumerate() {
            info!(
                "Trying model {} (priority {}, {}/{})",
                backend.name,
                backend.priority,
                index + 1,
                chain.len()
            );

            let retry = self.retry.with_max_retries(backend.max_retries);
            let context = format!("Model {}", backend.name);
            let outcome = execute_with_retry(
                |attempt| self.attempt(backend, prompt, history, attempt),
                &retry,
                &context,
            )
            .await;

            match outcome {
                Ok(Retried {
                    value: reply,
                    attempts,
                }) => {
                    attempts_made += attempts;
                    if index > 0 {
                        self.metrics.record_fallback_success();
                        info!(
                            "Fallback succeeded on {} after {index} failed model(s)",
                            backend.name
                        );
                    }
                    return Ok(RouterResponse {
                        text: reply.text,
                        backend_used: backend.name.clone(),
                        tokens_used: reply.tokens_used,
                        finish_reason: reply.finish_reason,
                        attempts_made,
                        fallbacks_used: index as u32,
                        total_duration: started.elapsed(),
                    });
                }
                Err(err) => {
                    attempts_made += err.attempts();
                    let err = match err {
                        RetryError::Exhausted { attempts, last } => LlmError::RetryExhausted {
                            backend: backend.name.clone(),
                            attempts,
                            last: Box::new(last),
                        },
                        RetryError::Fatal { error, .. } => error,
                    };
                    match chain.get(index + 1) {
                        Some(next) => warn!(
                            "Model {} failed: {err}. Falling back to {}",
                            backend.name, next.name
                        ),
                        None => warn!("Model {} failed: {err}", backend.name),
                    }
                    last_error = Some(err);
                }
            }
        }

        self.metrics.record_complete_failure();
        error!(
            "All {} model(s) failed after {attempts_made} attempts in {}ms",
            chain.len(),
            started.elapsed().as_millis()
        );
        Err(LlmError::AllBackendsExhausted {
            chain: chain_names,
            last: Box::new(
                last_error
                    .unwrap_or_else(|| LlmError::InvalidResponse("No models configured".into())),
            ),
        })
    }

    async fn attempt(
        &self,
        backend: &BackendConfig,
        prompt: &str,
        history: &[ChatTurn],
        attempt: u32,
    ) -> Result<ModelReply, LlmError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            backend.timeout,
            self.client.send(&backend.name, prompt, history),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                backend: backend.name.clone(),
                timeout_ms: backend.timeout.as_millis() as u64,
            }),
        };
        let elapsed = started.elapsed();

        match &result {
            Ok(reply) => {
                self.metrics
                    .record_attempt(&backend.name, true, reply.tokens_used, elapsed);
                info!(
                    "Model {} attempt {attempt} succeeded in {}ms ({} tokens)",
                    backend.name,
                    elapsed.as_millis(),
                    reply.tokens_used
                );
            }
            Err(err) => {
                self.metrics.record_attempt(&backend.name, false, 0, elapsed);
                warn!(
                    "Model {} attempt {attempt} failed in {}ms: {err}",
                    backend.name,
                    elapsed.as_millis()
                );
            }
        }
        result
    }
}
