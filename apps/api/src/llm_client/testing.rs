//! Scripted `ModelClient` for unit tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatTurn, LlmError, ModelClient, ModelReply};

#[derive(Debug, Clone)]
pub enum Outcome {
    Reply(String),
    /// 503, retried on the same backend.
    Transient,
    /// 400, moves straight to the next backend.
    Fatal,
    /// Never resolves; only the per-attempt timeout ends it.
    Hang,
}

/// Per-backend outcomes take precedence over the shared queue. An empty queue
/// answers with a transient error.
#[derive(Default)]
pub struct ScriptedClient {
    per_backend: Mutex<HashMap<String, Outcome>>,
    queue: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub backend: String,
    pub prompt: String,
    pub history: Vec<ChatTurn>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(self, backend: &str, outcome: Outcome) -> Self {
        self.per_backend.lock().insert(backend.to_string(), outcome);
        self
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.queue.lock().push_back(Outcome::Reply(text.into()));
    }

    pub fn push(&self, outcome: Outcome) {
        self.queue.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, backend: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.backend == backend).count()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn send(
        &self,
        backend: &str,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<ModelReply, LlmError> {
        self.calls.lock().push(Call {
            backend: backend.to_string(),
            prompt: prompt.to_string(),
            history: history.to_vec(),
        });

        let scripted = self.per_backend.lock().get(backend).cloned();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => self.queue.lock().pop_front().unwrap_or(Outcome::Transient),
        };

        match outcome {
            Outcome::Reply(text) => Ok(ModelReply {
                tokens_used: super::estimate_tokens(&text),
                text,
                finish_reason: "STOP".to_string(),
            }),
            Outcome::Transient => Err(LlmError::Api {
                status: 503,
                message: "The model is overloaded".to_string(),
            }),
            Outcome::Fatal => Err(LlmError::Api {
                status: 400,
                message: "API key not valid".to_string(),
            }),
            Outcome::Hang => std::future::pending().await,
        }
    }
}
