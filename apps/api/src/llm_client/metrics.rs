//! In-memory model usage counters. Reset on process restart.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub average_duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStats {
    pub total_requests: u64,
    /// Successful calls that were served by a backend other than the first tried.
    pub successful_fallbacks: u64,
    /// Calls where every backend in the chain failed.
    pub complete_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub backends: BTreeMap<String, BackendStats>,
    pub fallbacks: FallbackStats,
}

#[derive(Debug, Default)]
pub struct ModelMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one backend attempt, successful or not.
    pub fn record_attempt(&self, backend: &str, success: bool, tokens: u32, elapsed: Duration) {
        let mut inner = self.inner.lock();
        let stats = inner.backends.entry(backend.to_string()).or_default();

        stats.total_requests += 1;
        if success {
            stats.successful_requests += 1;
            stats.total_tokens += u64::from(tokens);
        } else {
            stats.failed_requests += 1;
        }
        stats.total_duration_ms += elapsed.as_millis() as u64;
        stats.average_duration_ms = stats.total_duration_ms / stats.total_requests;
    }

    /// Records one routed call, however many backends it ends up touching.
    pub fn record_request(&self) {
        self.inner.lock().fallbacks.total_requests += 1;
    }

    pub fn record_fallback_success(&self) {
        self.inner.lock().fallbacks.successful_fallbacks += 1;
    }

    pub fn record_complete_failure(&self) {
        self.inner.lock().fallbacks.complete_failures += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}
