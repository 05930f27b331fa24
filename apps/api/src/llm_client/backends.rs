//! Backend chain: the process-wide, read-only list of upstream model configurations.
//!
//! Order of attempts is ascending `priority` (1 = first tried).

use std::time::Duration;

use serde::Serialize;

/// One configured upstream model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub name: String,
    pub priority: u8,
    /// Hard per-attempt timeout.
    pub timeout: Duration,
    /// Retries on this backend after the first attempt.
    pub max_retries: u32,
}

impl BackendConfig {
    pub fn new(name: &str, priority: u8, timeout: Duration, max_retries: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            timeout,
            max_retries,
        }
    }
}

/// Fallback chain: 3 Pro -> 2.5 Flash -> 2.0 Flash.
pub fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new("gemini-3-pro-preview", 1, Duration::from_secs(60), 2),
        BackendConfig::new("gemini-2.5-flash", 2, Duration::from_secs(30), 2),
        BackendConfig::new("gemini-2.0-flash", 3, Duration::from_secs(20), 3),
    ]
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 4096,
        }
    }
}

pub const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_priorities_are_unique_and_ascending() {
        let chain = default_backends();
        let priorities: Vec<u8> = chain.iter().map(|b| b.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn test_generation_config_serializes_camel_case() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["topK"], 40);
        assert_eq!(json["maxOutputTokens"], 4096);
    }
}
