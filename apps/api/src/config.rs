use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::interview::job::DEFAULT_JOB_ID;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means interviews live in process memory only.
    pub database_url: Option<String>,
    pub gemini_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// `false` limits every request to the top-priority model.
    pub enable_fallback: bool,
    pub prompts_dir: PathBuf,
    pub default_job_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            enable_fallback: std::env::var("GEMINI_ENABLE_FALLBACK")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            prompts_dir: std::env::var("PROMPTS_DIR")
                .unwrap_or_else(|_| "prompts".to_string())
                .into(),
            default_job_id: std::env::var("DEFAULT_JOB_ID")
                .unwrap_or_else(|_| DEFAULT_JOB_ID.to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Anything but an explicit off value keeps the flag on.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_flag_defaults_on() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(""));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" 0 "));
        assert!(!parse_flag("off"));
    }
}
