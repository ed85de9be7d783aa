//! Generation settings loaded from environment variables.

use std::path::PathBuf;

use crate::orchestrator::DEFAULT_MAX_CONCURRENT_GENERATIONS;

/// Provider credentials and generation limits.
///
/// Adapters for external services are registered only when their key is
/// configured; the template renderer needs none.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub runway_api_key: Option<String>,
    pub pika_api_key: Option<String>,
    pub luma_api_key: Option<String>,
    /// Directory where downloaded artifacts land.
    pub output_dir: PathBuf,
    /// Cap on concurrent in-flight generate calls.
    pub max_concurrent_generations: usize,
}

impl GeneratorSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                      | Default          |
    /// |------------------------------|------------------|
    /// | `RUNWAY_API_KEY`             | unset            |
    /// | `PIKA_API_KEY`               | unset            |
    /// | `LUMA_API_KEY`               | unset            |
    /// | `VIDEO_OUTPUT_DIR`           | `output/videos`  |
    /// | `MAX_CONCURRENT_GENERATIONS` | `3`              |
    pub fn from_env() -> Self {
        let max_concurrent_generations = std::env::var("MAX_CONCURRENT_GENERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_GENERATIONS);

        Self {
            runway_api_key: non_empty_env("RUNWAY_API_KEY"),
            pika_api_key: non_empty_env("PIKA_API_KEY"),
            luma_api_key: non_empty_env("LUMA_API_KEY"),
            output_dir: std::env::var("VIDEO_OUTPUT_DIR")
                .unwrap_or_else(|_| "output/videos".into())
                .into(),
            max_concurrent_generations,
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            runway_api_key: None,
            pika_api_key: None,
            luma_api_key: None,
            output_dir: PathBuf::from("output/videos"),
            max_concurrent_generations: DEFAULT_MAX_CONCURRENT_GENERATIONS,
        }
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
