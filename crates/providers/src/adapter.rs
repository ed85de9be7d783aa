//! Provider adapter contract.
//!
//! Every generation back-end is wrapped in one [`VideoProvider`]
//! implementation. The orchestrator only ever talks to this trait, so adding
//! a back-end means adding one adapter and registering it.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use reelsmith_core::script::{Script, VideoConfig};
use reelsmith_core::types::Timestamp;

use crate::job::{GenerationStatus, ProviderJob, ProviderKind, VideoArtifact};

// ---------------------------------------------------------------------------
// Capability & health types
// ---------------------------------------------------------------------------

/// Static capabilities of a provider: what it can render and how long.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub formats: Vec<&'static str>,
    pub resolutions: Vec<&'static str>,
    pub aspect_ratios: Vec<&'static str>,
    /// Longest video this provider will produce, in seconds.
    pub max_duration_secs: f64,
    /// Shortest clip the provider accepts, when it has a floor.
    pub min_duration_secs: Option<f64>,
}

impl Capabilities {
    /// Whether any supported resolution satisfies the requested quality.
    pub fn supports_quality(&self, quality: &str) -> bool {
        match quality {
            "4k" => self.resolutions.iter().any(|r| {
                r.split('x')
                    .next()
                    .and_then(|w| w.parse::<u32>().ok())
                    .is_some_and(|w| w >= 3840)
            }),
            "1080p" => self
                .resolutions
                .iter()
                .any(|r| r.contains("1080") || r.contains("1920")),
            _ => true,
        }
    }
}

/// Provider cost estimate for one script.
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub estimated_cost: f64,
    pub currency: &'static str,
    pub note: Option<String>,
}

impl CostEstimate {
    pub fn usd(estimated_cost: f64) -> Self {
        Self {
            estimated_cost,
            currency: "USD",
            note: None,
        }
    }
}

/// Outcome of a provider health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Health probe result with a human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub provider: ProviderKind,
    pub status: HealthStatus,
    pub message: String,
    pub last_checked: Option<Timestamp>,
}

impl HealthReport {
    pub fn healthy(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            status: HealthStatus::Healthy,
            message: message.into(),
            last_checked: Some(chrono::Utc::now()),
        }
    }

    pub fn unhealthy(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            status: HealthStatus::Unhealthy,
            message: message.into(),
            last_checked: Some(chrono::Utc::now()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Script compatibility check against one provider's constraints.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptValidation {
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl ScriptValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from a single provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The provider's response did not have the expected shape.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider does not know the given job id.
    #[error("Provider job not found: {0}")]
    JobNotFound(String),

    /// Download requested before the job completed.
    #[error("Job {job_id} is not completed (status: {status})")]
    NotCompleted {
        job_id: String,
        status: GenerationStatus,
    },

    /// The provider reported completion without a result URL.
    #[error("No result URL available for job {0}")]
    MissingResultUrl(String),

    /// Local filesystem failure while writing the artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else the adapter needs to surface.
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// One generation back-end.
///
/// `generate`, `check_status`, `download`, and `cancel` may block on I/O.
/// `health_check` and `estimate_cost` are read-only and must never mutate
/// adapter state. `supported_formats` is static data.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Start video generation for a script. Returns the provider's job
    /// handle; the work continues remotely.
    async fn generate(
        &self,
        script: &Script,
        config: &VideoConfig,
    ) -> Result<ProviderJob, ProviderError>;

    /// Fetch the current state of a generation job.
    async fn check_status(&self, job_id: &str) -> Result<ProviderJob, ProviderError>;

    /// Download a completed video to `output_path` and report its metadata.
    async fn download(
        &self,
        job_id: &str,
        output_path: &Path,
    ) -> Result<VideoArtifact, ProviderError>;

    /// Cancel a generation job. Returns `true` when the provider accepted
    /// the cancellation; a job the provider no longer knows counts as
    /// accepted (the cancel is idempotent).
    async fn cancel(&self, job_id: &str) -> Result<bool, ProviderError>;

    /// Probe provider availability. Errors are treated as unhealthy by the
    /// orchestrator, never propagated to callers.
    async fn health_check(&self) -> Result<HealthReport, ProviderError>;

    /// Static formats, resolutions, and duration bounds.
    fn supported_formats(&self) -> Capabilities;

    /// Estimate the cost of rendering one script under this provider.
    async fn estimate_cost(
        &self,
        script: &Script,
        config: &VideoConfig,
    ) -> Result<CostEstimate, ProviderError>;

    /// Check a script against this provider's constraints.
    ///
    /// Default rules: empty content and an estimated duration beyond the
    /// provider's maximum are hard issues; a missing duration estimate is a
    /// warning only.
    fn validate_script(&self, script: &Script) -> ScriptValidation {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if script.content.trim().is_empty() {
            issues.push("Script has no content".to_string());
        }

        let caps = self.supported_formats();
        match script.estimated_duration_secs {
            Some(duration) if duration > caps.max_duration_secs => {
                issues.push(format!(
                    "Script duration {duration}s exceeds provider maximum {}s",
                    caps.max_duration_secs
                ));
            }
            Some(_) => {}
            None => warnings.push("Script has no duration estimate".to_string()),
        }

        ScriptValidation { issues, warnings }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_support_checks_resolutions() {
        let caps = Capabilities {
            formats: vec!["mp4"],
            resolutions: vec!["1920x1080", "1280x720"],
            aspect_ratios: vec!["16:9"],
            max_duration_secs: 600.0,
            min_duration_secs: None,
        };
        assert!(caps.supports_quality("1080p"));
        assert!(!caps.supports_quality("4k"));
        // Unknown qualities are not rejected on capability grounds.
        assert!(caps.supports_quality("720p"));
    }

    #[test]
    fn four_k_detected_by_width() {
        let caps = Capabilities {
            formats: vec!["mp4"],
            resolutions: vec!["3840x2160"],
            aspect_ratios: vec!["16:9"],
            max_duration_secs: 60.0,
            min_duration_secs: None,
        };
        assert!(caps.supports_quality("4k"));
    }
}
