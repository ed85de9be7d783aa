//! Remote generation job model.
//!
//! [`ProviderJob`] mirrors the state of a job running on an external
//! generation back-end. It is refreshed only by explicit status checks (pull,
//! not push) and owned exclusively by the orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use reelsmith_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Provider identifiers
// ---------------------------------------------------------------------------

/// Registered generation back-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local template composition; always available, no credentials.
    Template,
    Runway,
    Pika,
    Luma,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Template => "template",
            ProviderKind::Runway => "runway",
            ProviderKind::Pika => "pika",
            ProviderKind::Luma => "luma",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(ProviderKind::Template),
            "runway" => Ok(ProviderKind::Runway),
            "pika" => Ok(ProviderKind::Pika),
            "luma" => Ok(ProviderKind::Luma),
            other => Err(format!("unknown provider: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation status
// ---------------------------------------------------------------------------

/// Lifecycle of a remote generation job, as reported by the provider.
///
/// Distinct from the ledger's job status: this mirrors an external system and
/// carries no local invariants beyond terminality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationStatus::Completed | GenerationStatus::Failed | GenerationStatus::Cancelled
        )
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GenerationStatus::Queued => "queued",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
            GenerationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Provider job
// ---------------------------------------------------------------------------

/// Snapshot of one external generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderJob {
    /// Opaque identifier assigned by the provider.
    pub job_id: String,
    pub provider: ProviderKind,
    pub status: GenerationStatus,
    /// Percentage 0.0–100.0 as reported (or approximated) by the adapter.
    pub progress: f64,
    pub estimated_completion: Option<Timestamp>,
    pub error_message: Option<String>,
    /// Download URL, present once the provider reports completion.
    pub result_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Video artifact
// ---------------------------------------------------------------------------

/// Metadata for a downloaded video file. Written once, on the first
/// successful download; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub duration_secs: Option<f64>,
    /// e.g. `"1920x1080"`.
    pub resolution: Option<String>,
    /// e.g. `"mp4"`.
    pub format: String,
    pub generation_time_secs: Option<f64>,
    /// Actual cost in USD, when the provider reports one.
    pub cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_through_str() {
        for kind in [
            ProviderKind::Template,
            ProviderKind::Runway,
            ProviderKind::Pika,
            ProviderKind::Luma,
        ] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_provider_kind_rejected() {
        assert!("sora".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
        assert!(GenerationStatus::Cancelled.is_terminal());
        assert!(!GenerationStatus::Queued.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
    }
}
