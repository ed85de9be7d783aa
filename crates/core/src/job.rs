//! Pipeline job model and state machine.
//!
//! A [`Job`] tracks one pipeline stage for one project. Jobs are created and
//! mutated exclusively through [`crate::ledger::JobLedger`]; the state machine
//! here defines which status transitions the ledger will accept.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, ProjectId, Timestamp};

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// The four canonical pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ParseDocument,
    GenerateScript,
    CreateVisuals,
    RenderVideo,
}

impl PipelineStage {
    /// All stages in canonical execution order.
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::ParseDocument,
        PipelineStage::GenerateScript,
        PipelineStage::CreateVisuals,
        PipelineStage::RenderVideo,
    ];

    /// Default queue priority for this stage. Higher dispatches sooner, so
    /// earlier stages carry higher priorities for a shared worker pool.
    pub fn default_priority(self) -> i32 {
        match self {
            PipelineStage::ParseDocument => 10,
            PipelineStage::GenerateScript => 8,
            PipelineStage::CreateVisuals => 6,
            PipelineStage::RenderVideo => 4,
        }
    }

    /// The stage that must reach a terminal state before this one may start.
    /// `None` for the first stage.
    pub fn predecessor(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::ParseDocument => None,
            PipelineStage::GenerateScript => Some(PipelineStage::ParseDocument),
            PipelineStage::CreateVisuals => Some(PipelineStage::GenerateScript),
            PipelineStage::RenderVideo => Some(PipelineStage::CreateVisuals),
        }
    }

    /// Stable wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::ParseDocument => "parse_document",
            PipelineStage::GenerateScript => "generate_script",
            PipelineStage::CreateVisuals => "create_visuals",
            PipelineStage::RenderVideo => "render_video",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle status of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// A job is active while it is queued or processing.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::JobStatus;
    use crate::error::CoreError;

    /// Returns the set of valid target statuses reachable from `from`.
    ///
    /// Terminal states return an empty slice because no further transitions
    /// are allowed. A queued job may fail directly (e.g. its stage is aborted
    /// before a worker ever picks it up).
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Queued => &[
                JobStatus::Processing,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ],
            JobStatus::Processing => &[
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ],
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning [`CoreError::InvalidTransition`]
    /// for illegal ones.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

// ---------------------------------------------------------------------------
// Job entity
// ---------------------------------------------------------------------------

/// One pipeline stage execution for one project.
///
/// Invariants (enforced by the ledger's transition methods):
/// - `progress == 100` iff `status == Completed`.
/// - `error_message` is set iff `status == Failed`.
/// - `started_at` is set once when the job leaves `Queued` and never reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub stage: PipelineStage,
    pub status: JobStatus,
    /// Higher priority is dispatched sooner.
    pub priority: i32,
    /// Progress percentage, 0..=100.
    pub progress: u8,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
