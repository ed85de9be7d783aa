use crate::job::{JobStatus, PipelineStage};
use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Stage precondition failed: {stage}: {reason}")]
    StagePrecondition {
        stage: PipelineStage,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),
}
