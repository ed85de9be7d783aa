//! Pipeline coordination: stage sequencing over the job ledger, render
//! delegation to the provider orchestrator.
//!
//! The coordinator owns the cross-stage sequencing decision but never
//! mutates jobs directly; every transition goes through the ledger. Stage
//! work itself (document parsing, script generation, visuals) is performed
//! by external collaborators that report back through the stage methods
//! here; only the render stage is driven end to end via the orchestrator.

use std::sync::Arc;

use reelsmith_core::error::CoreError;
use reelsmith_core::job::{Job, JobStatus, PipelineStage};
use reelsmith_core::ledger::JobLedger;
use reelsmith_core::script::{Script, VideoConfig};
use reelsmith_core::types::{JobId, ProjectId};
use reelsmith_providers::job::{GenerationStatus, ProviderKind};
use reelsmith_providers::orchestrator::{
    GeneratorError, ProviderOrchestrator, VideoHandle, VideoState,
};

use crate::status::PipelineStatus;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Sequences the four canonical stages for each project.
pub struct PipelineCoordinator {
    ledger: Arc<JobLedger>,
    generator: Arc<ProviderOrchestrator>,
}

impl PipelineCoordinator {
    pub fn new(ledger: Arc<JobLedger>, generator: Arc<ProviderOrchestrator>) -> Self {
        Self { ledger, generator }
    }

    /// The underlying job ledger, for direct job queries.
    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    /// The provider orchestrator, for provider-level queries.
    pub fn generator(&self) -> &Arc<ProviderOrchestrator> {
        &self.generator
    }

    // -- pipeline creation --------------------------------------------------

    /// Create the four canonical stage jobs for a project, in order.
    ///
    /// Priorities encode the intended execution order for a shared worker
    /// pool: parse 10, script 8, visuals 6, render 4.
    pub fn create_pipeline_jobs(&self, project_id: ProjectId) -> Vec<Job> {
        let jobs: Vec<Job> = PipelineStage::ALL
            .into_iter()
            .map(|stage| self.ledger.create(project_id, stage, stage.default_priority()))
            .collect();

        tracing::info!(
            project_id = %project_id,
            job_ids = ?jobs.iter().map(|j| j.id).collect::<Vec<_>>(),
            "Created pipeline jobs",
        );
        jobs
    }

    // -- stage lifecycle ----------------------------------------------------

    /// Start a stage, enforcing pipeline order: the predecessor stage's job
    /// must exist and be terminal before a later stage may begin.
    pub fn start_stage(
        &self,
        project_id: ProjectId,
        stage: PipelineStage,
    ) -> Result<Job, PipelineError> {
        let job = self.stage_job(project_id, stage)?;

        if let Some(predecessor) = stage.predecessor() {
            match self.ledger.stage_job(project_id, predecessor) {
                Some(pred) if pred.status.is_terminal() => {}
                Some(pred) => {
                    return Err(CoreError::StagePrecondition {
                        stage,
                        reason: format!("predecessor {} is {}", predecessor, pred.status),
                    }
                    .into())
                }
                None => {
                    return Err(CoreError::StagePrecondition {
                        stage,
                        reason: format!("predecessor {predecessor} has no job"),
                    }
                    .into())
                }
            }
        }

        Ok(self.ledger.start(job.id)?)
    }

    /// Report progress for a running stage.
    pub fn update_stage_progress(
        &self,
        project_id: ProjectId,
        stage: PipelineStage,
        progress: u8,
    ) -> Result<Job, PipelineError> {
        let job = self.stage_job(project_id, stage)?;
        Ok(self.ledger.update_progress(job.id, progress)?)
    }

    /// Mark a stage completed.
    pub fn complete_stage(
        &self,
        project_id: ProjectId,
        stage: PipelineStage,
    ) -> Result<Job, PipelineError> {
        let job = self.stage_job(project_id, stage)?;
        let completed = self.ledger.complete(job.id)?;
        tracing::info!(project_id = %project_id, stage = %stage, "Pipeline stage completed");
        Ok(completed)
    }

    /// Mark a stage failed and abort the rest of the run: still-queued
    /// downstream jobs are cancelled, while completed stages are retained
    /// for inspection and manual re-run.
    pub fn fail_stage(
        &self,
        project_id: ProjectId,
        stage: PipelineStage,
        message: impl Into<String>,
    ) -> Result<Job, PipelineError> {
        let job = self.stage_job(project_id, stage)?;
        let message = message.into();
        tracing::error!(
            project_id = %project_id,
            stage = %stage,
            error = %message,
            "Pipeline stage failed",
        );
        let failed = self.ledger.fail(job.id, message)?;

        for later in PipelineStage::ALL
            .into_iter()
            .skip_while(|s| *s != stage)
            .skip(1)
        {
            if let Some(downstream) = self.ledger.stage_job(project_id, later) {
                if downstream.status == JobStatus::Queued {
                    self.ledger.cancel(downstream.id)?;
                }
            }
        }

        Ok(failed)
    }

    /// Cancel a stage that is queued or processing.
    pub fn cancel_stage(
        &self,
        project_id: ProjectId,
        stage: PipelineStage,
    ) -> Result<Job, PipelineError> {
        let job = self.stage_job(project_id, stage)?;
        Ok(self.ledger.cancel(job.id)?)
    }

    // -- render stage -------------------------------------------------------

    /// Start the render stage and launch generation through the provider
    /// orchestrator. A generation failure marks the stage failed before the
    /// error is surfaced.
    pub async fn render_video(
        &self,
        project_id: ProjectId,
        script: &Script,
        config: &VideoConfig,
        preferred_provider: Option<ProviderKind>,
    ) -> Result<VideoHandle, PipelineError> {
        self.start_stage(project_id, PipelineStage::RenderVideo)?;

        match self
            .generator
            .generate(script, config, preferred_provider)
            .await
        {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.fail_stage(project_id, PipelineStage::RenderVideo, e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// Poll an in-flight render and mirror its state into the render job.
    ///
    /// Download failures leave the stage running — the handle stays
    /// completed-but-undownloaded and the next poll retries the download —
    /// while any other remote failure marks the stage failed.
    pub async fn poll_render(
        &self,
        project_id: ProjectId,
        handle: &VideoHandle,
    ) -> Result<VideoState, PipelineError> {
        let job = self.stage_job(project_id, PipelineStage::RenderVideo)?;

        match self.generator.poll(handle).await {
            Ok(state) => {
                match state.status {
                    GenerationStatus::Completed if job.status == JobStatus::Processing => {
                        self.ledger.complete(job.id)?;
                    }
                    GenerationStatus::Failed if job.status.is_active() => {
                        let message = state
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "Video generation failed".to_string());
                        self.ledger.fail(job.id, message)?;
                    }
                    GenerationStatus::Cancelled if job.status.is_active() => {
                        self.ledger.cancel(job.id)?;
                    }
                    GenerationStatus::Queued | GenerationStatus::Processing
                        if job.status == JobStatus::Processing =>
                    {
                        // 100 is reserved for completion.
                        let progress = (state.progress.round() as u8).min(99);
                        self.ledger.update_progress(job.id, progress)?;
                    }
                    _ => {}
                }
                Ok(state)
            }
            Err(e @ GeneratorError::ArtifactDownload { .. }) => Err(e.into()),
            Err(e) => {
                if job.status.is_active() {
                    self.ledger.fail(job.id, e.to_string())?;
                }
                Err(e.into())
            }
        }
    }

    /// Cancel an in-flight render: the remote generation and the stage job.
    pub async fn cancel_render(
        &self,
        project_id: ProjectId,
        handle: &VideoHandle,
    ) -> Result<bool, PipelineError> {
        let accepted = self.generator.cancel(handle).await?;
        if accepted {
            let job = self.stage_job(project_id, PipelineStage::RenderVideo)?;
            if job.status.is_active() {
                self.ledger.cancel(job.id)?;
            }
        }
        Ok(accepted)
    }

    // -- queries ------------------------------------------------------------

    /// Aggregated pipeline status for a project.
    pub fn status(&self, project_id: ProjectId) -> PipelineStatus {
        PipelineStatus::from_jobs(&self.ledger.jobs_for_project(project_id))
    }

    /// Start a job by id, without stage-order enforcement. Exposed for the
    /// job-queue surface; pipeline callers use [`Self::start_stage`].
    pub fn start_job(&self, job_id: JobId) -> Result<Job, PipelineError> {
        Ok(self.ledger.start(job_id)?)
    }

    /// Cancel a job by id.
    pub fn cancel_job(&self, job_id: JobId) -> Result<Job, PipelineError> {
        Ok(self.ledger.cancel(job_id)?)
    }

    /// The next queued job across all projects, by priority then age.
    pub fn next_queued_job(&self) -> Option<Job> {
        self.ledger.next_queued()
    }

    // -- private helpers ----------------------------------------------------

    /// The project's job for a stage, or a precondition error naming the
    /// missing stage.
    fn stage_job(&self, project_id: ProjectId, stage: PipelineStage) -> Result<Job, PipelineError> {
        self.ledger
            .stage_job(project_id, stage)
            .ok_or_else(|| {
                CoreError::StagePrecondition {
                    stage,
                    reason: "stage has no job; create the pipeline first".to_string(),
                }
                .into()
            })
    }
}
