//! Aggregated pipeline status for one project.

use std::collections::BTreeMap;

use serde::Serialize;

use reelsmith_core::job::{Job, JobStatus, PipelineStage};

/// Snapshot of a project's pipeline, aggregated from its jobs.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub total_jobs: usize,
    pub status_counts: BTreeMap<JobStatus, usize>,
    /// Queued or processing jobs.
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Mean progress across all jobs; 0 when the project has none.
    pub average_progress: f64,
    /// Highest progress reached per stage; stages without a job report 0.
    pub pipeline_progress: BTreeMap<PipelineStage, u8>,
    /// First stage, in canonical order, whose job is not completed. `None`
    /// once the whole pipeline is done.
    pub next_step: Option<PipelineStage>,
}

impl PipelineStatus {
    /// Aggregate a project's jobs into a status snapshot.
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut status_counts: BTreeMap<JobStatus, usize> = BTreeMap::new();
        for job in jobs {
            *status_counts.entry(job.status).or_insert(0) += 1;
        }

        let mut pipeline_progress: BTreeMap<PipelineStage, u8> = BTreeMap::new();
        for stage in PipelineStage::ALL {
            let max_progress = jobs
                .iter()
                .filter(|j| j.stage == stage)
                .map(|j| j.progress)
                .max()
                .unwrap_or(0);
            pipeline_progress.insert(stage, max_progress);
        }

        let next_step = PipelineStage::ALL.into_iter().find(|stage| {
            !jobs
                .iter()
                .any(|j| j.stage == *stage && j.status == JobStatus::Completed)
        });

        let average_progress = if jobs.is_empty() {
            0.0
        } else {
            jobs.iter().map(|j| j.progress as f64).sum::<f64>() / jobs.len() as f64
        };

        Self {
            total_jobs: jobs.len(),
            active_jobs: jobs.iter().filter(|j| j.status.is_active()).count(),
            completed_jobs: status_counts.get(&JobStatus::Completed).copied().unwrap_or(0),
            failed_jobs: status_counts.get(&JobStatus::Failed).copied().unwrap_or(0),
            status_counts,
            average_progress,
            pipeline_progress,
            next_step,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(stage: PipelineStage, status: JobStatus, progress: u8) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            project_id: uuid::Uuid::new_v4(),
            stage,
            status,
            priority: stage.default_priority(),
            progress,
            error_message: (status == JobStatus::Failed).then(|| "boom".to_string()),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_project_reports_zeroes_and_first_stage() {
        let status = PipelineStatus::from_jobs(&[]);
        assert_eq!(status.total_jobs, 0);
        assert_eq!(status.average_progress, 0.0);
        assert_eq!(status.next_step, Some(PipelineStage::ParseDocument));
    }

    #[test]
    fn counts_and_average() {
        let jobs = vec![
            job(PipelineStage::ParseDocument, JobStatus::Completed, 100),
            job(PipelineStage::GenerateScript, JobStatus::Processing, 50),
            job(PipelineStage::CreateVisuals, JobStatus::Queued, 0),
            job(PipelineStage::RenderVideo, JobStatus::Queued, 0),
        ];
        let status = PipelineStatus::from_jobs(&jobs);

        assert_eq!(status.total_jobs, 4);
        assert_eq!(status.active_jobs, 3);
        assert_eq!(status.completed_jobs, 1);
        assert_eq!(status.failed_jobs, 0);
        assert!((status.average_progress - 37.5).abs() < f64::EPSILON);
        assert_eq!(status.next_step, Some(PipelineStage::GenerateScript));
    }

    #[test]
    fn next_step_none_when_all_stages_completed() {
        let jobs: Vec<Job> = PipelineStage::ALL
            .into_iter()
            .map(|stage| job(stage, JobStatus::Completed, 100))
            .collect();
        let status = PipelineStatus::from_jobs(&jobs);
        assert_eq!(status.next_step, None);
    }

    #[test]
    fn failed_stage_still_blocks_next_step() {
        let jobs = vec![
            job(PipelineStage::ParseDocument, JobStatus::Completed, 100),
            job(PipelineStage::GenerateScript, JobStatus::Failed, 30),
        ];
        let status = PipelineStatus::from_jobs(&jobs);
        // A failed stage is not completed; it remains the next step until
        // re-run.
        assert_eq!(status.next_step, Some(PipelineStage::GenerateScript));
        assert_eq!(status.failed_jobs, 1);
    }

    #[test]
    fn stage_progress_takes_the_maximum_across_runs() {
        let jobs = vec![
            job(PipelineStage::ParseDocument, JobStatus::Failed, 40),
            job(PipelineStage::ParseDocument, JobStatus::Processing, 20),
        ];
        let status = PipelineStatus::from_jobs(&jobs);
        assert_eq!(status.pipeline_progress[&PipelineStage::ParseDocument], 40);
        assert_eq!(status.pipeline_progress[&PipelineStage::RenderVideo], 0);
    }

    #[test]
    fn status_counts_serialize_with_string_keys() {
        let jobs = vec![job(PipelineStage::ParseDocument, JobStatus::Queued, 0)];
        let value = serde_json::to_value(PipelineStatus::from_jobs(&jobs)).unwrap();
        assert_eq!(value["status_counts"]["queued"], 1);
        assert_eq!(value["pipeline_progress"]["parse_document"], 0);
        assert_eq!(value["next_step"], "parse_document");
    }
}
