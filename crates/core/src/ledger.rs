//! In-memory job ledger: the single owner of [`Job`] mutation.
//!
//! The ledger guards its job table with a mutex so transition invariants are
//! enforced in one place rather than scattered across callers. All operations
//! are pure in-memory and never suspend; remote work happens elsewhere.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::CoreError;
use crate::job::{state_machine, Job, JobStatus, PipelineStage};
use crate::types::{JobId, ProjectId};

/// Owns all pipeline jobs and their lifecycle transitions.
///
/// Jobs are never deleted: terminal jobs are retained for audit and status
/// aggregation.
#[derive(Default)]
pub struct JobLedger {
    inner: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    jobs: HashMap<JobId, Job>,
    /// Insertion ordinal per job, the final FIFO tie-breaker for dispatch.
    ordinals: HashMap<JobId, u64>,
    next_ordinal: u64,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new queued job for a project stage.
    pub fn create(&self, project_id: ProjectId, stage: PipelineStage, priority: i32) -> Job {
        let job = Job {
            id: uuid::Uuid::new_v4(),
            project_id,
            stage,
            status: JobStatus::Queued,
            priority,
            progress: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };

        let mut state = self.inner.lock().expect("ledger mutex poisoned");
        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        state.ordinals.insert(job.id, ordinal);
        state.jobs.insert(job.id, job.clone());
        job
    }

    /// Look up a job by id.
    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.inner
            .lock()
            .expect("ledger mutex poisoned")
            .jobs
            .get(&job_id)
            .cloned()
    }

    /// Transition a job from `Queued` to `Processing`, setting `started_at`.
    pub fn start(&self, job_id: JobId) -> Result<Job, CoreError> {
        self.transition(job_id, JobStatus::Processing, |job| {
            // started_at is set once and never reset.
            if job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        })
    }

    /// Update a job's progress percentage.
    ///
    /// Accepts 0..=99; the value 100 is reserved for [`Self::complete`],
    /// which forces it. Rejected on terminal jobs.
    pub fn update_progress(&self, job_id: JobId, progress: u8) -> Result<Job, CoreError> {
        if progress >= 100 {
            return Err(CoreError::Validation(format!(
                "progress must be below 100 (completion forces 100), got {progress}"
            )));
        }

        let mut state = self.inner.lock().expect("ledger mutex poisoned");
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or(CoreError::JobNotFound(job_id))?;
        if job.status.is_terminal() {
            return Err(CoreError::Validation(format!(
                "cannot update progress of a {} job",
                job.status
            )));
        }
        job.progress = progress;
        Ok(job.clone())
    }

    /// Mark a job completed. Progress is forced to 100 and `completed_at` set.
    pub fn complete(&self, job_id: JobId) -> Result<Job, CoreError> {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.progress = 100;
            job.completed_at = Some(Utc::now());
        })
    }

    /// Mark a job failed with an error message.
    ///
    /// Allowed from `Queued` (a stage aborted before dispatch) or
    /// `Processing`.
    pub fn fail(&self, job_id: JobId, message: impl Into<String>) -> Result<Job, CoreError> {
        let message = message.into();
        self.transition(job_id, JobStatus::Failed, move |job| {
            job.error_message = Some(message);
            job.completed_at = Some(Utc::now());
        })
    }

    /// Cancel a job. Allowed from `Queued` or `Processing`.
    pub fn cancel(&self, job_id: JobId) -> Result<Job, CoreError> {
        self.transition(job_id, JobStatus::Cancelled, |job| {
            job.completed_at = Some(Utc::now());
        })
    }

    /// The next job to dispatch: highest priority among queued jobs, ties
    /// broken by earliest `created_at`, then insertion order.
    pub fn next_queued(&self) -> Option<Job> {
        let state = self.inner.lock().expect("ledger mutex poisoned");
        state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| {
                (
                    std::cmp::Reverse(j.priority),
                    j.created_at,
                    state.ordinals.get(&j.id).copied().unwrap_or(u64::MAX),
                )
            })
            .cloned()
    }

    /// All jobs for a project, oldest first.
    pub fn jobs_for_project(&self, project_id: ProjectId) -> Vec<Job> {
        let state = self.inner.lock().expect("ledger mutex poisoned");
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.project_id == project_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| {
            (
                j.created_at,
                state.ordinals.get(&j.id).copied().unwrap_or(u64::MAX),
            )
        });
        jobs
    }

    /// Queued or processing jobs for a project.
    pub fn active_jobs_for_project(&self, project_id: ProjectId) -> Vec<Job> {
        self.jobs_for_project(project_id)
            .into_iter()
            .filter(|j| j.status.is_active())
            .collect()
    }

    /// The project's job for a specific stage, if one has been created.
    ///
    /// When a stage has been run more than once the most recent job wins.
    pub fn stage_job(&self, project_id: ProjectId, stage: PipelineStage) -> Option<Job> {
        self.jobs_for_project(project_id)
            .into_iter()
            .filter(|j| j.stage == stage)
            .next_back()
    }

    // ---- private helpers ----

    /// Apply a validated status transition plus an extra mutation.
    fn transition(
        &self,
        job_id: JobId,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, CoreError> {
        let mut state = self.inner.lock().expect("ledger mutex poisoned");
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or(CoreError::JobNotFound(job_id))?;

        state_machine::validate_transition(job.status, to)?;
        job.status = to;
        apply(job);
        Ok(job.clone())
    }

    /// Insert a pre-built job, used by tests that need to control
    /// `created_at`.
    #[cfg(test)]
    fn insert_raw(&self, job: Job) {
        let mut state = self.inner.lock().expect("ledger mutex poisoned");
        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        state.ordinals.insert(job.id, ordinal);
        state.jobs.insert(job.id, job);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn project() -> ProjectId {
        uuid::Uuid::new_v4()
    }

    fn queued_job(priority: i32, created_secs: i64) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            project_id: project(),
            stage: PipelineStage::ParseDocument,
            status: JobStatus::Queued,
            priority,
            progress: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    // -- Creation -------------------------------------------------------------

    #[test]
    fn create_yields_queued_job_with_zero_progress() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.error_message.is_none());
    }

    // -- start ----------------------------------------------------------------

    #[test]
    fn start_sets_processing_and_started_at() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);

        let started = ledger.start(job.id).unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert!(started.started_at.is_some());
    }

    #[test]
    fn start_rejected_from_every_non_queued_status() {
        let ledger = JobLedger::new();

        // Processing
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.start(job.id).unwrap();
        assert!(matches!(
            ledger.start(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));

        // Completed
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.start(job.id).unwrap();
        ledger.complete(job.id).unwrap();
        assert!(matches!(
            ledger.start(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));

        // Failed
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.fail(job.id, "boom").unwrap();
        assert!(matches!(
            ledger.start(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));

        // Cancelled
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.cancel(job.id).unwrap();
        assert!(matches!(
            ledger.start(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    // -- complete / fail / cancel ---------------------------------------------

    #[test]
    fn complete_forces_progress_to_100() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::GenerateScript, 8);
        ledger.start(job.id).unwrap();
        ledger.update_progress(job.id, 40).unwrap();

        let done = ledger.complete(job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn complete_from_queued_rejected() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::GenerateScript, 8);
        assert!(matches!(
            ledger.complete(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn fail_records_error_message() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::RenderVideo, 4);
        ledger.start(job.id).unwrap();

        let failed = ledger.fail(job.id, "provider exploded").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("provider exploded"));
    }

    #[test]
    fn fail_allowed_from_queued() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::RenderVideo, 4);
        assert!(ledger.fail(job.id, "upstream stage failed").is_ok());
    }

    #[test]
    fn cancel_from_terminal_rejected() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.start(job.id).unwrap();
        ledger.complete(job.id).unwrap();
        assert!(matches!(
            ledger.cancel(job.id),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    // -- update_progress ------------------------------------------------------

    #[test]
    fn progress_at_or_above_100_rejected() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        assert!(matches!(
            ledger.update_progress(job.id, 101),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            ledger.update_progress(job.id, 100),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn progress_update_on_terminal_job_rejected() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.cancel(job.id).unwrap();
        assert!(matches!(
            ledger.update_progress(job.id, 50),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn unknown_job_reported_as_not_found() {
        let ledger = JobLedger::new();
        assert!(matches!(
            ledger.update_progress(uuid::Uuid::new_v4(), 10),
            Err(CoreError::JobNotFound(_))
        ));
    }

    // -- next_queued ----------------------------------------------------------

    #[test]
    fn next_queued_prefers_highest_priority() {
        let ledger = JobLedger::new();
        let low = ledger.create(project(), PipelineStage::RenderVideo, 4);
        let high = ledger.create(project(), PipelineStage::ParseDocument, 10);

        assert_eq!(ledger.next_queued().unwrap().id, high.id);
        ledger.start(high.id).unwrap();
        assert_eq!(ledger.next_queued().unwrap().id, low.id);
    }

    #[test]
    fn next_queued_breaks_priority_ties_by_created_at() {
        let ledger = JobLedger::new();
        let a = queued_job(5, 1);
        let b = queued_job(8, 2);
        let c = queued_job(8, 0);
        ledger.insert_raw(a);
        ledger.insert_raw(b);
        let expected = c.id;
        ledger.insert_raw(c);

        assert_eq!(ledger.next_queued().unwrap().id, expected);
    }

    #[test]
    fn next_queued_none_when_nothing_queued() {
        let ledger = JobLedger::new();
        let job = ledger.create(project(), PipelineStage::ParseDocument, 10);
        ledger.start(job.id).unwrap();
        assert!(ledger.next_queued().is_none());
    }

    // -- Project queries ------------------------------------------------------

    #[test]
    fn project_queries_are_scoped_and_ordered() {
        let ledger = JobLedger::new();
        let p1 = project();
        let p2 = project();
        let first = ledger.create(p1, PipelineStage::ParseDocument, 10);
        let second = ledger.create(p1, PipelineStage::GenerateScript, 8);
        ledger.create(p2, PipelineStage::ParseDocument, 10);

        let jobs = ledger.jobs_for_project(p1);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, first.id);
        assert_eq!(jobs[1].id, second.id);

        ledger.start(first.id).unwrap();
        ledger.complete(first.id).unwrap();
        let active = ledger.active_jobs_for_project(p1);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    // -- Invariants under random transition sequences -------------------------

    /// Drive a set of jobs through randomized transition attempts and check
    /// the ledger invariants after every operation, whether it succeeded or
    /// was rejected.
    #[test]
    fn invariants_hold_under_random_transitions() {
        let ledger = JobLedger::new();
        let pid = project();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        let ids: Vec<JobId> = (0..8)
            .map(|i| {
                ledger
                    .create(pid, PipelineStage::ALL[i % 4], (i % 4) as i32)
                    .id
            })
            .collect();

        for _ in 0..500 {
            let id = ids[rng.random_range(0..ids.len())];
            let before = ledger.get(id).unwrap();

            let result = match rng.random_range(0..5) {
                0 => ledger.start(id),
                1 => ledger.update_progress(id, rng.random_range(0..=100)),
                2 => ledger.complete(id),
                3 => ledger.fail(id, "induced failure"),
                _ => ledger.cancel(id),
            };

            let after = ledger.get(id).unwrap();

            // A rejected operation must not have changed the job.
            if result.is_err() {
                assert_eq!(after.status, before.status);
            }

            // progress == 100 iff completed: completion forces it, and
            // update_progress cannot reach it.
            assert_eq!(
                after.progress == 100,
                after.status == JobStatus::Completed
            );

            // error_message set iff failed.
            assert_eq!(
                after.error_message.is_some(),
                after.status == JobStatus::Failed
            );

            // started_at never resets.
            if before.started_at.is_some() {
                assert_eq!(after.started_at, before.started_at);
            }

            // Terminal states never transition away.
            if before.status.is_terminal() {
                assert_eq!(after.status, before.status);
            }
        }
    }
}
