//! Shared in-process job queue for local and stub adapters.
//!
//! Progression is poll-driven rather than wall-clock-driven: each status
//! check advances the job one step (queued → processing → completed), which
//! keeps adapter behavior deterministic under test and under any polling
//! cadence.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::job::GenerationStatus;

/// Status checks observed before a job leaves the queue.
const QUEUED_POLLS: u32 = 1;
/// Status checks spent processing before completion.
const PROCESSING_POLLS: u32 = 1;

/// Result of a cancellation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was active and is now cancelled.
    Cancelled,
    /// The job had already reached a terminal state.
    AlreadyTerminal,
    /// The queue has no record of this job.
    Unknown,
}

#[derive(Debug)]
struct SimJob {
    polls: u32,
    cancelled: bool,
}

/// Mutex-guarded job table with deterministic per-poll progression.
#[derive(Default)]
pub struct SimulatedQueue {
    jobs: Mutex<HashMap<String, SimJob>>,
}

impl SimulatedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly submitted job.
    pub fn enqueue(&self, job_id: &str) {
        self.jobs.lock().expect("sim queue mutex poisoned").insert(
            job_id.to_string(),
            SimJob {
                polls: 0,
                cancelled: false,
            },
        );
    }

    /// Advance the job one step and report its status and progress.
    ///
    /// Returns `None` for jobs this queue has never seen.
    pub fn poll(&self, job_id: &str) -> Option<(GenerationStatus, f64)> {
        let mut jobs = self.jobs.lock().expect("sim queue mutex poisoned");
        let job = jobs.get_mut(job_id)?;

        if job.cancelled {
            return Some((GenerationStatus::Cancelled, job_progress(job.polls)));
        }

        // A completed job no longer advances.
        if job.polls < QUEUED_POLLS + PROCESSING_POLLS + 1 {
            job.polls += 1;
        }

        Some((poll_status(job.polls), job_progress(job.polls)))
    }

    /// Current status without advancing the job.
    pub fn current(&self, job_id: &str) -> Option<GenerationStatus> {
        let jobs = self.jobs.lock().expect("sim queue mutex poisoned");
        jobs.get(job_id).map(|j| {
            if j.cancelled {
                GenerationStatus::Cancelled
            } else {
                poll_status(j.polls)
            }
        })
    }

    /// Whether the job has reached completion.
    pub fn is_completed(&self, job_id: &str) -> bool {
        let jobs = self.jobs.lock().expect("sim queue mutex poisoned");
        jobs.get(job_id)
            .is_some_and(|j| !j.cancelled && poll_status(j.polls) == GenerationStatus::Completed)
    }

    /// Cooperatively cancel a job.
    pub fn cancel(&self, job_id: &str) -> CancelOutcome {
        let mut jobs = self.jobs.lock().expect("sim queue mutex poisoned");
        match jobs.get_mut(job_id) {
            None => CancelOutcome::Unknown,
            Some(job) if job.cancelled || poll_status(job.polls) == GenerationStatus::Completed => {
                CancelOutcome::AlreadyTerminal
            }
            Some(job) => {
                job.cancelled = true;
                CancelOutcome::Cancelled
            }
        }
    }
}

fn poll_status(polls: u32) -> GenerationStatus {
    if polls <= QUEUED_POLLS {
        GenerationStatus::Queued
    } else if polls <= QUEUED_POLLS + PROCESSING_POLLS {
        GenerationStatus::Processing
    } else {
        GenerationStatus::Completed
    }
}

fn job_progress(polls: u32) -> f64 {
    match poll_status(polls) {
        GenerationStatus::Queued => 10.0,
        GenerationStatus::Processing => 55.0,
        GenerationStatus::Completed => 100.0,
        GenerationStatus::Failed | GenerationStatus::Cancelled => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
