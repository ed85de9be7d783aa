//! Pika generation adapter (stub).
//!
//! Pika's public API is still gated, so this adapter runs the shared
//! simulated lifecycle and produces placeholder artifacts. The surface
//! matches the real adapter so the swap is contained to this file once API
//! access lands.

use std::path::Path;

use async_trait::async_trait;

use reelsmith_core::request::GenerationRequest;
use reelsmith_core::scene;
use reelsmith_core::script::{Script, VideoConfig};

use crate::adapter::{
    Capabilities, CostEstimate, HealthReport, ProviderError, VideoProvider,
};
use crate::job::{GenerationStatus, ProviderJob, ProviderKind, VideoArtifact};
use crate::sim::SimulatedQueue;

/// Per-generation placeholder price in USD.
const COST_PER_GENERATION: f64 = 0.10;

/// Pika Labs video generation provider.
pub struct PikaProvider {
    #[allow(dead_code)]
    api_key: String,
    queue: SimulatedQueue,
}

impl PikaProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            queue: SimulatedQueue::new(),
        }
    }
}

#[async_trait]
impl VideoProvider for PikaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pika
    }

    async fn generate(
        &self,
        script: &Script,
        config: &VideoConfig,
    ) -> Result<ProviderJob, ProviderError> {
        let request = GenerationRequest::build(script, config)
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let job_id = format!("pika_{}", uuid::Uuid::new_v4().simple());
        self.queue.enqueue(&job_id);
        tracing::info!(
            job_id = %job_id,
            scene_count = request.metadata.scene_count,
            "Started Pika video generation (stub)",
        );

        Ok(ProviderJob {
            job_id,
            provider: ProviderKind::Pika,
            status: GenerationStatus::Queued,
            progress: 0.0,
            estimated_completion: None,
            error_message: None,
            result_url: None,
        })
    }

    async fn check_status(&self, job_id: &str) -> Result<ProviderJob, ProviderError> {
        let (status, progress) = self
            .queue
            .poll(job_id)
            .ok_or_else(|| ProviderError::JobNotFound(job_id.to_string()))?;

        let result_url = (status == GenerationStatus::Completed)
            .then(|| format!("https://example.com/pika-video-{job_id}.mp4"));

        Ok(ProviderJob {
            job_id: job_id.to_string(),
            provider: ProviderKind::Pika,
            status,
            progress,
            estimated_completion: None,
            error_message: None,
            result_url,
        })
    }

    async fn download(
        &self,
        job_id: &str,
        output_path: &Path,
    ) -> Result<VideoArtifact, ProviderError> {
        let status = self
            .queue
            .current(job_id)
            .ok_or_else(|| ProviderError::JobNotFound(job_id.to_string()))?;
        if status != GenerationStatus::Completed {
            return Err(ProviderError::NotCompleted {
                job_id: job_id.to_string(),
                status,
            });
        }

        let content = format!("Placeholder video file for Pika job {job_id}\n");
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, content.as_bytes()).await?;

        Ok(VideoArtifact {
            file_path: output_path.to_path_buf(),
            file_size: content.len() as u64,
            duration_secs: None,
            resolution: None,
            format: "mp4".to_string(),
            generation_time_secs: None,
            cost: None,
        })
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ProviderError> {
        let outcome = self.queue.cancel(job_id);
        tracing::info!(job_id = %job_id, ?outcome, "Cancelled Pika job (stub)");
        Ok(true)
    }

    async fn health_check(&self) -> Result<HealthReport, ProviderError> {
        Ok(HealthReport::healthy(
            ProviderKind::Pika,
            "Stub back-end; awaiting public API access",
        ))
    }

    fn supported_formats(&self) -> Capabilities {
        Capabilities {
            formats: vec!["mp4"],
            resolutions: vec!["1024x576", "576x1024", "768x768"],
            aspect_ratios: vec!["16:9", "9:16", "1:1"],
            max_duration_secs: 3.0,
            min_duration_secs: None,
        }
    }

    async fn estimate_cost(
        &self,
        script: &Script,
        _config: &VideoConfig,
    ) -> Result<CostEstimate, ProviderError> {
        let generations = scene::parse_scenes(&script.content).len().max(1) as f64;
        Ok(CostEstimate {
            estimated_cost: generations * COST_PER_GENERATION,
            currency: "USD",
            note: Some("Placeholder pricing pending API access".to_string()),
        })
    }
}
