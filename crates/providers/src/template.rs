//! Template-based local renderer.
//!
//! Composes videos from pre-designed templates instead of calling an AI
//! back-end. Needs no credentials, so it is always registered and serves as
//! the guaranteed fallback when no external provider is usable.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use reelsmith_core::request::GenerationRequest;
use reelsmith_core::scene::{self, Scene};
use reelsmith_core::script::{Script, VideoConfig};

use crate::adapter::{
    Capabilities, CostEstimate, HealthReport, ProviderError, VideoProvider,
};
use crate::job::{GenerationStatus, ProviderJob, ProviderKind, VideoArtifact};
use crate::sim::SimulatedQueue;

/// Local template composition provider.
pub struct TemplateProvider {
    queue: SimulatedQueue,
    /// Scene plans captured at generate time, consumed at download time.
    plans: Mutex<HashMap<String, RenderPlan>>,
}

struct RenderPlan {
    title: String,
    scenes: Vec<Scene>,
    style: String,
    quality: String,
}

impl TemplateProvider {
    pub fn new() -> Self {
        Self {
            queue: SimulatedQueue::new(),
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Render the scene plan into the output file.
    ///
    /// Stands in for real template composition (assets, overlays, TTS); the
    /// written plan carries everything the compositor consumes.
    fn compose(plan: &RenderPlan) -> String {
        let mut out = format!(
            "Template video: {}\nstyle: {}\nquality: {}\nscenes: {}\n",
            plan.title,
            plan.style,
            plan.quality,
            plan.scenes.len()
        );
        for scene in &plan.scenes {
            out.push_str(&format!(
                "\n=== scene {} ({}s) ===\n{}\n{}\n{}\n",
                scene.scene_number,
                scene.duration_estimate_secs,
                scene.title,
                scene.visual_description,
                scene.narration,
            ));
            for callout in &scene.callouts {
                out.push_str(&format!("callout: {callout}\n"));
            }
        }
        out
    }

    fn resolution_for(quality: &str) -> &'static str {
        match quality {
            "720p" => "1280x720",
            "480p" => "854x480",
            _ => "1920x1080",
        }
    }
}

impl Default for TemplateProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoProvider for TemplateProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Template
    }

    async fn generate(
        &self,
        script: &Script,
        config: &VideoConfig,
    ) -> Result<ProviderJob, ProviderError> {
        let request = GenerationRequest::build(script, config)
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let job_id = format!("template_{}", uuid::Uuid::new_v4().simple());
        self.queue.enqueue(&job_id);
        self.plans.lock().expect("plan mutex poisoned").insert(
            job_id.clone(),
            RenderPlan {
                title: request.title,
                scenes: request.scenes,
                style: request.config.style,
                quality: request.config.quality,
            },
        );

        tracing::info!(job_id = %job_id, "Started template video generation");

        Ok(ProviderJob {
            job_id,
            provider: ProviderKind::Template,
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
            .then(|| format!("template://{job_id}"));

        Ok(ProviderJob {
            job_id: job_id.to_string(),
            provider: ProviderKind::Template,
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
        if !self.queue.is_completed(job_id) {
            let status = self
                .queue
                .current(job_id)
                .ok_or_else(|| ProviderError::JobNotFound(job_id.to_string()))?;
            return Err(ProviderError::NotCompleted {
                job_id: job_id.to_string(),
                status,
            });
        }

        let (content, duration, resolution) = {
            let plans = self.plans.lock().expect("plan mutex poisoned");
            let plan = plans
                .get(job_id)
                .ok_or_else(|| ProviderError::JobNotFound(job_id.to_string()))?;
            (
                Self::compose(plan),
                scene::total_duration_secs(&plan.scenes),
                Self::resolution_for(&plan.quality),
            )
        };

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, content.as_bytes()).await?;

        tracing::info!(job_id = %job_id, path = %output_path.display(), "Composed template video");

        Ok(VideoArtifact {
            file_path: output_path.to_path_buf(),
            file_size: content.len() as u64,
            duration_secs: Some(duration),
            resolution: Some(resolution.to_string()),
            format: "mp4".to_string(),
            generation_time_secs: None,
            cost: Some(0.0),
        })
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ProviderError> {
        // All outcomes count as success: cancelling an unknown or already
        // finished job is idempotent.
        let outcome = self.queue.cancel(job_id);
        tracing::info!(job_id = %job_id, ?outcome, "Cancelled template job");
        Ok(true)
    }

    async fn health_check(&self) -> Result<HealthReport, ProviderError> {
        Ok(HealthReport::healthy(
            ProviderKind::Template,
            "Local template renderer ready",
        ))
    }

    fn supported_formats(&self) -> Capabilities {
        Capabilities {
            formats: vec!["mp4"],
            resolutions: vec!["1920x1080", "1280x720", "854x480"],
            aspect_ratios: vec!["16:9", "9:16", "1:1"],
            max_duration_secs: 600.0,
            min_duration_secs: None,
        }
    }

    async fn estimate_cost(
        &self,
        _script: &Script,
        _config: &VideoConfig,
    ) -> Result<CostEstimate, ProviderError> {
        Ok(CostEstimate {
            estimated_cost: 0.0,
            currency: "USD",
            note: Some("Local composition, no external cost".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn script() -> Script {
        Script {
            id: uuid::Uuid::new_v4(),
            project_id: uuid::Uuid::new_v4(),
            title: "Template test".to_string(),
            content: "# One (6s)\n[Slide background]\n**Narration**\nHello.\n---\n# Two (4s)\nMore words."
                .to_string(),
            template: reelsmith_core::script::ScriptTemplate::Educational,
            estimated_duration_secs: Some(10.0),
            scene_count: Some(2),
        }
    }

    #[tokio::test]
    async fn lifecycle_advances_per_status_check() {
        let provider = TemplateProvider::new();
        let job = provider
            .generate(&script(), &VideoConfig::default())
            .await
            .unwrap();
        assert_eq!(job.status, GenerationStatus::Queued);

        let s1 = provider.check_status(&job.job_id).await.unwrap();
        assert_eq!(s1.status, GenerationStatus::Queued);
        let s2 = provider.check_status(&job.job_id).await.unwrap();
        assert_eq!(s2.status, GenerationStatus::Processing);
        let s3 = provider.check_status(&job.job_id).await.unwrap();
        assert_eq!(s3.status, GenerationStatus::Completed);
        assert!(s3.result_url.is_some());
    }

    #[tokio::test]
    async fn generate_rejects_sceneless_script() {
        let provider = TemplateProvider::new();
        let mut s = script();
        s.content = "   ".to_string();
        assert_matches!(
            provider.generate(&s, &VideoConfig::default()).await,
            Err(ProviderError::Other(_))
        );
    }

    #[tokio::test]
    async fn download_composes_artifact() {
        let provider = TemplateProvider::new();
        let job = provider
            .generate(&script(), &VideoConfig::default())
            .await
            .unwrap();
        for _ in 0..3 {
            provider.check_status(&job.job_id).await.unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let artifact = provider.download(&job.job_id, &path).await.unwrap();

        assert_eq!(artifact.file_path, path);
        assert!(artifact.file_size > 0);
        assert_eq!(artifact.format, "mp4");
        assert_eq!(artifact.duration_secs, Some(10.0));
        assert_eq!(artifact.cost, Some(0.0));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("scene 1"));
        assert!(written.contains("scene 2"));
    }

    #[tokio::test]
    async fn download_before_completion_rejected() {
        let provider = TemplateProvider::new();
        let job = provider
            .generate(&script(), &VideoConfig::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let result = provider.download(&job.job_id, &dir.path().join("x.mp4")).await;
        assert_matches!(result, Err(ProviderError::NotCompleted { .. }));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let provider = TemplateProvider::new();
        let job = provider
            .generate(&script(), &VideoConfig::default())
            .await
            .unwrap();

        assert!(provider.cancel(&job.job_id).await.unwrap());
        assert!(provider.cancel(&job.job_id).await.unwrap());
        assert!(provider.cancel("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn validation_flags_overlong_script() {
        let provider = TemplateProvider::new();
        let mut s = script();
        s.estimated_duration_secs = Some(10_000.0);
        let validation = provider.validate_script(&s);
        assert!(!validation.is_valid());
    }
}
