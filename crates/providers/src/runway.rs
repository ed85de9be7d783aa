//! Runway generation adapter.
//!
//! Wraps the Runway Gen-3 HTTP API (generation submission, status polling,
//! artifact download, cancellation) using [`reqwest`]. One generation is
//! submitted per script, driven by the script's first scene.

use std::path::Path;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use reelsmith_core::request::GenerationRequest;
use reelsmith_core::scene::{self, Scene};
use reelsmith_core::script::{Script, VideoConfig};

use crate::adapter::{
    Capabilities, CostEstimate, HealthReport, ProviderError, VideoProvider,
};
use crate::job::{GenerationStatus, ProviderJob, ProviderKind, VideoArtifact};

/// Default Runway API base URL.
const DEFAULT_BASE_URL: &str = "https://api.runwayml.com/v1";

/// Generation model submitted with every request.
const MODEL: &str = "gen3a_turbo";

/// Runway accepts clip durations in this range (seconds).
const MIN_CLIP_SECS: f64 = 4.0;
const MAX_CLIP_SECS: f64 = 10.0;

/// Approximate per-second generation cost in USD.
const COST_PER_SECOND: f64 = 0.05;

/// Health probe timeout.
const HEALTH_TIMEOUT_SECS: u64 = 10;

/// Runway Gen-3 video generation provider.
pub struct RunwayProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    status: Option<String>,
    failure_reason: Option<String>,
    #[serde(default)]
    artifacts: Vec<ArtifactRef>,
}

#[derive(Debug, Deserialize)]
struct ArtifactRef {
    url: Option<String>,
}

impl RunwayProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create an adapter against a non-default base URL (test instances).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Map Runway's native status names onto [`GenerationStatus`].
    ///
    /// Unknown names are treated as still processing rather than failing the
    /// poll.
    fn map_status(native: &str) -> GenerationStatus {
        match native {
            "PENDING" => GenerationStatus::Queued,
            "RUNNING" => GenerationStatus::Processing,
            "SUCCEEDED" => GenerationStatus::Completed,
            "FAILED" => GenerationStatus::Failed,
            "CANCELLED" => GenerationStatus::Cancelled,
            _ => GenerationStatus::Processing,
        }
    }

    /// Coarse progress for states Runway does not report granularly.
    fn progress_for(status: GenerationStatus) -> f64 {
        match status {
            GenerationStatus::Queued => 10.0,
            GenerationStatus::Processing => 50.0,
            GenerationStatus::Completed => 100.0,
            GenerationStatus::Failed | GenerationStatus::Cancelled => 0.0,
        }
    }

    /// Assemble the text prompt for a scene: title and visuals lead, a
    /// truncated slice of narration provides context, style and quality
    /// descriptors close.
    fn build_text_prompt(scene: &Scene, config: &VideoConfig) -> String {
        let mut parts = Vec::new();

        if !scene.title.is_empty() {
            parts.push(format!("Scene: {}", scene.title));
        }
        if !scene.visual_description.is_empty() {
            parts.push(scene.visual_description.replace(['[', ']'], ""));
        }
        if !scene.narration.is_empty() {
            let context: String = scene.narration.chars().take(200).collect();
            parts.push(format!("Context: {context}"));
        }
        if !config.style.is_empty() {
            parts.push(format!("Style: {}", config.style));
        }
        parts.push("High quality".to_string());
        parts.push("Professional cinematography".to_string());
        parts.push("Smooth camera movement".to_string());

        parts.join(". ")
    }

    /// Map a config aspect ratio onto Runway's pixel-dimension format.
    fn map_aspect_ratio(aspect_ratio: &str) -> &'static str {
        match aspect_ratio {
            "9:16" => "768:1280",
            "1:1" => "1024:1024",
            _ => "1280:768",
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl VideoProvider for RunwayProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Runway
    }

    async fn generate(
        &self,
        script: &Script,
        config: &VideoConfig,
    ) -> Result<ProviderJob, ProviderError> {
        let request = GenerationRequest::build(script, config)
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        // One generation per script for now, driven by the leading scene.
        let primary = &request.scenes[0];

        let duration = primary
            .duration_estimate_secs
            .clamp(MIN_CLIP_SECS, MAX_CLIP_SECS) as u32;
        let body = serde_json::json!({
            "model": MODEL,
            "text_prompt": Self::build_text_prompt(primary, config),
            "duration": duration,
            "aspect_ratio": Self::map_aspect_ratio(&request.config.aspect_ratio),
            "seed": serde_json::Value::Null,
        });

        let response = self
            .client
            .post(format!("{}/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitResponse = Self::ensure_success(response).await?.json().await?;

        tracing::info!(job_id = %submitted.id, "Started Runway video generation");

        Ok(ProviderJob {
            job_id: submitted.id,
            provider: ProviderKind::Runway,
            status: GenerationStatus::Queued,
            progress: 0.0,
            estimated_completion: None,
            error_message: None,
            result_url: None,
        })
    }

    async fn check_status(&self, job_id: &str) -> Result<ProviderJob, ProviderError> {
        let response = self
            .client
            .get(format!("{}/generations/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let generation: GenerationResponse = Self::ensure_success(response).await?.json().await?;

        let status = Self::map_status(generation.status.as_deref().unwrap_or("unknown"));

        // Runway generations typically finish within a couple of minutes.
        let estimated_completion = (status == GenerationStatus::Processing)
            .then(|| Utc::now() + ChronoDuration::minutes(2));

        Ok(ProviderJob {
            job_id: job_id.to_string(),
            provider: ProviderKind::Runway,
            status,
            progress: Self::progress_for(status),
            estimated_completion,
            error_message: generation.failure_reason,
            result_url: generation.artifacts.into_iter().find_map(|a| a.url),
        })
    }

    async fn download(
        &self,
        job_id: &str,
        output_path: &Path,
    ) -> Result<VideoArtifact, ProviderError> {
        let job = self.check_status(job_id).await?;
        if job.status != GenerationStatus::Completed {
            return Err(ProviderError::NotCompleted {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        let url = job
            .result_url
            .ok_or_else(|| ProviderError::MissingResultUrl(job_id.to_string()))?;

        let response = Self::ensure_success(self.client.get(&url).send().await?).await?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(output_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        let file_size = tokio::fs::metadata(output_path).await?.len();

        tracing::info!(job_id = %job_id, path = %output_path.display(), "Downloaded Runway video");

        Ok(VideoArtifact {
            file_path: output_path.to_path_buf(),
            file_size,
            duration_secs: None,
            resolution: None,
            format: "mp4".to_string(),
            generation_time_secs: None,
            cost: None,
        })
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ProviderError> {
        let response = self
            .client
            .delete(format!("{}/generations/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        // 404 means the job already finished or was cancelled; treat as
        // success so cancellation stays idempotent.
        let status = response.status().as_u16();
        let accepted = matches!(status, 200 | 204 | 404);
        if accepted {
            tracing::info!(job_id = %job_id, "Cancelled Runway job");
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::error!(job_id = %job_id, status, body = %body, "Failed to cancel Runway job");
        }
        Ok(accepted)
    }

    async fn health_check(&self) -> Result<HealthReport, ProviderError> {
        let response = self
            .client
            .get(format!("{}/generations?limit=1", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(std::time::Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(HealthReport::healthy(
                ProviderKind::Runway,
                "API is accessible",
            ))
        } else {
            Ok(HealthReport::unhealthy(
                ProviderKind::Runway,
                format!("API returned status {}", response.status().as_u16()),
            ))
        }
    }

    fn supported_formats(&self) -> Capabilities {
        Capabilities {
            formats: vec!["mp4"],
            resolutions: vec!["1280x768", "768x1280", "1024x1024"],
            aspect_ratios: vec!["16:9", "9:16", "1:1"],
            max_duration_secs: MAX_CLIP_SECS,
            min_duration_secs: Some(MIN_CLIP_SECS),
        }
    }

    async fn estimate_cost(
        &self,
        script: &Script,
        _config: &VideoConfig,
    ) -> Result<CostEstimate, ProviderError> {
        let scenes = scene::parse_scenes(&script.content);
        let generations = scenes.len().max(1) as f64;
        let total_duration = scene::total_duration_secs(&scenes);
        let per_generation_secs = (total_duration / generations).min(MAX_CLIP_SECS);
        let estimated = generations * COST_PER_SECOND * per_generation_secs;

        Ok(CostEstimate {
            estimated_cost: (estimated * 100.0).round() / 100.0,
            currency: "USD",
            note: Some("One generation per scene; pricing approximate".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(title: &str, visuals: &str, narration: &str) -> Scene {
        Scene {
            scene_number: 1,
            title: title.to_string(),
            visual_description: visuals.to_string(),
            narration: narration.to_string(),
            callouts: vec![],
            duration_estimate_secs: 6.0,
        }
    }

    // -- Status mapping -------------------------------------------------------

    #[test]
    fn native_statuses_map_onto_generation_status() {
        assert_eq!(RunwayProvider::map_status("PENDING"), GenerationStatus::Queued);
        assert_eq!(
            RunwayProvider::map_status("RUNNING"),
            GenerationStatus::Processing
        );
        assert_eq!(
            RunwayProvider::map_status("SUCCEEDED"),
            GenerationStatus::Completed
        );
        assert_eq!(RunwayProvider::map_status("FAILED"), GenerationStatus::Failed);
        assert_eq!(
            RunwayProvider::map_status("CANCELLED"),
            GenerationStatus::Cancelled
        );
    }

    #[test]
    fn unknown_native_status_treated_as_processing() {
        assert_eq!(
            RunwayProvider::map_status("SOMETHING_NEW"),
            GenerationStatus::Processing
        );
    }

    // -- Prompt building ------------------------------------------------------

    #[test]
    fn prompt_includes_scene_and_style() {
        let config = VideoConfig::default();
        let prompt = RunwayProvider::build_text_prompt(
            &scene("Sunrise", "[Wide shot of mountains]", "The day begins."),
            &config,
        );
        assert!(prompt.contains("Scene: Sunrise"));
        assert!(prompt.contains("Wide shot of mountains"));
        assert!(!prompt.contains('['));
        assert!(prompt.contains("Context: The day begins."));
        assert!(prompt.contains("Style: documentary"));
        assert!(prompt.contains("Professional cinematography"));
    }

    #[test]
    fn prompt_truncates_long_narration() {
        let long = "x".repeat(500);
        let prompt =
            RunwayProvider::build_text_prompt(&scene("T", "", &long), &VideoConfig::default());
        // 200 chars of context plus the "Context: " prefix.
        assert!(prompt.contains(&"x".repeat(200)));
        assert!(!prompt.contains(&"x".repeat(201)));
    }

    // -- Aspect ratio mapping -------------------------------------------------

    #[test]
    fn aspect_ratios_map_to_pixel_dimensions() {
        assert_eq!(RunwayProvider::map_aspect_ratio("16:9"), "1280:768");
        assert_eq!(RunwayProvider::map_aspect_ratio("9:16"), "768:1280");
        assert_eq!(RunwayProvider::map_aspect_ratio("1:1"), "1024:1024");
        // Unknown ratios fall back to landscape.
        assert_eq!(RunwayProvider::map_aspect_ratio("21:9"), "1280:768");
    }

    // -- Cost estimation ------------------------------------------------------

    #[tokio::test]
    async fn cost_scales_with_scene_count() {
        let provider = RunwayProvider::new("test-key".to_string());
        let config = VideoConfig::default();

        let one_scene = Script {
            id: uuid::Uuid::new_v4(),
            project_id: uuid::Uuid::new_v4(),
            title: "One".to_string(),
            content: "# A (8s)\nWords.".to_string(),
            template: reelsmith_core::script::ScriptTemplate::Documentary,
            estimated_duration_secs: None,
            scene_count: None,
        };
        let mut two_scenes = one_scene.clone();
        two_scenes.content = "# A (8s)\nWords.\n---\n# B (8s)\nMore.".to_string();

        let single = provider.estimate_cost(&one_scene, &config).await.unwrap();
        let double = provider.estimate_cost(&two_scenes, &config).await.unwrap();

        // 1 generation x $0.05 x 8s = $0.40; two scenes double it.
        assert!((single.estimated_cost - 0.40).abs() < 1e-9);
        assert!((double.estimated_cost - 0.80).abs() < 1e-9);
    }

    #[tokio::test]
    async fn per_generation_duration_capped() {
        let provider = RunwayProvider::new("test-key".to_string());
        let script = Script {
            id: uuid::Uuid::new_v4(),
            project_id: uuid::Uuid::new_v4(),
            title: "Long".to_string(),
            content: "# A (120s)\nWords.".to_string(),
            template: reelsmith_core::script::ScriptTemplate::Documentary,
            estimated_duration_secs: None,
            scene_count: None,
        };
        let estimate = provider
            .estimate_cost(&script, &VideoConfig::default())
            .await
            .unwrap();
        // Capped at 10s per generation: 1 x $0.05 x 10.
        assert!((estimate.estimated_cost - 0.50).abs() < 1e-9);
    }
}
