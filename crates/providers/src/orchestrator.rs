//! Provider orchestration: registry, automatic selection, and the
//! poll/download/cancel protocol.
//!
//! [`ProviderOrchestrator`] owns the set of registered [`VideoProvider`]
//! adapters and every active generation handle. Polling is caller-driven —
//! no background scheduler runs here; a surrounding worker calls
//! [`ProviderOrchestrator::poll`] on its active handles until they reach a
//! terminal state.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};

use reelsmith_core::script::{Script, VideoConfig};
use reelsmith_core::types::VideoId;

use crate::adapter::{Capabilities, HealthReport, VideoProvider};
use crate::config::GeneratorSettings;
use crate::job::{GenerationStatus, ProviderKind, VideoArtifact};
use crate::luma::LumaProvider;
use crate::pika::PikaProvider;
use crate::runway::RunwayProvider;
use crate::selection::{score_provider, SelectionCriteria};
use crate::template::TemplateProvider;

/// Default cap on concurrent in-flight generate calls, protecting
/// rate-limited external APIs.
pub const DEFAULT_MAX_CONCURRENT_GENERATIONS: usize = 3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// No registered provider is healthy, capable, and within budget.
    #[error("No suitable video provider available")]
    NoProviderAvailable,

    /// The script failed the chosen provider's validation; no remote call
    /// was made.
    #[error("Script validation failed: {0}")]
    ScriptIncompatible(String),

    /// A remote call (generate/poll/cancel) failed.
    #[error("Provider {provider} call failed: {message}")]
    ProviderCall {
        provider: ProviderKind,
        message: String,
    },

    /// The generation completed but the artifact could not be downloaded.
    /// The handle stays completed-but-undownloaded; a later poll retries
    /// only the download.
    #[error("Artifact download from {provider} failed: {message}")]
    ArtifactDownload {
        provider: ProviderKind,
        message: String,
    },

    /// The requested provider is not in the registry.
    #[error("Provider {0} is not registered")]
    UnknownProvider(ProviderKind),

    /// The orchestrator has no record of this handle.
    #[error("Unknown video handle: {0}")]
    UnknownHandle(VideoId),
}

// ---------------------------------------------------------------------------
// Handles and state
// ---------------------------------------------------------------------------

/// Local reference correlating a generation attempt to a remote provider
/// job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VideoHandle {
    pub video_id: VideoId,
    pub provider: ProviderKind,
    pub provider_job_id: String,
}

/// Caller-visible state of one generation attempt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VideoState {
    pub status: GenerationStatus,
    pub progress: f64,
    pub error_message: Option<String>,
    pub artifact: Option<VideoArtifact>,
}

/// Health and capabilities of one registered provider.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderStatus {
    pub health: HealthReport,
    pub capabilities: Capabilities,
}

/// Aggregated cost estimate for a batch of scripts under one provider.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchCostEstimate {
    pub total_cost: f64,
    pub currency: &'static str,
    pub video_count: usize,
    pub average_per_video: f64,
}

/// Orchestrator-private bookkeeping for one handle.
struct ActiveVideo {
    provider: ProviderKind,
    provider_job_id: String,
    output_path: PathBuf,
    status: GenerationStatus,
    progress: f64,
    error_message: Option<String>,
    artifact: Option<VideoArtifact>,
    /// Set by [`ProviderOrchestrator::cancel`]; a remote COMPLETED observed
    /// afterwards is ignored.
    cancelled: bool,
    /// Serializes poll/download per handle: at most one in-flight
    /// poll/download at a time.
    poll_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ActiveVideo {
    fn state(&self) -> VideoState {
        VideoState {
            status: self.status,
            progress: self.progress,
            error_message: self.error_message.clone(),
            artifact: self.artifact.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Registry of provider adapters plus tracking of in-flight generations.
///
/// Created once at startup; the registry is read-only afterwards and safe
/// for concurrent use. The active-handle map is the only mutable shared
/// structure and is guarded by a lock that is never held across a remote
/// call.
pub struct ProviderOrchestrator {
    /// Registration order is the tie-break for equal selection scores.
    providers: Vec<Arc<dyn VideoProvider>>,
    active: RwLock<HashMap<VideoId, ActiveVideo>>,
    generate_permits: Semaphore,
    output_dir: PathBuf,
}

impl ProviderOrchestrator {
    /// Create an empty orchestrator. Register adapters before sharing it.
    pub fn new(output_dir: PathBuf, max_concurrent_generations: usize) -> Self {
        Self {
            providers: Vec::new(),
            active: RwLock::new(HashMap::new()),
            generate_permits: Semaphore::new(max_concurrent_generations.max(1)),
            output_dir,
        }
    }

    /// Build the production registry from settings: credentialed adapters
    /// only where keys are configured, the template renderer always, last.
    pub fn from_settings(settings: &GeneratorSettings) -> Self {
        let mut orchestrator = Self::new(
            settings.output_dir.clone(),
            settings.max_concurrent_generations,
        );

        if let Some(key) = settings.runway_api_key.clone() {
            orchestrator.register(Arc::new(RunwayProvider::new(key)));
        }
        if let Some(key) = settings.pika_api_key.clone() {
            orchestrator.register(Arc::new(PikaProvider::new(key)));
        }
        if let Some(key) = settings.luma_api_key.clone() {
            orchestrator.register(Arc::new(LumaProvider::new(key)));
        }
        orchestrator.register(Arc::new(TemplateProvider::new()));

        tracing::info!(
            providers = ?orchestrator.registered_providers(),
            "Initialized video providers",
        );
        orchestrator
    }

    /// Add an adapter to the registry. Later registrations lose score ties.
    pub fn register(&mut self, provider: Arc<dyn VideoProvider>) {
        self.providers.push(provider);
    }

    /// Registered provider identifiers, in registration order.
    pub fn registered_providers(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    // -- generation ---------------------------------------------------------

    /// Start video generation for a script.
    ///
    /// Selection: a healthy `preferred` provider wins outright; otherwise
    /// every healthy provider is scored and the highest positive score is
    /// chosen, ties broken by registration order. The script is validated
    /// against the chosen provider before any remote call.
    pub async fn generate(
        &self,
        script: &Script,
        config: &VideoConfig,
        preferred: Option<ProviderKind>,
    ) -> Result<VideoHandle, GeneratorError> {
        let _permit = self
            .generate_permits
            .acquire()
            .await
            .expect("generation semaphore closed");

        let chosen = self.select_provider(script, config, preferred).await?;
        let provider = self.provider(chosen)?;

        let validation = provider.validate_script(script);
        if !validation.is_valid() {
            return Err(GeneratorError::ScriptIncompatible(
                validation.issues.join("; "),
            ));
        }
        for warning in &validation.warnings {
            tracing::warn!(provider = %chosen, warning = %warning, "Script validation warning");
        }

        let job = provider
            .generate(script, config)
            .await
            .map_err(|e| GeneratorError::ProviderCall {
                provider: chosen,
                message: e.to_string(),
            })?;

        let video_id = uuid::Uuid::new_v4();
        let output_path = self
            .output_dir
            .join(format!("video_{video_id}_{chosen}.mp4"));

        let handle = VideoHandle {
            video_id,
            provider: chosen,
            provider_job_id: job.job_id.clone(),
        };

        self.active.write().await.insert(
            video_id,
            ActiveVideo {
                provider: chosen,
                provider_job_id: job.job_id,
                output_path,
                status: job.status,
                progress: job.progress,
                error_message: None,
                artifact: None,
                cancelled: false,
                poll_lock: Arc::new(tokio::sync::Mutex::new(())),
            },
        );

        tracing::info!(
            video_id = %video_id,
            provider = %chosen,
            provider_job_id = %handle.provider_job_id,
            "Started video generation",
        );
        Ok(handle)
    }

    // -- polling ------------------------------------------------------------

    /// Check the remote state of a generation and advance the local handle.
    ///
    /// The first poll that observes COMPLETED downloads the artifact
    /// synchronously, making completion discovery and materialization atomic
    /// for the caller. Subsequent polls are idempotent: once the artifact is
    /// written the recorded state is returned without touching the provider.
    pub async fn poll(&self, handle: &VideoHandle) -> Result<VideoState, GeneratorError> {
        let poll_lock = {
            let active = self.active.read().await;
            let entry = active
                .get(&handle.video_id)
                .ok_or(GeneratorError::UnknownHandle(handle.video_id))?;
            entry.poll_lock.clone()
        };

        // One in-flight poll/download per handle; later callers wait here
        // and then observe whatever the first poll recorded.
        let _guard = poll_lock.lock().await;

        let (provider_kind, job_id, output_path, needs_download_only) = {
            let active = self.active.read().await;
            let entry = active
                .get(&handle.video_id)
                .ok_or(GeneratorError::UnknownHandle(handle.video_id))?;

            // Terminal local states short-circuit: downloaded completions,
            // failures, and cancellations are never re-polled.
            match entry.status {
                GenerationStatus::Completed if entry.artifact.is_some() => {
                    return Ok(entry.state())
                }
                GenerationStatus::Failed | GenerationStatus::Cancelled => {
                    return Ok(entry.state())
                }
                _ => {}
            }

            (
                entry.provider,
                entry.provider_job_id.clone(),
                entry.output_path.clone(),
                entry.status == GenerationStatus::Completed && entry.artifact.is_none(),
            )
        };

        let provider = self.provider(provider_kind)?;

        // Completed-but-undownloaded: retry only the download.
        if needs_download_only {
            return self
                .download_artifact(handle, provider_kind, &job_id, &output_path)
                .await;
        }

        let job = match provider.check_status(&job_id).await {
            Ok(job) => job,
            Err(e) => {
                let message = e.to_string();
                self.with_entry(handle.video_id, |entry| {
                    entry.error_message = Some(message.clone());
                })
                .await;
                return Err(GeneratorError::ProviderCall {
                    provider: provider_kind,
                    message,
                });
            }
        };

        match job.status {
            GenerationStatus::Completed => {
                self.with_entry(handle.video_id, |entry| {
                    entry.status = GenerationStatus::Completed;
                    entry.progress = 100.0;
                })
                .await;
                self.download_artifact(handle, provider_kind, &job_id, &output_path)
                    .await
            }
            GenerationStatus::Failed => {
                let message = job
                    .error_message
                    .unwrap_or_else(|| "Video generation failed".to_string());
                tracing::error!(
                    video_id = %handle.video_id,
                    provider = %provider_kind,
                    error = %message,
                    "Video generation failed",
                );
                self.with_entry(handle.video_id, |entry| {
                    entry.status = GenerationStatus::Failed;
                    entry.error_message = Some(message.clone());
                })
                .await;
                self.state_of(handle).await
            }
            status => {
                self.with_entry(handle.video_id, |entry| {
                    entry.status = status;
                    entry.progress = job.progress;
                })
                .await;
                self.state_of(handle).await
            }
        }
    }

    /// Download the completed artifact and record its metadata.
    ///
    /// On failure the handle stays completed-but-undownloaded so the next
    /// poll retries only this step.
    async fn download_artifact(
        &self,
        handle: &VideoHandle,
        provider_kind: ProviderKind,
        job_id: &str,
        output_path: &std::path::Path,
    ) -> Result<VideoState, GeneratorError> {
        // A cancel may have landed while the remote reported completion;
        // ignore it and keep the cancelled state, without materializing.
        {
            let active = self.active.read().await;
            if let Some(entry) = active.get(&handle.video_id) {
                if entry.cancelled {
                    return Ok(entry.state());
                }
            }
        }

        let provider = self.provider(provider_kind)?;
        match provider.download(job_id, output_path).await {
            Ok(artifact) => {
                tracing::info!(
                    video_id = %handle.video_id,
                    path = %artifact.file_path.display(),
                    "Video artifact downloaded",
                );
                self.with_entry(handle.video_id, |entry| {
                    entry.status = GenerationStatus::Completed;
                    entry.progress = 100.0;
                    // Written once; never overwritten by later polls.
                    if entry.artifact.is_none() {
                        entry.artifact = Some(artifact.clone());
                    }
                })
                .await;
                self.state_of(handle).await
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    video_id = %handle.video_id,
                    provider = %provider_kind,
                    error = %message,
                    "Artifact download failed",
                );
                self.with_entry(handle.video_id, |entry| {
                    entry.error_message = Some(message.clone());
                })
                .await;
                Err(GeneratorError::ArtifactDownload {
                    provider: provider_kind,
                    message,
                })
            }
        }
    }

    // -- cancellation -------------------------------------------------------

    /// Cancel a generation.
    ///
    /// Cooperative: the remote provider may keep running briefly, and a
    /// later remote COMPLETED for this handle is ignored. A provider that no
    /// longer knows the job reports success (idempotent cancel).
    pub async fn cancel(&self, handle: &VideoHandle) -> Result<bool, GeneratorError> {
        let (provider_kind, job_id) = {
            let active = self.active.read().await;
            let entry = active
                .get(&handle.video_id)
                .ok_or(GeneratorError::UnknownHandle(handle.video_id))?;
            (entry.provider, entry.provider_job_id.clone())
        };

        let provider = self.provider(provider_kind)?;
        let accepted =
            provider
                .cancel(&job_id)
                .await
                .map_err(|e| GeneratorError::ProviderCall {
                    provider: provider_kind,
                    message: e.to_string(),
                })?;

        if accepted {
            self.with_entry(handle.video_id, |entry| {
                entry.cancelled = true;
                entry.status = GenerationStatus::Cancelled;
                entry.error_message = Some("Generation cancelled by user".to_string());
            })
            .await;
            tracing::info!(video_id = %handle.video_id, "Video generation cancelled");
        }
        Ok(accepted)
    }

    // -- read-only queries --------------------------------------------------

    /// Recorded local state of a handle, without touching the provider.
    pub async fn state_of(&self, handle: &VideoHandle) -> Result<VideoState, GeneratorError> {
        let active = self.active.read().await;
        active
            .get(&handle.video_id)
            .map(ActiveVideo::state)
            .ok_or(GeneratorError::UnknownHandle(handle.video_id))
    }

    /// Handles still awaiting a terminal state.
    pub async fn active_handles(&self) -> Vec<VideoHandle> {
        let active = self.active.read().await;
        active
            .iter()
            .filter(|(_, entry)| !entry.status.is_terminal())
            .map(|(video_id, entry)| VideoHandle {
                video_id: *video_id,
                provider: entry.provider,
                provider_job_id: entry.provider_job_id.clone(),
            })
            .collect()
    }

    /// Health and capabilities of every registered provider. A health check
    /// that errors reports the provider unhealthy instead of propagating.
    pub async fn provider_status(&self) -> BTreeMap<ProviderKind, ProviderStatus> {
        let mut statuses = BTreeMap::new();
        for provider in &self.providers {
            let kind = provider.kind();
            let health = match provider.health_check().await {
                Ok(report) => report,
                Err(e) => HealthReport::unhealthy(kind, format!("Health check failed: {e}")),
            };
            statuses.insert(
                kind,
                ProviderStatus {
                    health,
                    capabilities: provider.supported_formats(),
                },
            );
        }
        statuses
    }

    /// Batch cost estimates for a set of scripts, per provider (or only the
    /// named one). Providers whose estimation fails are skipped.
    pub async fn estimate_cost(
        &self,
        scripts: &[Script],
        provider: Option<ProviderKind>,
        config: &VideoConfig,
    ) -> BTreeMap<ProviderKind, BatchCostEstimate> {
        let mut estimates = BTreeMap::new();

        'providers: for candidate in &self.providers {
            let kind = candidate.kind();
            if provider.is_some_and(|wanted| wanted != kind) {
                continue;
            }

            let mut total = 0.0;
            for script in scripts {
                match candidate.estimate_cost(script, config).await {
                    Ok(estimate) => total += estimate.estimated_cost,
                    Err(e) => {
                        tracing::warn!(provider = %kind, error = %e, "Cost estimation failed");
                        continue 'providers;
                    }
                }
            }

            let count = scripts.len();
            estimates.insert(
                kind,
                BatchCostEstimate {
                    total_cost: round_cents(total),
                    currency: "USD",
                    video_count: count,
                    average_per_video: round_cents(total / count.max(1) as f64),
                },
            );
        }
        estimates
    }

    // -- private helpers ----------------------------------------------------

    fn provider(&self, kind: ProviderKind) -> Result<&Arc<dyn VideoProvider>, GeneratorError> {
        self.providers
            .iter()
            .find(|p| p.kind() == kind)
            .ok_or(GeneratorError::UnknownProvider(kind))
    }

    /// Resolve which provider will serve this request.
    async fn select_provider(
        &self,
        script: &Script,
        config: &VideoConfig,
        preferred: Option<ProviderKind>,
    ) -> Result<ProviderKind, GeneratorError> {
        if let Some(wanted) = preferred {
            match self.provider(wanted) {
                Ok(provider) => match provider.health_check().await {
                    Ok(health) if health.is_usable() => return Ok(wanted),
                    Ok(health) => tracing::warn!(
                        provider = %wanted,
                        message = %health.message,
                        "Preferred provider unhealthy, falling back to auto-selection",
                    ),
                    Err(e) => tracing::warn!(
                        provider = %wanted,
                        error = %e,
                        "Preferred provider health check failed, falling back to auto-selection",
                    ),
                },
                Err(_) => tracing::warn!(
                    provider = %wanted,
                    "Preferred provider not registered, falling back to auto-selection",
                ),
            }
        }

        let criteria = SelectionCriteria::from_request(script, config);
        let mut best: Option<(ProviderKind, f64)> = None;

        for provider in &self.providers {
            let kind = provider.kind();
            let health = match provider.health_check().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::debug!(provider = %kind, error = %e, "Health check failed");
                    continue;
                }
            };
            if !health.is_usable() {
                continue;
            }

            let estimated_cost = match provider.estimate_cost(script, config).await {
                Ok(estimate) => Some(estimate.estimated_cost),
                Err(e) => {
                    tracing::debug!(provider = %kind, error = %e, "Cost estimation failed");
                    None
                }
            };

            let score = score_provider(
                kind,
                &provider.supported_formats(),
                estimated_cost,
                &criteria,
            );
            if score <= 0.0 {
                continue;
            }
            // Strict comparison keeps the earliest registration on ties.
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((kind, score));
            }
        }

        match best {
            Some((kind, score)) => {
                tracing::info!(provider = %kind, score, "Auto-selected video provider");
                Ok(kind)
            }
            None => Err(GeneratorError::NoProviderAvailable),
        }
    }

    /// Run a mutation against one active entry, if it still exists.
    async fn with_entry(&self, video_id: VideoId, mutate: impl FnOnce(&mut ActiveVideo)) {
        let mut active = self.active.write().await;
        if let Some(entry) = active.get_mut(&video_id) {
            mutate(entry);
        }
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
