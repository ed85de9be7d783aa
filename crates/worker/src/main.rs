//! Demo pipeline worker.
//!
//! Drives one project end to end: creates the stage jobs, walks the early
//! stages, renders through the auto-selected provider, and polls the
//! orchestrator at a fixed interval until the video reaches a terminal
//! state. Stands in for the surrounding scheduler that a full deployment
//! provides.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelsmith_core::job::PipelineStage;
use reelsmith_core::ledger::JobLedger;
use reelsmith_core::script::{Script, ScriptTemplate, VideoConfig};
use reelsmith_pipeline::PipelineCoordinator;
use reelsmith_providers::config::GeneratorSettings;
use reelsmith_providers::orchestrator::ProviderOrchestrator;

/// How often the demo loop polls its active render.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Script used by the demo run.
const DEMO_SCRIPT: &str = "\
# The water cycle (12s)
[Animated diagram of evaporation over an ocean]
[CALLOUT: 505,000 km3 of rain per year]
**Narration**
Heat lifts water from the oceans into the sky, where it cools and condenses.
---
# Back to the sea
[Rainfall over mountains flowing into rivers]
**Narration**
Gravity returns every drop, carving the landscape on the way down.
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelsmith_worker=info,reelsmith_providers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = GeneratorSettings::from_env();
    let generator = Arc::new(ProviderOrchestrator::from_settings(&settings));
    let ledger = Arc::new(JobLedger::new());
    let coordinator = PipelineCoordinator::new(ledger, generator);

    let project_id = uuid::Uuid::new_v4();
    let script = Script {
        id: uuid::Uuid::new_v4(),
        project_id,
        title: "The water cycle".to_string(),
        content: DEMO_SCRIPT.to_string(),
        template: ScriptTemplate::Educational,
        estimated_duration_secs: Some(20.0),
        scene_count: Some(2),
    };
    let config = VideoConfig {
        style: "educational".to_string(),
        ..VideoConfig::default()
    };

    tracing::info!(project_id = %project_id, "Starting demo pipeline run");
    coordinator.create_pipeline_jobs(project_id);

    // The parse/script/visuals work is done by external collaborators; the
    // demo marks them done to reach the render stage.
    for stage in [
        PipelineStage::ParseDocument,
        PipelineStage::GenerateScript,
        PipelineStage::CreateVisuals,
    ] {
        coordinator.start_stage(project_id, stage)?;
        coordinator.complete_stage(project_id, stage)?;
    }

    let handle = coordinator
        .render_video(project_id, &script, &config, None)
        .await?;
    tracing::info!(
        provider = %handle.provider,
        provider_job_id = %handle.provider_job_id,
        "Render started",
    );

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let state = loop {
        ticker.tick().await;
        let state = coordinator.poll_render(project_id, &handle).await?;
        tracing::info!(status = %state.status, progress = state.progress, "Render progress");
        if state.status.is_terminal() {
            break state;
        }
    };

    if let Some(artifact) = &state.artifact {
        tracing::info!(
            path = %artifact.file_path.display(),
            size_bytes = artifact.file_size,
            "Video artifact ready",
        );
    }

    let status = coordinator.status(project_id);
    tracing::info!(
        completed = status.completed_jobs,
        failed = status.failed_jobs,
        average_progress = status.average_progress,
        next_step = ?status.next_step,
        "Demo pipeline run finished",
    );

    Ok(())
}
