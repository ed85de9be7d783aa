//! Script entity and video generation configuration.
//!
//! A [`Script`] is produced by the (out-of-scope) script-generation service;
//! the pipeline only consumes it. [`VideoConfig`] carries the caller's
//! rendering preferences and is merged into the provider wire request.

use serde::{Deserialize, Serialize};

use crate::types::{ProjectId, ScriptId};

// ---------------------------------------------------------------------------
// Script template
// ---------------------------------------------------------------------------

/// Script template the generation service used, hinting at content style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptTemplate {
    Educational,
    Documentary,
    Presentation,
    Tutorial,
    Summary,
    Custom,
}

impl ScriptTemplate {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptTemplate::Educational => "educational",
            ScriptTemplate::Documentary => "documentary",
            ScriptTemplate::Presentation => "presentation",
            ScriptTemplate::Tutorial => "tutorial",
            ScriptTemplate::Summary => "summary",
            ScriptTemplate::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ScriptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Script entity
// ---------------------------------------------------------------------------

/// A generated video script, ready for scene segmentation and rendering.
///
/// All durations in this codebase are seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: ScriptId,
    pub project_id: ProjectId,
    pub title: String,
    /// Scene-markup script text; see [`crate::scene::parse_scenes`].
    pub content: String,
    pub template: ScriptTemplate,
    /// Estimated total video duration in seconds, if known.
    pub estimated_duration_secs: Option<f64>,
    /// Scene count reported by the script generator, if known.
    pub scene_count: Option<u32>,
}

// ---------------------------------------------------------------------------
// Video configuration
// ---------------------------------------------------------------------------

/// Rendering preferences for one generation request.
///
/// `settings` holds provider-specific extras that are flattened into the
/// request's `config` object verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub quality: String,
    pub aspect_ratio: String,
    pub style: String,
    pub include_narration: bool,
    pub voice_style: String,
    /// Budget ceiling in USD for provider selection. `None` means unlimited.
    pub max_cost: Option<f64>,
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            quality: "1080p".to_string(),
            aspect_ratio: "16:9".to_string(),
            style: "documentary".to_string(),
            include_narration: true,
            voice_style: "professional".to_string(),
            max_cost: None,
            settings: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
