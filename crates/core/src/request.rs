//! Provider-agnostic generation request.
//!
//! [`GenerationRequest`] is the one wire shape every provider back-end must
//! accept. It is built exactly once per provider call from a [`Script`] and a
//! [`VideoConfig`] and never mutated afterwards.

use serde::Serialize;

use crate::error::CoreError;
use crate::scene::{self, Scene};
use crate::script::{Script, VideoConfig};
use crate::types::ScriptId;

/// The JSON request body sent to a generation provider.
///
/// Serialized shape:
///
/// ```json
/// {
///   "script_id": "...",
///   "title": "...",
///   "scenes": [...],
///   "config": { "quality": "...", "aspect_ratio": "...", "style": "...",
///               "include_narration": true, "voice_style": "...", ... },
///   "metadata": { "estimated_duration": 42.0, "scene_count": 3,
///                 "template": "educational" }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub script_id: ScriptId,
    pub title: String,
    pub scenes: Vec<Scene>,
    pub config: RequestConfig,
    pub metadata: RequestMetadata,
}

/// The `config` object of the wire request. Extra provider-specific settings
/// from [`VideoConfig::settings`] are flattened in alongside the fixed keys.
#[derive(Debug, Clone, Serialize)]
pub struct RequestConfig {
    pub quality: String,
    pub aspect_ratio: String,
    pub style: String,
    pub include_narration: bool,
    pub voice_style: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `metadata` object of the wire request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetadata {
    /// Total estimated duration in seconds: the script's own estimate when
    /// present, otherwise the sum of parsed scene durations.
    pub estimated_duration: f64,
    pub scene_count: usize,
    pub template: String,
}

impl GenerationRequest {
    /// Parse the script into scenes and assemble the wire request.
    ///
    /// Fails with a validation error when no usable scenes parse out of the
    /// script content, so no provider ever receives an empty scene list.
    pub fn build(script: &Script, config: &VideoConfig) -> Result<Self, CoreError> {
        let scenes = scene::parse_scenes(&script.content);
        if scenes.is_empty() {
            return Err(CoreError::Validation(
                "No valid scenes found in script".to_string(),
            ));
        }

        let estimated_duration = script
            .estimated_duration_secs
            .unwrap_or_else(|| scene::total_duration_secs(&scenes));

        Ok(Self {
            script_id: script.id,
            title: script.title.clone(),
            metadata: RequestMetadata {
                estimated_duration,
                scene_count: scenes.len(),
                template: script.template.to_string(),
            },
            scenes,
            config: RequestConfig {
                quality: config.quality.clone(),
                aspect_ratio: config.aspect_ratio.clone(),
                style: config.style.clone(),
                include_narration: config.include_narration,
                voice_style: config.voice_style.clone(),
                extra: config.settings.clone(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptTemplate;

    fn script(content: &str) -> Script {
        Script {
            id: uuid::Uuid::new_v4(),
            project_id: uuid::Uuid::new_v4(),
            title: "Test script".to_string(),
            content: content.to_string(),
            template: ScriptTemplate::Educational,
            estimated_duration_secs: None,
            scene_count: None,
        }
    }

    #[test]
    fn build_assembles_wire_shape() {
        let mut config = VideoConfig::default();
        config
            .settings
            .insert("transition".to_string(), serde_json::json!("fade"));

        let request =
            GenerationRequest::build(&script("# One (8s)\nNarration text."), &config).unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["title"], "Test script");
        assert_eq!(value["scenes"].as_array().unwrap().len(), 1);
        assert_eq!(value["config"]["quality"], "1080p");
        // Extra settings are flattened into config, not nested.
        assert_eq!(value["config"]["transition"], "fade");
        assert_eq!(value["metadata"]["scene_count"], 1);
        assert_eq!(value["metadata"]["template"], "educational");
        assert_eq!(value["metadata"]["estimated_duration"], 8.0);
    }

    #[test]
    fn build_prefers_script_duration_estimate() {
        let mut s = script("# One (8s)\nNarration text.");
        s.estimated_duration_secs = Some(120.0);
        let request = GenerationRequest::build(&s, &VideoConfig::default()).unwrap();
        assert!((request.metadata.estimated_duration - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn build_rejects_scriptless_content() {
        let err = GenerationRequest::build(&script("   "), &VideoConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
