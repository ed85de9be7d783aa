//! Scene segmentation: script markup text → ordered scene records.
//!
//! The parser is deterministic and side-effect-free; every provider adapter
//! re-invokes it against the same script and must see the same scene list.
//!
//! Script markup, by example:
//!
//! ```text
//! # Introduction (12s)
//! [Wide shot of a data center]
//! [CALLOUT: 40% faster]
//! **Narration**
//! Modern pipelines move data continuously.
//! ---
//! # Next scene
//! ...
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal token separating scene blocks in script text.
pub const SCENE_SEPARATOR: &str = "---";

/// Narration reading speed used for duration estimates.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// Floor for estimated scene durations in seconds.
pub const MIN_SCENE_DURATION_SECS: f64 = 5.0;

/// Marker prefix identifying a callout inside a bracketed line.
const CALLOUT_TAG: &str = "CALLOUT:";

/// Matches an explicit `(Ns)` duration suffix in a scene heading.
fn duration_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+\.?\d*)s\)").expect("valid duration regex"))
}

/// One structured unit of a script: the unit of work sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_number: u32,
    pub title: String,
    pub visual_description: String,
    pub narration: String,
    pub callouts: Vec<String>,
    /// Seconds; explicit from the heading or estimated from narration length.
    #[serde(rename = "duration_estimate")]
    pub duration_estimate_secs: f64,
}

/// Split script content on the scene separator and parse each block.
///
/// Blocks with neither a title nor narration are discarded. Scene numbers
/// count every non-blank block, so a discarded block still advances the
/// numbering of the scenes around it.
pub fn parse_scenes(content: &str) -> Vec<Scene> {
    content
        .split(SCENE_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .enumerate()
        .filter_map(|(i, block)| parse_single_scene(block, (i + 1) as u32))
        .collect()
}

/// Total estimated duration of a scene list in seconds.
pub fn total_duration_secs(scenes: &[Scene]) -> f64 {
    scenes.iter().map(|s| s.duration_estimate_secs).sum()
}

/// Parse one scene block.
///
/// Line classification:
/// - `#` heading → title, with an optional explicit `(Ns)` duration suffix
///   stripped from the title text;
/// - `[...]` → callout when tagged `CALLOUT:`, otherwise a visual
///   description line;
/// - `**...**` → opens the narration section when the bolded text mentions
///   narration, closes it otherwise;
/// - anything else → narration while the narration section is open, or when
///   no section is open and no visual description has accumulated yet.
fn parse_single_scene(block: &str, scene_number: u32) -> Option<Scene> {
    let mut title = String::new();
    let mut visual_description = String::new();
    let mut narration = String::new();
    let mut callouts = Vec::new();
    let mut explicit_duration: Option<f64> = None;
    let mut in_narration = false;
    let mut saw_narration_marker = false;

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            if let Some(caps) = duration_suffix().captures(heading) {
                explicit_duration = caps[1].parse().ok();
                title = duration_suffix().replace(heading, "").trim().to_string();
            } else {
                title = heading.to_string();
            }
        } else if line.starts_with('[') && line.ends_with(']') {
            let inner = &line[1..line.len() - 1];
            if let Some(callout) = inner.strip_prefix(CALLOUT_TAG) {
                callouts.push(callout.trim().to_string());
            } else {
                visual_description.push_str(line);
                visual_description.push('\n');
            }
        } else if line.starts_with("**") && line.ends_with("**") && line.len() >= 4 {
            let section = line.trim_matches('*').to_lowercase();
            in_narration = section.contains("narration");
            saw_narration_marker |= in_narration;
        } else if in_narration || (!saw_narration_marker && visual_description.is_empty()) {
            // Unclassified prose falls back to narration only while no
            // narration marker has appeared and no visuals have accumulated.
            narration.push_str(line);
            narration.push(' ');
        }
    }

    let visual_description = visual_description.trim().to_string();
    let narration = narration.trim().to_string();

    if title.is_empty() && narration.is_empty() {
        return None;
    }

    let duration_estimate_secs = explicit_duration.unwrap_or_else(|| {
        let word_count = narration.split_whitespace().count() as f64;
        (word_count / WORDS_PER_MINUTE * 60.0).max(MIN_SCENE_DURATION_SECS)
    });

    Some(Scene {
        scene_number,
        title,
        visual_description,
        narration,
        callouts,
        duration_estimate_secs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SCENES: &str = "\
# Opening (12s)
[Aerial view of a river delta]
[CALLOUT: 3 million years old]
**Narration**
Water carved this landscape over millions of years.
---
# The Settlement
[Stone ruins at dawn]
**Narration**
People arrived much later.
";

    // -- Splitting and numbering ----------------------------------------------

    #[test]
    fn two_scenes_parse_with_explicit_duration() {
        let scenes = parse_scenes(TWO_SCENES);
        assert_eq!(scenes.len(), 2);

        let first = &scenes[0];
        assert_eq!(first.scene_number, 1);
        assert_eq!(first.title, "Opening");
        assert!((first.duration_estimate_secs - 12.0).abs() < f64::EPSILON);
        assert_eq!(first.callouts, vec!["3 million years old".to_string()]);
        assert_eq!(
            first.visual_description,
            "[Aerial view of a river delta]"
        );
        assert_eq!(
            first.narration,
            "Water carved this landscape over millions of years."
        );

        let second = &scenes[1];
        assert_eq!(second.scene_number, 2);
        assert_eq!(second.title, "The Settlement");
    }

    #[test]
    fn parser_is_deterministic() {
        assert_eq!(parse_scenes(TWO_SCENES), parse_scenes(TWO_SCENES));
    }

    #[test]
    fn empty_blocks_are_skipped() {
        let scenes = parse_scenes("---\n\n---\n# Only scene\nSome narration.\n---");
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].title, "Only scene");
    }

    #[test]
    fn block_without_title_or_narration_discarded() {
        let scenes = parse_scenes("[Just a visual]\n---\n# Real scene\nWords here.");
        assert_eq!(scenes.len(), 1);
        // The discarded block still occupied scene number 1.
        assert_eq!(scenes[0].scene_number, 2);
    }

    // -- Duration estimation --------------------------------------------------

    #[test]
    fn duration_estimated_from_narration_words() {
        // 150 words at 150 wpm is exactly 60 seconds.
        let narration = (0..150).map(|_| "word").collect::<Vec<_>>().join(" ");
        let scenes = parse_scenes(&format!("# Long scene\n**Narration**\n{narration}"));
        assert!((scenes[0].duration_estimate_secs - 60.0).abs() < 1e-9);
    }

    #[test]
    fn duration_floored_at_five_seconds() {
        let scenes = parse_scenes("# Short\n**Narration**\nBrief.");
        assert!((scenes[0].duration_estimate_secs - MIN_SCENE_DURATION_SECS).abs() < f64::EPSILON);
    }

    #[test]
    fn fractional_duration_suffix_accepted() {
        let scenes = parse_scenes("# Timed (7.5s)\nNarration text.");
        assert!((scenes[0].duration_estimate_secs - 7.5).abs() < f64::EPSILON);
        assert_eq!(scenes[0].title, "Timed");
    }

    // -- Line classification --------------------------------------------------

    #[test]
    fn prose_without_narration_marker_becomes_narration() {
        let scenes = parse_scenes("# Implicit\nThis prose has no section marker.");
        assert_eq!(scenes[0].narration, "This prose has no section marker.");
    }

    #[test]
    fn prose_after_visuals_without_marker_is_dropped() {
        // Once a visual description exists, unclassified prose is ambiguous
        // and ignored rather than guessed at.
        let scenes = parse_scenes("# Mixed\n[A visual]\nUnmarked prose line.");
        assert_eq!(scenes[0].narration, "");
        assert_eq!(scenes[0].visual_description, "[A visual]");
    }

    #[test]
    fn other_bold_sections_close_narration() {
        let scenes = parse_scenes(
            "# Sections\n**Narration**\nSpoken words.\n**Notes**\nProduction note, not spoken.",
        );
        assert_eq!(scenes[0].narration, "Spoken words.");
    }

    #[test]
    fn multiple_callouts_collected_in_order() {
        let scenes =
            parse_scenes("# Facts\n[CALLOUT: first]\n[CALLOUT: second]\n**Narration**\nText.");
        assert_eq!(
            scenes[0].callouts,
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn total_duration_sums_scenes() {
        let scenes = parse_scenes(TWO_SCENES);
        let total = total_duration_secs(&scenes);
        assert!((total - (12.0 + 5.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn serde_uses_wire_field_name_for_duration() {
        let scenes = parse_scenes("# Wire (6s)\nNarration.");
        let value = serde_json::to_value(&scenes[0]).unwrap();
        assert!(value.get("duration_estimate").is_some());
        assert!(value.get("duration_estimate_secs").is_none());
    }
}
