//! Provider selection scoring.
//!
//! Pure functions: the orchestrator gathers health, capabilities, and cost
//! estimates, and this module turns them into a comparable score. Higher
//! wins; only scores above zero are eligible.

use reelsmith_core::script::{Script, VideoConfig};

use crate::adapter::Capabilities;
use crate::job::ProviderKind;

// ---------------------------------------------------------------------------
// Score weights
// ---------------------------------------------------------------------------

/// Awarded when the script's duration fits the provider's maximum.
pub const DURATION_FIT_BONUS: f64 = 30.0;
/// Deducted when the script is longer than the provider can render.
pub const DURATION_MISS_PENALTY: f64 = 20.0;

/// Awarded for a satisfied 4k quality request.
pub const QUALITY_4K_BONUS: f64 = 20.0;
/// Awarded for a 1080p quality request (every registered provider renders it).
pub const QUALITY_1080P_BONUS: f64 = 15.0;

/// Template affinity for educational and presentation styles.
pub const STYLE_TEMPLATE_BONUS: f64 = 25.0;
/// Motion-generation affinity (runway, luma) for documentary style.
pub const STYLE_MOTION_BONUS: f64 = 20.0;

/// Ceiling of the cheapness bonus: `max(0, 15 - cost x 10)`.
pub const COST_BONUS_CEILING: f64 = 15.0;
/// Dollars-to-points slope of the cheapness bonus.
pub const COST_WEIGHT: f64 = 10.0;
/// Flat penalty when the estimate exceeds the budget.
pub const OVER_BUDGET_PENALTY: f64 = 30.0;
/// Assumed-moderate-cost bonus when estimation failed.
pub const COST_UNKNOWN_BONUS: f64 = 5.0;

/// Fixed reliability bonus for the local template renderer.
pub const RELIABILITY_TEMPLATE_BONUS: f64 = 10.0;
/// Fixed reliability bonus for premium motion generation.
pub const RELIABILITY_RUNWAY_BONUS: f64 = 15.0;

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// What the caller needs from a provider, extracted once per selection.
#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    /// Estimated video duration in seconds.
    pub duration_secs: f64,
    pub quality: String,
    pub style: String,
    /// Budget ceiling in USD; unlimited when the config carries none.
    pub budget: f64,
}

impl SelectionCriteria {
    /// Duration assumed for scripts without an estimate: a short clip.
    pub const DEFAULT_DURATION_SECS: f64 = 5.0;

    pub fn from_request(script: &Script, config: &VideoConfig) -> Self {
        Self {
            duration_secs: script
                .estimated_duration_secs
                .unwrap_or(Self::DEFAULT_DURATION_SECS),
            quality: config.quality.clone(),
            style: config.style.clone(),
            budget: config.max_cost.unwrap_or(f64::INFINITY),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score one provider against the criteria.
///
/// `estimated_cost` is `None` when cost estimation failed; the provider is
/// then assumed to be moderately priced rather than excluded.
/// The result is clamped at zero; a zero score makes the provider
/// ineligible.
pub fn score_provider(
    kind: ProviderKind,
    capabilities: &Capabilities,
    estimated_cost: Option<f64>,
    criteria: &SelectionCriteria,
) -> f64 {
    let mut score = 0.0;

    // Duration compatibility dominates: a provider that cannot hold the
    // script at all swings by 50 points against one that can.
    if criteria.duration_secs <= capabilities.max_duration_secs {
        score += DURATION_FIT_BONUS;
    } else {
        score -= DURATION_MISS_PENALTY;
    }

    // Quality preference.
    if criteria.quality == "4k" && capabilities.supports_quality("4k") {
        score += QUALITY_4K_BONUS;
    } else if criteria.quality == "1080p" {
        score += QUALITY_1080P_BONUS;
    }

    // Style affinity.
    match kind {
        ProviderKind::Template
            if matches!(criteria.style.as_str(), "educational" | "presentation") =>
        {
            score += STYLE_TEMPLATE_BONUS;
        }
        ProviderKind::Runway | ProviderKind::Luma if criteria.style == "documentary" => {
            score += STYLE_MOTION_BONUS;
        }
        _ => {}
    }

    // Cost: cheaper is better within budget, over budget is heavily
    // penalized, unknown is assumed moderate.
    match estimated_cost {
        Some(cost) if cost <= criteria.budget => {
            score += (COST_BONUS_CEILING - cost * COST_WEIGHT).max(0.0);
        }
        Some(_) => score -= OVER_BUDGET_PENALTY,
        None => score += COST_UNKNOWN_BONUS,
    }

    // Fixed reliability bonuses.
    match kind {
        ProviderKind::Template => score += RELIABILITY_TEMPLATE_BONUS,
        ProviderKind::Runway => score += RELIABILITY_RUNWAY_BONUS,
        _ => {}
    }

    score.max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
