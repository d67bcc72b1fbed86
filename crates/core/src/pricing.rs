//! Model selection and per-exchange cost accounting.
//!
//! The tutor offers two model tiers. Both the human-facing label ("GPT-3.5")
//! and the provider's raw identifier ("gpt-3.5-turbo") resolve to the same
//! [`ModelTier`], so costs recomputed from stored usage records always land
//! in the same pricing branch as the cost computed at call time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::syllabus::UsageInfo;

/// The two selectable model tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Single blended per-token rate.
    #[default]
    Economy,
    /// Separate prompt and completion rates.
    Premium,
}

impl ModelTier {
    pub const ALL: [ModelTier; 2] = [ModelTier::Economy, ModelTier::Premium];

    /// Resolves either the display label or the provider model identifier.
    ///
    /// Matching is case-insensitive. Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gpt-3.5" | "gpt-3.5-turbo" => Some(Self::Economy),
            "gpt-4" => Some(Self::Premium),
            _ => None,
        }
    }

    /// The label shown to the learner.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Economy => "GPT-3.5",
            Self::Premium => "GPT-4",
        }
    }

    /// The identifier sent to the provider.
    #[must_use]
    pub const fn provider_model(&self) -> &'static str {
        match self {
            Self::Economy => "gpt-3.5-turbo",
            Self::Premium => "gpt-4",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a string names neither tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown model '{0}' (expected one of: GPT-3.5, gpt-3.5-turbo, GPT-4, gpt-4)")]
pub struct UnknownModel(pub String);

impl FromStr for ModelTier {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownModel(s.to_string()))
    }
}

impl Serialize for ModelTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ModelTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Token counts reported by the provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Per-1000-token rates for both tiers, in US dollars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingTable {
    pub economy_per_1k: f64,
    pub premium_prompt_per_1k: f64,
    pub premium_completion_per_1k: f64,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            economy_per_1k: 0.002,
            premium_prompt_per_1k: 0.03,
            premium_completion_per_1k: 0.06,
        }
    }
}

impl PricingTable {
    /// Cost of one exchange for a model given as label or provider identifier.
    ///
    /// Anything that does not resolve to the economy tier is priced as premium.
    /// The result is not rounded.
    pub fn cost(
        &self,
        model: &str,
        total_tokens: u32,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> f64 {
        let tier = ModelTier::parse(model).unwrap_or(ModelTier::Premium);
        self.cost_for(
            tier,
            TokenUsage {
                total_tokens,
                prompt_tokens,
                completion_tokens,
            },
        )
    }

    pub fn cost_for(&self, tier: ModelTier, usage: TokenUsage) -> f64 {
        match tier {
            ModelTier::Economy => f64::from(usage.total_tokens) * self.economy_per_1k / 1000.0,
            ModelTier::Premium => {
                (f64::from(usage.prompt_tokens) * self.premium_prompt_per_1k
                    + f64::from(usage.completion_tokens) * self.premium_completion_per_1k)
                    / 1000.0
            }
        }
    }

    /// Cost of a stored usage record.
    pub fn cost_of(&self, info: &UsageInfo) -> f64 {
        self.cost(
            &info.model,
            info.total_tokens,
            info.prompt_tokens,
            info.completion_tokens,
        )
    }
}
