//! Pacing and behavior knobs for the producer recipes.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for recipe pacing and shared-state behavior.
///
/// Every delay is tunable so tests can run the recipes at full speed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    /// Delay between streamed text/argument chunks, in milliseconds.
    pub chunk_delay_ms: u64,
    /// Delay between generative-UI step completions, in milliseconds.
    pub step_delay_ms: u64,
    /// Pause before a recipe's tool-call phase, in milliseconds.
    pub tool_pause_ms: u64,
    /// Simulated processing delay for predictive runs, in milliseconds.
    pub processing_delay_ms: u64,
    /// Interval between shared-state keepalive frames, in seconds.
    pub keepalive_secs: u64,
    /// Fraction of predictive runs whose prediction is confirmed.
    pub predictive_correct_ratio: f64,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: 30,
            step_delay_ms: 250,
            tool_pause_ms: 500,
            processing_delay_ms: 800,
            keepalive_secs: 15,
            predictive_correct_ratio: 0.7,
        }
    }
}

impl RecipeConfig {
    /// A configuration with all delays removed, for tests.
    pub fn instant() -> Self {
        Self {
            chunk_delay_ms: 0,
            step_delay_ms: 0,
            tool_pause_ms: 0,
            processing_delay_ms: 0,
            keepalive_secs: 15,
            predictive_correct_ratio: 0.7,
        }
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn tool_pause(&self) -> Duration {
        Duration::from_millis(self.tool_pause_ms)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }
}
