use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::grading::NormalizePolicy;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Items between two checkpoints.
    pub checkpoint_size: usize,
    /// Questions in a regular checkpoint quiz.
    pub quiz_size: usize,
    /// Questions in the final checkpoint quiz.
    pub final_quiz_size: usize,
    /// Items sampled from the whole deck for the final checkpoint.
    pub final_sample_size: usize,
    /// Horizontal drag distance needed to commit a navigation.
    pub drag_commit_threshold: f64,
    /// Goal used until the ledger reports the real one.
    pub daily_goal: u32,
    pub normalize: NormalizePolicy,
    pub celebration: CelebrationTiming,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            checkpoint_size: 20,
            quiz_size: 10,
            final_quiz_size: 25,
            final_sample_size: 25,
            drag_commit_threshold: 80.0,
            daily_goal: 10,
            normalize: NormalizePolicy::default(),
            celebration: CelebrationTiming::default(),
        }
    }
}

impl EngineConfig {
    /// Reads `config.json` from `dir`, falling back to defaults when it is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Clamps values that would make the engine misbehave.
    pub fn sanitized(mut self) -> Self {
        self.checkpoint_size = self.checkpoint_size.max(1);
        self.quiz_size = self.quiz_size.max(1);
        self.final_quiz_size = self.final_quiz_size.max(1);
        self.final_sample_size = self.final_sample_size.max(1);
        self.drag_commit_threshold = self.drag_commit_threshold.abs();
        self
    }
}

/// Delays between the stages of a points celebration, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CelebrationTiming {
    pub pulse_ms: u64,
    pub badge_ms: u64,
    pub glow_ms: u64,
    pub modal_ms: u64,
}

impl Default for CelebrationTiming {
    fn default() -> Self {
        CelebrationTiming {
            pulse_ms: 0,
            badge_ms: 300,
            glow_ms: 600,
            modal_ms: 900,
        }
    }
}

impl CelebrationTiming {
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
    pub fn badge(&self) -> Duration {
        Duration::from_millis(self.badge_ms)
    }
    pub fn glow(&self) -> Duration {
        Duration::from_millis(self.glow_ms)
    }
    pub fn modal(&self) -> Duration {
        Duration::from_millis(self.modal_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"checkpoint_size": 5, "normalize": {"strip_punctuation": true}}"#,
        )
        .unwrap();

        let config = EngineConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.checkpoint_size, 5);
        assert!(config.normalize.strip_punctuation);
        assert_eq!(config.quiz_size, 10);
        assert_eq!(config.drag_commit_threshold, 80.0);
    }

    #[test]
    fn sanitized_clamps_degenerate_values() {
        let config = EngineConfig {
            checkpoint_size: 0,
            drag_commit_threshold: -40.0,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.checkpoint_size, 1);
        assert_eq!(config.drag_commit_threshold, 40.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert!(EngineConfig::load_from_dir(dir.path()).is_err());
    }
}
