//! Engine configuration
//!
//! Parsed from TOML or built in code. Names the stages, which catalog units
//! actually run, and how the frame loop is driven.
//!
//! ```toml
//! startup = ["spawn_level"]
//!
//! [[stages]]
//! name = "update"
//! priority = 100
//!
//! [[systems]]
//! name = "movement"
//! stage = "update"
//!
//! [runner]
//! timestep_secs = 0.016
//! max_ticks = 600
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stage names used by [`EngineConfig::default`], in priority order
pub const DEFAULT_STAGES: [&str; 8] = [
    "first",
    "pre_update",
    "update",
    "post_update",
    "pre_render",
    "render",
    "post_render",
    "last",
];

/// A named bucket of per-frame systems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    /// Lower runs first
    pub priority: i32,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// A requested per-frame system and the stage it runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    pub stage: String,
}

/// Frame loop settings for [`FixedStepRunner`](crate::runner::FixedStepRunner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Seconds reported to systems per tick
    pub timestep_secs: f64,

    /// Stop after this many ticks
    pub max_ticks: Option<u64>,

    /// Sleep between ticks to hold real time
    pub paced: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timestep_secs: 1.0 / 60.0,
            max_ticks: None,
            paced: false,
        }
    }
}

/// Hosting configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stages: Vec<StageConfig>,
    pub systems: Vec<SystemConfig>,
    pub startup: Vec<String>,
    pub runner: RunnerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let stages = DEFAULT_STAGES
            .iter()
            .zip((0..).step_by(100))
            .map(|(name, priority)| StageConfig::new(*name, priority))
            .collect();

        Self {
            stages,
            systems: Vec::new(),
            startup: Vec::new(),
            runner: RunnerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with no stages at all
    pub fn empty() -> Self {
        Self {
            stages: Vec::new(),
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, name: impl Into<String>, priority: i32) -> Self {
        self.stages.push(StageConfig::new(name, priority));
        self
    }

    /// Request a per-frame system in `stage`
    pub fn with_system(mut self, name: impl Into<String>, stage: impl Into<String>) -> Self {
        self.systems.push(SystemConfig {
            name: name.into(),
            stage: stage.into(),
        });
        self
    }

    /// Request a startup system
    pub fn with_startup(mut self, name: impl Into<String>) -> Self {
        self.startup.push(name.into());
        self
    }

    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Parse from TOML. Missing tables take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut stages = HashSet::new();
        for stage in &self.stages {
            if !stages.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
        }

        let mut requested = HashSet::new();
        for system in &self.systems {
            if !stages.contains(system.stage.as_str()) {
                return Err(ConfigError::UnknownStage {
                    system: system.name.clone(),
                    stage: system.stage.clone(),
                });
            }
            if !requested.insert(system.name.as_str()) {
                return Err(ConfigError::DuplicateSystem(system.name.clone()));
            }
        }
        for name in &self.startup {
            if !requested.insert(name.as_str()) {
                return Err(ConfigError::DuplicateSystem(name.clone()));
            }
        }

        let step = self.runner.timestep_secs;
        if !step.is_finite() || step < 0.0 {
            return Err(ConfigError::InvalidTimestep(step));
        }
        Ok(())
    }

    /// Stage a requested system runs in, if it was requested
    pub fn stage_of(&self, system: &str) -> Option<&str> {
        self.systems
            .iter()
            .find(|s| s.name == system)
            .map(|s| s.stage.as_str())
    }

    pub fn requests_startup(&self, name: &str) -> bool {
        self.startup.iter().any(|s| s == name)
    }
}
