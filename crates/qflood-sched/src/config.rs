//! Solver configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QFLOOD_ prefix)
//!
//! Environment variables override the file, which overrides defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use qflood_linalg::{ClassicalConfig, PrepareConfig, SubmatrixStrategy};
use qflood_sim::QuantumConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SchedError, SchedResult};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Configuration for every solver component and the job manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub prepare: PrepareConfig,

    #[serde(default)]
    pub classical: ClassicalConfig,

    #[serde(default)]
    pub quantum: QuantumConfig,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Where artifacts are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBackend {
    #[default]
    Memory,
    Filesystem,
}

impl FromStr for ArtifactBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(ArtifactBackend::Memory),
            "filesystem" | "fs" | "file" => Ok(ArtifactBackend::Filesystem),
            other => Err(format!("unknown artifact backend: {other}")),
        }
    }
}

/// Artifact sink settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub backend: ArtifactBackend,

    /// Root directory for the filesystem backend.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Job manager settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// How often `wait` polls a job's status.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ManagerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SolverConfig {
    /// Parse a YAML document. Missing sections fall back to defaults.
    pub fn from_yaml_str(contents: &str) -> SchedResult<Self> {
        Ok(serde_yaml_ng::from_str(contents)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SchedError::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Load with precedence environment > file > defaults, then validate.
    pub fn load(config_file: Option<&Path>) -> SchedResult<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `QFLOOD_*` environment variables.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source. Unparseable values are
    /// logged and ignored.
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
            let raw = lookup(name)?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(variable = name, value = %raw, "ignoring unparseable override");
                    None
                }
            }
        }

        // Preparation
        if let Some(v) = parsed(&lookup, "QFLOOD_SUBSYSTEM_DIM") {
            self.prepare.subsystem_dim = v;
        }
        if let Some(v) = parsed::<SubmatrixStrategy>(&lookup, "QFLOOD_STRATEGY") {
            self.prepare.strategy = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_HERMITIAN_TOLERANCE") {
            self.prepare.hermitian_tolerance = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_CONDITION_THRESHOLD") {
            self.prepare.condition_threshold = v;
        }

        // Classical
        if let Some(v) = parsed(&lookup, "QFLOOD_RESIDUAL_TOLERANCE") {
            self.classical.residual_tolerance = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_FILL_ORDERING") {
            self.classical.fill_ordering = v;
        }

        // Quantum
        if let Some(v) = parsed(&lookup, "QFLOOD_EVAL_QUBITS") {
            self.quantum.eval_qubits = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_SHOTS") {
            self.quantum.shots = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_MIN_SUCCESS_RATE") {
            self.quantum.min_success_rate = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_EIGENVALUE_CLAMP") {
            self.quantum.eigenvalue_clamp = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_INVERSION_SCALE") {
            self.quantum.inversion_scale = v;
        }
        if let Some(v) = parsed(&lookup, "QFLOOD_MAX_QUBITS") {
            self.quantum.max_qubits = v;
        }

        // Artifacts
        if let Some(v) = parsed(&lookup, "QFLOOD_ARTIFACT_BACKEND") {
            self.artifacts.backend = v;
        }
        if let Some(dir) = lookup("QFLOOD_ARTIFACT_DIR") {
            self.artifacts.root = Some(PathBuf::from(dir));
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> SchedResult<()> {
        self.prepare
            .validate()
            .map_err(|e| SchedError::Config(format!("prepare: {e}")))?;
        self.classical
            .validate()
            .map_err(|e| SchedError::Config(format!("classical: {e}")))?;
        self.quantum
            .validate()
            .map_err(|e| SchedError::Config(format!("quantum: {e}")))?;

        if self.artifacts.backend == ArtifactBackend::Filesystem && self.artifacts.root.is_none() {
            return Err(SchedError::Config(
                "artifacts: filesystem backend needs a root directory".into(),
            ));
        }
        if self.manager.poll_interval_ms == 0 {
            return Err(SchedError::Config(
                "manager: poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
