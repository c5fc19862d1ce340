use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::computer::{ActionFailurePolicy, ObservationKind};

/// Complete configuration for a harness run.
///
/// Every section falls back to its defaults when missing from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub driver: DriverConfig,
    pub collector: CollectorConfig,
    pub shell: ShellConfig,
    pub sandbox: SandboxConfig,
    /// Observation kinds captured by computer backends. Empty means each
    /// backend's own default.
    pub observe: Vec<ObservationKind>,
    /// What happens when a computer action fails (default: raise).
    pub failure_policy: ActionFailurePolicy,
}

/// Episode loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Step budget per episode (default: 20).
    pub max_steps: usize,
    /// Number of episodes per run (default: 1).
    pub episodes: usize,
    /// Number given to the first episode of a run (default: 0).
    pub start_episode: u64,
}

/// Episode persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Directory receiving `episode_{n}.json` files (default: `collected_data`).
    pub save_dir: PathBuf,
}

/// Local shell backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell program invoked with `-c` (default: `sh`).
    pub program: String,
    /// Timeout for command actions without their own (default: 10).
    pub command_timeout_secs: u64,
}

/// Remote desktop sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Base URL of the sandbox service.
    pub base_url: String,
    /// Bearer token; filled from `SANDBOX_API_KEY` when empty.
    pub api_key: String,
    /// Ask the service to stream the desktop while the session lives.
    pub video_stream: bool,
    /// Per-request HTTP timeout (default: 30).
    pub request_timeout_secs: u64,
    /// Timeout for command actions without their own (default: 10).
    pub command_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            episodes: 1,
            start_episode: 0,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("collected_data"),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "sh".into(),
            command_timeout_secs: 10,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_key: String::new(),
            video_stream: false,
            request_timeout_secs: 30,
            command_timeout_secs: 10,
        }
    }
}

impl HarnessConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Fill secrets from the process environment when the file left them empty.
    pub fn apply_env_overrides(&mut self) {
        if self.sandbox.api_key.is_empty() {
            if let Ok(key) = std::env::var("SANDBOX_API_KEY") {
                self.sandbox.api_key = key;
            }
        }
    }
}
