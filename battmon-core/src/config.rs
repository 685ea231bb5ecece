use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub auto_refresh: bool,
    /// Pause between background refreshes; 0 runs them back to back.
    pub refresh_interval_ms: u64,
    /// Worker pool size for per-device queries; 0 uses available parallelism.
    pub workers: usize,
    pub query_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub powershell: PowerShellConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerShellConfig {
    pub program: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_interval_ms: 0,
            workers: 0,
            query_timeout_secs: 15,
            stop_timeout_secs: 5,
            powershell: PowerShellConfig::default(),
        }
    }
}

impl Default for PowerShellConfig {
    fn default() -> Self {
        Self {
            program: "powershell".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("invalid configuration in {}", path.display())),
            Err(_) => {
                tracing::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
