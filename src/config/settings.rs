use crate::config::types::{Result, TestboxError};
/// Runner settings loaded from testbox.json
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SETTINGS_FILE: &str = "testbox.json";

/// Tunables shared by the checking and packaging sessions.
///
/// Every field is optional in the file; missing ones fall back to
/// [`RunnerSettings::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Wall-clock limit per candidate run; `None` waits forever
    pub time_limit_secs: Option<f64>,
    pub threads: usize,
    pub poll_interval_ms: u64,
    pub chunk_size: usize,
    /// Pause between SIGTERM and SIGKILL on deadline
    pub kill_grace_ms: u64,
    /// File extension -> interpreter command prefix
    pub interpreters: HashMap<String, Vec<String>>,
    /// Command prefix the candidate program runs under
    pub wrapper: Vec<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        let mut interpreters = HashMap::new();
        interpreters.insert("py".to_string(), vec!["python3".to_string()]);

        Self {
            time_limit_secs: Some(10.0),
            threads: 1,
            poll_interval_ms: 1,
            chunk_size: 1024,
            kill_grace_ms: 100,
            interpreters,
            wrapper: Vec::new(),
        }
    }
}

impl RunnerSettings {
    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TestboxError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: RunnerSettings = serde_json::from_str(&content)
            .map_err(|e| TestboxError::Config(format!("Failed to parse settings JSON: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load `explicit` if given, else ./testbox.json when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let default_path = std::env::current_dir()
            .map_err(|e| TestboxError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_SETTINGS_FILE);

        if default_path.is_file() {
            log::info!("Loading settings from {}", default_path.display());
            Self::load_from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(TestboxError::Config(
                "threads must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(TestboxError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if let Some(limit) = self.time_limit_secs {
            if limit.is_nan() || limit <= 0.0 {
                return Err(TestboxError::Config(format!(
                    "time limit must be a positive number of seconds, got {}",
                    limit
                )));
            }
            if limit.is_finite() {
                Duration::try_from_secs_f64(limit).map_err(|e| {
                    TestboxError::Config(format!("time limit {} is out of range: {}", limit, e))
                })?;
            }
        }
        Ok(())
    }

    /// Per-run limit; an infinite limit means none.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .filter(|secs| secs.is_finite())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
