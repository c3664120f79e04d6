use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

pub const DEFAULT_PORT: u16 = 20202;
pub const DEFAULT_BIN_PATH: &str = "phantomjs";
/// Environment variable the dispatcher reads its port from.
pub const PORT_ENV: &str = "PORT";

/// How the engine subprocess is launched and probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Engine executable. Bare names are resolved through `PATH`.
    #[serde(default = "default_bin_path")]
    pub bin_path: String,
    /// HTTP port the dispatcher listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra environment passed to the engine on top of the inherited one.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Optional client-side bound on each RPC. Unset means wait forever.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_bin_path() -> String {
    DEFAULT_BIN_PATH.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_probe_interval_ms() -> u64 {
    1000
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            bin_path: default_bin_path(),
            port: default_port(),
            env: HashMap::new(),
            probe_interval_ms: default_probe_interval_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            request_timeout_ms: None,
        }
    }
}

impl ProcessConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bin_path.trim().is_empty() {
            return Err(Error::Config("process.binPath must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("process.port must be non-zero".to_string()));
        }
        if self.probe_interval_ms == 0 {
            return Err(Error::Config("process.probeIntervalMs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for the built-in engine's page loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_user_agent() -> String {
    format!("phantom/{}", env!("CARGO_PKG_VERSION"))
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.process.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        Self::load_or_default_at(&paths.config_file())
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.process.port, 20202);
        assert_eq!(config.process.bin_path, "phantomjs");
        assert_eq!(config.process.probe_interval(), Duration::from_secs(1));
        assert_eq!(config.process.ready_timeout(), Duration::from_secs(30));
        assert!(config.process.request_timeout().is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"process":{"port":31337,"readyTimeoutMs":500}}"#).unwrap();
        assert_eq!(config.process.port, 31337);
        assert_eq!(config.process.ready_timeout_ms, 500);
        assert_eq!(config.process.bin_path, "phantomjs");
        assert_eq!(config.engine.max_redirects, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().join("nested"));

        let mut config = Config::default();
        config.process.port = 40404;
        config.process.env.insert("QT_QPA_PLATFORM".to_string(), "offscreen".to_string());
        config.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert_eq!(loaded.process.port, 40404);
        assert_eq!(
            loaded.process.env.get("QT_QPA_PLATFORM").map(String::as_str),
            Some("offscreen")
        );
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let config = Config::load_or_default(&paths).unwrap();
        assert_eq!(config.process.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_or_default_at_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        assert_eq!(Config::load_or_default_at(&path).unwrap().process.port, DEFAULT_PORT);

        std::fs::write(&path, r#"{"process":{"port":1234}}"#).unwrap();
        assert_eq!(Config::load_or_default_at(&path).unwrap().process.port, 1234);
    }

    #[test]
    fn test_load_rejects_invalid_process_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"process":{"port":0}}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
