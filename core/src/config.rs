use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::{Result, TrellisError};

/// Runtime configuration of the engine
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Text shown in place of artifacts whose data filtered to nothing
    pub placeholder_text: String,
    /// Upper bound on dispatches running at once
    pub max_concurrent_dispatches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: std::env::var("TRELLIS_LOG")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "info".to_string()),
            placeholder_text: std::env::var("TRELLIS_PLACEHOLDER")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "No data to display".to_string()),
            max_concurrent_dispatches: std::env::var("TRELLIS_MAX_DISPATCHES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(16),
        }
    }
}

/// Optional TOML overlay; absent keys keep the defaults
#[derive(Debug, Default, Deserialize)]
struct EngineToml {
    log_filter: Option<String>,
    placeholder_text: Option<String>,
    max_concurrent_dispatches: Option<usize>,
}

impl EngineToml {
    fn overlay(self, mut base: EngineConfig) -> EngineConfig {
        if let Some(v) = self.log_filter {
            base.log_filter = v;
        }
        if let Some(v) = self.placeholder_text {
            base.placeholder_text = v;
        }
        if let Some(v) = self.max_concurrent_dispatches.filter(|n| *n > 0) {
            base.max_concurrent_dispatches = v;
        }
        base
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file (path via TRELLIS_CONFIG or ./trellis.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("TRELLIS_CONFIG").unwrap_or_else(|_| "trellis.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(
                target: "config",
                path = %path,
                "No TOML config found; using defaults/env"
            );
            return default;
        }
        match Self::from_path(p) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to load TOML; using defaults");
                default
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let parsed: EngineToml =
            toml::from_str(raw).map_err(|e| TrellisError::Config(e.to_string()))?;
        Ok(parsed.overlay(Self::default()))
    }
}
