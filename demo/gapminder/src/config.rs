use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use trellis_core::EngineConfig;

/// Configuration of the Gapminder demo
#[derive(Clone, Debug)]
pub struct GapminderConfig {
    pub engine: EngineConfig,
    /// CSV to load instead of the bundled sample
    pub data_path: Option<PathBuf>,
    /// JSON-lines file of UI events to replay instead of the built-in script
    pub script_path: Option<PathBuf>,
    /// Pretty-print full payloads instead of one summary line per output
    pub verbose: bool,
}

impl Default for GapminderConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            data_path: std::env::var("GAPMINDER_DATA")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            script_path: std::env::var("GAPMINDER_SCRIPT")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            verbose: std::env::var("GAPMINDER_VERBOSE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GapminderToml {
    data_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    verbose: Option<bool>,
    placeholder_text: Option<String>,
    max_concurrent_dispatches: Option<usize>,
}

impl GapminderToml {
    fn overlay(self, mut base: GapminderConfig) -> GapminderConfig {
        if let Some(v) = self.data_path {
            base.data_path = Some(v);
        }
        if let Some(v) = self.script_path {
            base.script_path = Some(v);
        }
        if let Some(v) = self.verbose {
            base.verbose = v;
        }
        if let Some(v) = self.placeholder_text {
            base.engine.placeholder_text = v;
        }
        if let Some(v) = self.max_concurrent_dispatches.filter(|n| *n > 0) {
            base.engine.max_concurrent_dispatches = v;
        }
        base
    }
}

impl GapminderConfig {
    /// Defaults + env, overlaid by an optional TOML file (path via
    /// GAPMINDER_CONFIG or ./gapminder.toml)
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("GAPMINDER_CONFIG").unwrap_or_else(|_| "gapminder.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(
                target: "gapminder",
                path = %path,
                "No TOML config found; using defaults/env"
            );
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<GapminderToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(
                        target: "gapminder",
                        error = %e,
                        "Failed to parse TOML; using defaults"
                    );
                    default
                }
            },
            Err(e) => {
                tracing::warn!(
                    target: "gapminder",
                    error = %e,
                    "Failed to read TOML; using defaults"
                );
                default
            }
        }
    }
}
