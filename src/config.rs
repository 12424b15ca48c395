//! Configuration management for dossier
//!
//! Stores settings in ~/.config/dossier/config.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::generator::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key for the answer-generation service. The environment variables
    /// DOSSIER_API_KEY and OPENROUTER_API_KEY take precedence over this.
    pub api_key: Option<String>,
    /// Model id sent to the generation service
    #[serde(default = "default_model")]
    pub model: String,
    /// Execution attempts before the correction loop gives up
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Improvement iterations per report (1-5)
    #[serde(default = "default_improvements")]
    pub improvements: u32,
    /// Pause between a failed execution and the corrected retry, in seconds
    #[serde(default = "default_correction_delay")]
    pub correction_delay_secs: u64,
    /// Pause before improvement requests beyond the first, in seconds
    #[serde(default = "default_improve_delay")]
    pub improve_delay_secs: u64,
    /// Where the evolving script and session artifacts live
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

fn default_model() -> String {
    Model::Flash.id().to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_improvements() -> u32 {
    3
}

fn default_correction_delay() -> u64 {
    5
}

fn default_improve_delay() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            retries: default_retries(),
            improvements: default_improvements(),
            correction_delay_secs: default_correction_delay(),
            improve_delay_secs: default_improve_delay(),
            workdir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dossier"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        log::warn!(
                            "config file was corrupted ({}); a backup was saved and defaults were loaded",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        fs::create_dir_all(&dir)?;

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(&path, &content)?;
        Ok(())
    }

    /// Resolve the API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("DOSSIER_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone()
    }

    /// Directory holding the evolving script and per-session artifacts.
    pub fn resolve_workdir(&self) -> PathBuf {
        if let Some(dir) = &self.workdir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|p| p.join("dossier"))
            .unwrap_or_else(|| std::env::temp_dir().join("dossier"))
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/dossier/config.json".to_string())
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

/// Write via temp file + rename so a concurrent reader never sees a
/// half-written file.
pub(crate) fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.retries, 3);
        assert_eq!(config.improvements, 3);
        assert_eq!(config.correction_delay_secs, 5);
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: Config = serde_json::from_str("{\"api_key\": null}").unwrap();
        assert_eq!(config.model, Model::Flash.id());
        assert_eq!(config.improve_delay_secs, 5);
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_extension("tmp").exists());
    }
}
