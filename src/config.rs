//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILHOOK_CONFIG` (environment variable)
//! 2. `~/.config/mailhook/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailhook\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Attachment export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Attachment export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory.
    pub default_output_dir: Option<PathBuf>,
    /// Content types to save (`"application/pdf"`, `"image/*"`). Empty saves everything.
    pub allowed_types: Vec<String>,
    /// Rewrite declared names into safe file names and never overwrite.
    pub sanitize_names: bool,
    /// Put each message's parts in its own subfolder when extracting several messages.
    pub folder_per_message: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            allowed_types: Vec::new(),
            sanitize_names: true,
            folder_per_message: true,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILHOOK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailhook").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailhook")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailhook.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.export.allowed_types.is_empty());
        assert!(cfg.export.sanitize_names);
        assert!(cfg.export.folder_per_message);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.export.allowed_types = vec!["image/*".to_string()];
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.export.allowed_types, cfg.export.allowed_types);
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[export]
allowed_types = ["application/pdf"]
sanitize_names = false
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.export.allowed_types, ["application/pdf"]);
        assert!(!cfg.export.sanitize_names);
        // Other fields use defaults
        assert!(cfg.export.folder_per_message);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_log_file_path_uses_cache_dir_override() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mailhook-cache"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/mailhook-cache/mailhook.log")
        );
    }
}
