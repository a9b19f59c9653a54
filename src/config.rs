use crate::device;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Configuration for the diagnostics sink
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Ring buffer capacity for the in-memory request log
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// JSONL event file; defaults to diagnostics.jsonl under the state dir
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    crate::diagnostics::DEFAULT_BUFFER_SIZE
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: default_buffer_size(),
            log_file: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Portal URL or bare hostname (normalized at login time)
    #[serde(default)]
    pub portal: Option<String>,
    /// STB MAC address used as the login credential
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Where the session blob and caches live; default ~/.portalctl/state
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: None,
            mac: None,
            language: default_language(),
            timezone: default_timezone(),
            timeout_ms: default_timeout_ms(),
            state_dir: None,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default paths
    /// Priority: project (.portalctl/config.toml) > user (~/.portalctl/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".portalctl").join("config.toml");
            if user_config.exists() {
                let user = Self::load_from(&user_config)?;
                config.merge(user);
            }
        }

        let project_config = Path::new(".portalctl").join("config.toml");
        if project_config.exists() {
            let project = Self::load_from(&project_config)?;
            config.merge(project);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority).
    /// Optional fields override only when set; scalar fields take the
    /// other's values wholesale.
    pub fn merge(&mut self, other: Config) {
        if other.portal.is_some() {
            self.portal = other.portal;
        }
        if other.mac.is_some() {
            self.mac = other.mac;
        }
        if other.state_dir.is_some() {
            self.state_dir = other.state_dir;
        }
        self.language = other.language;
        self.timezone = other.timezone;
        self.timeout_ms = other.timeout_ms;
        self.diagnostics = other.diagnostics;
    }

    /// Resolve the state directory, defaulting under the home directory.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".portalctl")
            .join("state")
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(mac) = &self.mac {
            if !device::is_valid_mac(mac) {
                errors.push(ValidationError {
                    field: "mac".to_string(),
                    message: format!(
                        "Invalid MAC '{}', expected colon-hex like AA:BB:CC:DD:EE:FF",
                        mac
                    ),
                });
            }
        }

        if let Some(portal) = &self.portal {
            if portal.trim().is_empty() {
                errors.push(ValidationError {
                    field: "portal".to_string(),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        if self.timeout_ms == 0 {
            errors.push(ValidationError {
                field: "timeout_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.diagnostics.buffer_size == 0 {
            errors.push(ValidationError {
                field: "diagnostics.buffer_size".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.diagnostics.enabled);
        assert!(config.portal.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_mac() {
        let config = Config {
            mac: Some("not-a-mac".to_string()),
            ..Config::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].field.contains("mac"));
        assert!(errors[0].message.contains("Invalid MAC"));
    }

    #[test]
    fn test_validate_zero_buffer() {
        let mut config = Config::default();
        config.diagnostics.buffer_size = 0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].field.contains("buffer_size"));
    }

    #[test]
    fn test_merge_overrides_options_only_when_set() {
        let mut base = Config {
            portal: Some("glotv.me".to_string()),
            mac: Some("AA:7A:10:57:C1:00".to_string()),
            ..Config::default()
        };
        let other = Config {
            portal: Some("other.tv".to_string()),
            ..Config::default()
        };
        base.merge(other);
        assert_eq!(base.portal.as_deref(), Some("other.tv"));
        assert_eq!(base.mac.as_deref(), Some("AA:7A:10:57:C1:00"));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
portal = "glotv.me"
mac = "AA:7A:10:57:C1:00"
timeout_ms = 5000

[diagnostics]
buffer_size = 50
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.portal.as_deref(), Some("glotv.me"));
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.diagnostics.buffer_size, 50);
        assert!(config.diagnostics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_state_dir_override() {
        let config = Config {
            state_dir: Some(PathBuf::from("/tmp/portal-state")),
            ..Config::default()
        };
        assert_eq!(config.state_dir(), PathBuf::from("/tmp/portal-state"));
    }
}
