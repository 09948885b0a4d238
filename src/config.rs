/// Defaults file for subst
///
/// Read from `--config PATH` or ~/.subst/config.toml. The file is optional and
/// never created by subst; command-line options override anything set here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::encoding;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupSection,

    #[serde(default)]
    pub encoding: EncodingSection,

    #[serde(default)]
    pub processing: ProcessingSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupSection {
    /// Backup extension, with or without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodingSection {
    #[serde(default = "default_encoding")]
    pub input: String,

    #[serde(default = "default_encoding")]
    pub file: String,

    #[serde(default = "default_encoding")]
    pub filesystem: String,
}

impl Default for EncodingSection {
    fn default() -> Self {
        Self {
            input: default_encoding(),
            file: default_encoding(),
            filesystem: default_encoding(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingSection {
    #[serde(default)]
    pub linear: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_extension() -> String { "bak".to_string() }
fn default_true() -> bool { true }
fn default_encoding() -> String { "utf-8".to_string() }

/// Default location of the configuration file, if a home directory is known.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".subst").join("config.toml"))
}

/// Load configuration
///
/// An explicit path must exist. Without one, the default location is tried and
/// a missing file simply yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(Config::default()),
        },
    };

    let config_str = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config = parse_config(&config_str)
        .with_context(|| format!("Invalid config file: {}", config_path.display()))?;
    tracing::debug!("loaded configuration from {}", config_path.display());

    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).context("Failed to parse TOML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    let extension = &config.backup.extension;
    if extension.contains(['/', '\\']) {
        anyhow::bail!(
            "Invalid backup extension: {:?} (must not contain path separators)",
            extension
        );
    }

    for (key, label) in [
        ("encoding.input", &config.encoding.input),
        ("encoding.file", &config.encoding.file),
        ("encoding.filesystem", &config.encoding.filesystem),
    ] {
        if let Err(e) = encoding::lookup(label) {
            anyhow::bail!("Invalid {}: {}", key, e);
        }
    }

    Ok(())
}
