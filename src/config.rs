//! Configuration management for the record store and schema export
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (storefront.toml)
//! - Environment variables (STOREFRONT__*)
//!
//! ## Example config file (storefront.toml):
//! ```toml
//! [store]
//! unknown_fields = "reject"
//!
//! [export]
//! output_dir = "./schemas"
//! output_format = "compact"
//! include_manifest = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorefrontConfig {
    /// Record store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Schema export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// What to do with fields a record type does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Silently leave them out of the stored record
    #[default]
    Drop,
    /// Fail the write with a constraint violation
    Reject,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory JSON Schema files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Write manifest.json alongside the schemas
    #[serde(default = "default_true")]
    pub include_manifest: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    pub fn render(&self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_format: OutputFormat::Pretty,
            include_manifest: true,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "storefront.toml",
            ".storefront.toml",
            "config/storefront.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "storefront", "schemas") {
            let xdg_config = config_dir.config_dir().join("storefront.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorefrontConfig::default();
        assert_eq!(config.store.unknown_fields, UnknownFieldPolicy::Drop);
        assert_eq!(config.export.output_dir, PathBuf::from("schemas"));
        assert!(config.export.include_manifest);
    }

    #[test]
    fn test_serialize_config() {
        let config = StorefrontConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("unknown_fields = \"drop\""));
        assert!(toml_str.contains("[export]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[store]\nunknown_fields = \"reject\"\n\n[export]\noutput_format = \"compact\"\n",
        )
        .unwrap();

        let config = StorefrontConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.store.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.export.output_format, OutputFormat::Compact);
        assert!(config.export.include_manifest);
    }
}
