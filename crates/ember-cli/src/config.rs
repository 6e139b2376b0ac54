//! CLI configuration types

use std::path::Path;

use anyhow::{bail, Context};
use ember_tree::{tags, FieldFlags, Tag};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `EMBER_LOGGING__LEVEL=debug`
pub const ENV_PREFIX: &str = "EMBER";

/// Complete CLI configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmberConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Request construction
    #[serde(default)]
    pub request: RequestConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl EmberConfig {
    /// Load `path` (if it exists) layered under `EMBER_*` environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            bail!("unknown log format '{}' (expected text or json)", self.logging.format);
        }
        self.request.field_flags()?;
        if self.request.tag() == tags::COMMAND {
            bail!("request tag {} is reserved for commands", self.request.tag);
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// How requests are built
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Address the target by absolute path instead of a stand-in chain
    #[serde(default)]
    pub qualified: bool,

    /// Field flags label carried by the command
    #[serde(default = "default_field_flags")]
    pub field_flags: String,

    /// Application tag number of the path stand-ins
    #[serde(default = "default_request_tag")]
    pub tag: u32,
}

fn default_field_flags() -> String {
    "all".to_string()
}

fn default_request_tag() -> u32 {
    tags::NODE.number()
}

impl RequestConfig {
    pub fn field_flags(&self) -> anyhow::Result<FieldFlags> {
        FieldFlags::from_label(&self.field_flags)
            .with_context(|| format!("unknown field flags '{}'", self.field_flags))
    }

    pub fn tag(&self) -> Tag {
        Tag::application(self.tag)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            qualified: false,
            field_flags: default_field_flags(),
            tag: default_request_tag(),
        }
    }
}

/// Output format of built messages
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Hex,
    Tree,
}

/// Output settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EmberConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(!config.request.qualified);
        assert_eq!(config.request.field_flags().unwrap(), FieldFlags::All);
        assert_eq!(config.request.tag(), tags::NODE);
        assert_eq!(config.output.format, OutputFormat::Hex);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config = EmberConfig::from_toml(
            r#"
            [request]
            qualified = true
            field_flags = "Connections"

            [output]
            format = "tree"
            "#,
        )
        .unwrap();
        assert!(config.request.qualified);
        assert_eq!(config.request.field_flags().unwrap(), FieldFlags::Connections);
        assert_eq!(config.request.tag, 3);
        assert_eq!(config.output.format, OutputFormat::Tree);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation() {
        assert!(EmberConfig::from_toml("[logging]\nformat = \"xml\"").is_err());
        assert!(EmberConfig::from_toml("[request]\nfield_flags = \"everything\"").is_err());
        assert!(EmberConfig::from_toml("[request]\ntag = 2").is_err());
        assert!(EmberConfig::from_toml("[output]\nformat = \"yaml\"").is_err());
    }

    #[test]
    fn test_load_file_and_missing_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[request]\ntag = 13").unwrap();
        let config = EmberConfig::load(file.path()).unwrap();
        assert_eq!(config.request.tag(), tags::MATRIX);

        let dir = tempfile::tempdir().unwrap();
        let config = EmberConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.request.tag(), tags::NODE);
    }

    #[test]
    fn test_toml_output_reloads() {
        let mut config = EmberConfig::default();
        config.request.field_flags = "value".to_string();
        let rendered = config.to_toml().unwrap();
        let reloaded = EmberConfig::from_toml(&rendered).unwrap();
        assert_eq!(reloaded.request.field_flags().unwrap(), FieldFlags::Value);
    }
}
