//! TOML configuration file support.
//!
//! Settings that are tedious to repeat on every call can live in a config
//! file passed with `--config`:
//!
//! ```toml
//! # rainbow.toml
//! [decode]
//! precision = 1
//! parallel = true
//!
//! [output]
//! pretty = true
//! ```
//!
//! Command-line flags take precedence over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for rainbow.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Decoder settings.
    #[serde(default)]
    pub decode: DecodeConfig,

    /// Output formatting settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration shared by the decode commands.
#[derive(Debug, Default, Deserialize)]
pub struct DecodeConfig {
    /// Decimal places m/z values are rounded to.
    pub precision: Option<u32>,

    /// Use the record-index decode path (parallel with the `parallel` feature).
    pub parallel: Option<bool>,
}

/// Configuration for JSON output.
#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON.
    pub pretty: Option<bool>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load the file if one was given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Effective settings after merging flags over the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Decimal places m/z values are rounded to.
    pub precision: u32,
    /// Use the record-index decode path.
    pub parallel: bool,
    /// Pretty-print JSON.
    pub pretty: bool,
}

impl Settings {
    /// Merge flag values (when set) over the config file values.
    pub fn resolve(
        config: &Config,
        precision: Option<u32>,
        parallel: bool,
        pretty: bool,
    ) -> Self {
        Self {
            precision: precision.or(config.decode.precision).unwrap_or(0),
            parallel: parallel || config.decode.parallel.unwrap_or(false),
            pretty: pretty || config.output.pretty.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [decode]
            precision = 2
            parallel = true

            [output]
            pretty = true
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.decode.precision, Some(2));
        assert_eq!(config.decode.parallel, Some(true));
        assert_eq!(config.output.pretty, Some(true));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [decode]
            precision = 1
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.decode.precision, Some(1));
        assert_eq!(config.decode.parallel, None);
        assert_eq!(config.output.pretty, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.decode.precision, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_str("[decode]\nprecision = \"one\"").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let config = Config::from_str("[decode]\nprecision = 3\nparallel = true").unwrap();

        let settings = Settings::resolve(&config, None, false, false);
        assert_eq!(
            settings,
            Settings {
                precision: 3,
                parallel: true,
                pretty: false
            }
        );

        let settings = Settings::resolve(&config, Some(0), false, true);
        assert_eq!(settings.precision, 0);
        assert!(settings.pretty);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\npretty = true").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.output.pretty, Some(true));
        assert!(Config::load(None).unwrap().output.pretty.is_none());
    }
}
