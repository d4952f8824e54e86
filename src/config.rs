//! # Configuration
//!
//! Settings of a composer session, read from YAML or TOML. Every section and
//! every field is optional; missing values take the defaults below.
//!
//! ```yaml
//! logger:
//!   enable: true
//!   level: debug
//!   format: compact
//! composer:
//!   cycle_policy: drop_edge
//! properties:
//!   cache_limit: 10
//!   max_sets: 10000
//!   order_predicate: http://www.openrdf.org/rdf/2009/object#precedes
//!   locale: en
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{ordering::CyclePolicy, Error, Result};

/// Default predicate linking an ordered element to its successor.
pub const DEFAULT_ORDER_PREDICATE: &str = "http://www.openrdf.org/rdf/2009/object#precedes";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: Logger,
    pub composer: ComposerSettings,
    pub properties: PropertySettings,
}

/// Logger configuration.
///
/// Example (development):
/// ```yaml
/// # config/development.yaml
/// logger:
///   enable: true
///   pretty_backtrace: true
///   level: debug
///   format: compact
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logger {
    pub enable: bool,

    /// Enable nice display of backtraces, in development this should be on.
    pub pretty_backtrace: bool,

    pub level: crate::logger::LogLevel,

    pub format: crate::logger::Format,

    /// Replaces the level based filter with a raw `EnvFilter` directive.
    pub override_filter: Option<String>,

    pub file_appender: Option<LoggerFileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            pretty_backtrace: false,
            level: crate::logger::LogLevel::default(),
            format: crate::logger::Format::default(),
            override_filter: None,
            file_appender: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerFileAppender {
    pub enable: bool,
    /// Write through a background worker thread.
    pub non_blocking: bool,
    pub level: crate::logger::LogLevel,
    pub format: crate::logger::Format,
    pub rotation: crate::logger::Rotation,
    pub dir: Option<String>,
    pub filename_prefix: Option<String>,
    pub filename_suffix: Option<String>,
    /// Rotated files to keep; all when unset.
    pub max_log_files: usize,
}

impl Default for LoggerFileAppender {
    fn default() -> Self {
        Self {
            enable: false,
            non_blocking: false,
            level: crate::logger::LogLevel::default(),
            format: crate::logger::Format::default(),
            rotation: crate::logger::Rotation::default(),
            dir: None,
            filename_prefix: None,
            filename_suffix: None,
            max_log_files: 0,
        }
    }
}

/// Composition settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerSettings {
    /// What to do with an ordering edge that closes a cycle.
    pub cycle_policy: CyclePolicy,
}

/// Property set settings of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertySettings {
    /// Read cache limit of a property set; a cached result is complete only
    /// when it holds fewer values.
    pub cache_limit: usize,
    /// Capacity of the session property set registry.
    pub max_sets: u64,
    /// Predicate storing the order of ordered properties.
    pub order_predicate: String,
    /// Locale of localized properties.
    pub locale: String,
}

impl Default for PropertySettings {
    fn default() -> Self {
        Self {
            cache_limit: 10,
            max_sets: 10_000,
            order_predicate: DEFAULT_ORDER_PREDICATE.to_owned(),
            locale: "en".to_owned(),
        }
    }
}

impl Config {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// When the document is not valid YAML for this structure.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// When the document is not valid TOML for this structure.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a `.yaml`, `.yml` or `.toml` file.
    ///
    /// # Errors
    ///
    /// When the file cannot be read, has another extension or does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => {
                return Err(Error::Message(format!(
                    "unsupported config file `{}`: expected .yaml, .yml or .toml",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Config, PropertySettings, DEFAULT_ORDER_PREDICATE};
    use crate::{logger::LogLevel, ordering::CyclePolicy};

    #[test]
    fn empty_documents_take_defaults() {
        let config = Config::from_yaml_str("{}").expect("yaml");
        assert_eq!(config, Config::default());
        assert_eq!(config.properties.cache_limit, 10);
        assert_eq!(config.properties.max_sets, 10_000);
        assert_eq!(config.properties.order_predicate, DEFAULT_ORDER_PREDICATE);
        assert_eq!(config.composer.cycle_policy, CyclePolicy::DropEdge);
    }

    #[rstest]
    #[case::yaml(Config::from_yaml_str(
        "composer:\n  cycle_policy: reject\nproperties:\n  cache_limit: 3\n  locale: fr\nlogger:\n  level: trace\n"
    ))]
    #[case::toml(Config::from_toml_str(
        "[composer]\ncycle_policy = \"reject\"\n[properties]\ncache_limit = 3\nlocale = \"fr\"\n[logger]\nlevel = \"trace\"\n"
    ))]
    fn reads_partial_sections(#[case] config: crate::Result<Config>) {
        let config = config.expect("config");
        assert_eq!(config.composer.cycle_policy, CyclePolicy::Reject);
        assert_eq!(
            config.properties,
            PropertySettings {
                cache_limit: 3,
                locale: "fr".to_owned(),
                ..PropertySettings::default()
            }
        );
        assert_eq!(config.logger.level, LogLevel::Trace);
    }

    #[test]
    fn rejects_unknown_policies() {
        assert!(Config::from_yaml_str("composer:\n  cycle_policy: ignore\n").is_err());
    }
}
