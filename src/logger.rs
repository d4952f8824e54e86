//! Initializes `tracing` from the logger configuration.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::{config, Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    #[default]
    Hourly,
    Daily,
    Never,
}

// Only the crate's own targets are filtered by level, dependencies stay quiet.
const MODULE_WHITELIST: &[&str] = &["rdf_composer"];

#[cfg(feature = "file_logging")]
static NONBLOCKING_WORK_GUARD_KEEP: OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    OnceLock::new();

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Builds the filter directive for `config`.
#[must_use]
pub fn filter_directive(config: &config::Logger) -> String {
    config
        .override_filter
        .clone()
        .unwrap_or_else(|| level_directive(config.level))
}

fn level_directive(level: LogLevel) -> String {
    MODULE_WHITELIST
        .iter()
        .map(|module| format!("{module}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_env_filter(config: &config::Logger) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config)))
        .map_err(|err| Error::Message(format!("logger filter: {err}")))
}

fn init_layer(format: Format, ansi: bool) -> Box<dyn Layer<Registry> + Sync + Send> {
    match format {
        Format::Compact => fmt::Layer::default().with_ansi(ansi).compact().boxed(),
        Format::Pretty => fmt::Layer::default().with_ansi(ansi).pretty().boxed(),
        Format::Json => fmt::Layer::default().with_ansi(ansi).json().boxed(),
    }
}

#[cfg(feature = "file_logging")]
fn init_file_layer(
    appender: &config::LoggerFileAppender,
) -> Result<Option<Box<dyn Layer<Registry> + Sync + Send>>> {
    use tracing_appender::rolling;

    if !appender.enable {
        return Ok(None);
    }
    let rotation = match appender.rotation {
        Rotation::Minutely => rolling::Rotation::MINUTELY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Daily => rolling::Rotation::DAILY,
        Rotation::Never => rolling::Rotation::NEVER,
    };
    let mut builder = rolling::Builder::new()
        .rotation(rotation)
        .filename_prefix(appender.filename_prefix.as_deref().unwrap_or("rdf-composer"))
        .filename_suffix(appender.filename_suffix.as_deref().unwrap_or("log"));
    if appender.max_log_files > 0 {
        builder = builder.max_log_files(appender.max_log_files);
    }
    let file_appender = builder
        .build(appender.dir.as_deref().unwrap_or("./logs"))
        .map_err(|err| Error::Message(format!("logger file appender: {err}")))?;

    // the file keeps its own level below the global filter
    let filter = EnvFilter::try_new(level_directive(appender.level))
        .map_err(|err| Error::Message(format!("logger file filter: {err}")))?;
    let layer = if appender.non_blocking {
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = NONBLOCKING_WORK_GUARD_KEEP.set(guard);
        init_layer_with_writer(appender.format, writer, filter)
    } else {
        init_layer_with_writer(appender.format, file_appender, filter)
    };
    Ok(Some(layer))
}

#[cfg(feature = "file_logging")]
fn init_layer_with_writer<W>(
    format: Format,
    writer: W,
    filter: EnvFilter,
) -> Box<dyn Layer<Registry> + Sync + Send>
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::Layer::default().with_ansi(false).with_writer(writer);
    match format {
        Format::Compact => layer.compact().with_filter(filter).boxed(),
        Format::Pretty => layer.pretty().with_filter(filter).boxed(),
        Format::Json => layer.json().with_filter(filter).boxed(),
    }
}

/// Installs the global subscriber described by `config`.
///
/// Only the first call installs anything; later calls return `Ok(())`.
///
/// # Errors
///
/// When the filter directive is invalid, the log directory cannot be created
/// or another global subscriber is already installed.
pub fn init(config: &config::Logger) -> Result<()> {
    if !config.enable || INITIALIZED.get().is_some() {
        return Ok(());
    }

    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    #[cfg(feature = "file_logging")]
    if let Some(appender) = &config.file_appender {
        if let Some(layer) = init_file_layer(appender)? {
            layers.push(layer);
        }
    }

    layers.push(init_layer(config.format, true));

    if config.pretty_backtrace {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let env_filter = init_env_filter(config)?;
    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|err| Error::Message(format!("logger: {err}")))?;
    let _ = INITIALIZED.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{filter_directive, level_directive, LogLevel};
    use crate::config;

    #[rstest]
    #[case(LogLevel::Debug, None, "rdf_composer=debug")]
    #[case(LogLevel::Off, None, "rdf_composer=off")]
    #[case(LogLevel::Info, Some("rdf_composer::property=trace"), "rdf_composer::property=trace")]
    fn builds_filter_directives(
        #[case] level: LogLevel,
        #[case] override_filter: Option<&str>,
        #[case] expected: &str,
    ) {
        let logger = config::Logger {
            level,
            override_filter: override_filter.map(str::to_owned),
            ..config::Logger::default()
        };
        assert_eq!(filter_directive(&logger), expected);
    }

    #[test]
    fn file_levels_ignore_the_console_override() {
        let logger = config::Logger {
            override_filter: Some("rdf_composer::store=trace".to_owned()),
            ..config::Logger::default()
        };
        let appender = config::LoggerFileAppender {
            level: LogLevel::Warn,
            ..config::LoggerFileAppender::default()
        };
        assert_eq!(filter_directive(&logger), "rdf_composer::store=trace");
        assert_eq!(level_directive(appender.level), "rdf_composer=warn");
    }
}
