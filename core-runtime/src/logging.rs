//! Tracing subscriber setup for hosts
//!
//! The core only emits `tracing` events; installing a subscriber is left to
//! the host. [`init_logging`] is the batteries-included option: workspace
//! crates follow one level, chatty dependencies stay at `warn`.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(LoggingConfig::from_env().with_format(LogFormat::Compact))?;
//! tracing::info!("Offline library starting");
//! ```
//!
//! `OFFLINE_MUSIC_LOG` overrides the filter (`EnvFilter` syntax) and
//! `OFFLINE_MUSIC_LOG_FORMAT` picks `pretty`, `json` or `compact`.

use crate::error::{Error, Result};

use std::io;
use std::str::FromStr;

use tracing_subscriber::{
    filter::EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
    Layer, Registry,
};

pub const FILTER_ENV: &str = "OFFLINE_MUSIC_LOG";
pub const FORMAT_ENV: &str = "OFFLINE_MUSIC_LOG_FORMAT";

const WORKSPACE_TARGETS: &[&str] = &[
    "offline_music_workspace",
    "core_runtime",
    "core_auth",
    "core_library",
    "core_playback",
    "core_service",
    "provider_spotify",
    "bridge_desktop",
];

/// Held at `warn` by the default filter.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx", "symphonia", "cpal"];

const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "code_verifier",
    "password",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::Config(format!("Unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for workspace crates under the default filter
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter
    pub filter: Option<String>,
    /// Record span enter/exit (pretty) or the span list (json)
    pub enable_spans: bool,
    /// Thread names and ids, handy when the audio callback thread logs
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    /// Defaults overlaid with [`FILTER_ENV`] and [`FORMAT_ENV`]. An
    /// unparseable format variable is ignored.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(FILTER_ENV).ok(),
            std::env::var(FORMAT_ENV).ok(),
        )
    }

    fn from_vars(filter: Option<String>, format: Option<String>) -> Self {
        let mut config = Self::default();
        config.filter = filter.filter(|f| !f.trim().is_empty());
        if let Some(format) = format.and_then(|f| f.parse().ok()) {
            config.format = format;
        }
        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Install the global subscriber, writing to stdout.
///
/// A second call fails with [`Error::Config`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let threads = config.display_thread_info;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_ids(threads)
            .with_thread_names(threads)
            .with_span_events(if config.enable_spans {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            })
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .with_thread_ids(threads)
            .with_thread_names(threads)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_ids(threads)
            .with_thread_names(threads)
            .with_writer(io::stdout)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn default_directives(level: LogLevel) -> String {
    let level = level.as_directive();
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => default_directives(config.level),
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Mask the value when the field name looks like a credential. Values that
/// look like email addresses keep only their first character.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("access_token", "BQD..."), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("track_id", "4uLU6hMC"), "4uLU6hMC");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let field = field_name.to_ascii_lowercase();
    if SENSITIVE_FIELDS.iter().any(|f| field.contains(f)) {
        return "[REDACTED]".to_string();
    }

    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@[REDACTED]", first)
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_vars() {
        let config = LoggingConfig::from_vars(
            Some("core_playback=trace".to_string()),
            Some(" JSON ".to_string()),
        );
        assert_eq!(config.filter.as_deref(), Some("core_playback=trace"));
        assert_eq!(config.format, LogFormat::Json);

        let fallback = LoggingConfig::from_vars(Some("  ".to_string()), Some("xml".to_string()));
        assert!(fallback.filter.is_none());
        assert_eq!(fallback.format, LogFormat::default());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!("loud".parse::<LogFormat>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_filter_covers_workspace_and_quiets_deps() {
        let directives = default_directives(LogLevel::Debug);

        assert!(directives.contains("core_playback=debug"));
        assert!(directives.contains("provider_spotify=debug"));
        assert!(directives.contains("sqlx=warn"));
        assert!(directives.contains("symphonia=warn"));
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_custom_filter_validated() {
        let ok = LoggingConfig::default().with_filter("core_playback=trace");
        assert!(build_filter(&ok).is_ok());

        let bad = LoggingConfig::default().with_filter("core_playback=loud[");
        assert!(matches!(build_filter(&bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("refresh_token", "AQC"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("Authorization", "Bearer x"), "[REDACTED]");
        assert_eq!(
            redact_if_sensitive("email", "listener@example.com"),
            "l***@[REDACTED]"
        );
        assert_eq!(redact_if_sensitive("owner", "dj@home"), "dj@home");
        assert_eq!(redact_if_sensitive("name", "Song Name"), "Song Name");
    }
}
