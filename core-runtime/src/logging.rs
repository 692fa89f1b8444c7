//! Tracing setup for the player core.
//!
//! [`init_logging`] installs a `tracing-subscriber` registry with one
//! formatting layer, an [`EnvFilter`] scoped to the workspace crates and,
//! when the host provides one, a layer that mirrors every surviving event
//! into its [`LoggerSink`] (Logcat, OSLog, a desktop console).
//!
//! ```ignore
//! let config = LoggingConfig::default()
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//! init_logging(config)?;
//! tracing::warn!(target: "core_service::integrity", "Manifest request timed out");
//! ```
//!
//! Session cookies travel as plain strings through the HTTP bridge, so the
//! sink layer runs every field through [`redact_if_sensitive`] unless
//! redaction is switched off.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use crate::error::{Error, Result};

const REDACTED: &str = "[REDACTED]";

/// Crates whose events pass the default filter at the configured level.
const WORKSPACE_TARGETS: &[&str] = &[
    "player_workspace",
    "bridge_traits",
    "bridge_desktop",
    "core_runtime",
    "core_playback",
    "core_service",
];

/// Dependencies capped at `warn` by the default filter.
const NOISY_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "sqlx"];

/// Field names whose values are credentials. Matched case-insensitively as
/// substrings, so `set_cookie` and `MUSIC_U` are covered.
const SENSITIVE_KEYS: &[&str] = &[
    "cookie",
    "music_u",
    "csrf",
    "token",
    "authorization",
    "password",
    "secret",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored output for local runs.
    Pretty,
    /// One JSON object per event.
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

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Replace credential values before they reach the host sink.
    pub redact: bool,
    /// Full `EnvFilter` directive; replaces the workspace default.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit (pretty) or the span list (JSON).
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact", &self.redact)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] when the filter directive does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
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
            .with_target(config.display_target)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_writer(io::stdout)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(SinkLayer {
            sink: config.logger_sink.clone(),
            redact: config.redact,
        })
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = config.level.as_str().to_ascii_lowercase();
            WORKSPACE_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, level))
                .chain(NOISY_DEPENDENCIES.iter().map(|dep| format!("{}=warn", dep)))
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Mirrors events into the host [`LoggerSink`].
struct SinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in fields.values {
            let value = if self.redact {
                redact_if_sensitive(&key, &value)
            } else {
                value
            };
            entry = entry.with_field(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_span_id(span.name());
        }

        let sink = Arc::clone(sink);
        // Inside a runtime the sink must not block the emitting task.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.values
                .insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.values
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Hide credential values.
///
/// Fields named after a credential are replaced entirely. Any other value
/// that embeds a `name=value` cookie pair for a credential cookie keeps the
/// cookie name and loses the value, so `"MUSIC_U=abc; Path=/"` logs as
/// `"MUSIC_U=[REDACTED]; Path=/"`.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    if is_sensitive(field_name) {
        return REDACTED.to_string();
    }
    if !value.contains('=') {
        return value.to_string();
    }

    value
        .split("; ")
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if is_sensitive(name) => format!("{}={}", name, REDACTED),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_sensitive(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|key| lower.contains(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for CapturingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn capture(redact: bool, emit: impl FnOnce()) -> Vec<LogEntry> {
        let sink = Arc::new(CapturingSink::default());
        let layer = SinkLayer {
            sink: Some(sink.clone() as Arc<dyn LoggerSink>),
            redact,
        };
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        let entries = sink.entries.lock().unwrap().clone();
        entries
    }

    #[test]
    fn test_default_filter_covers_workspace() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_playback=debug"));
        assert!(filter.contains("core_service=debug"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_playback=trace");
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_playback=trace"));
        assert!(!filter.contains("core_service"));
    }

    #[test]
    fn test_sink_receives_message_and_fields() {
        let entries = capture(false, || {
            tracing::info!(
                target: "core_playback::service",
                track_id = "a",
                attempt = 2,
                "Preparing track"
            );
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "core_playback::service");
        assert_eq!(entry.message, "Preparing track");
        assert_eq!(entry.fields.get("track_id").map(String::as_str), Some("a"));
        assert_eq!(entry.fields.get("attempt").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_sink_min_level_drops_trace() {
        let entries = capture(false, || {
            tracing::trace!("position tick");
            tracing::debug!("state published");
        });

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "state published");
    }

    #[test]
    fn test_sink_redacts_cookies() {
        let entries = capture(true, || {
            tracing::debug!(
                host = "music.example.com",
                cookie = "MUSIC_U=abc",
                "Attaching cookies"
            );
        });

        let entry = &entries[0];
        assert_eq!(entry.fields.get("cookie").map(String::as_str), Some(REDACTED));
        assert_eq!(
            entry.fields.get("host").map(String::as_str),
            Some("music.example.com")
        );
    }

    #[test]
    fn test_redaction_can_be_disabled() {
        let entries = capture(false, || {
            tracing::debug!(cookie = "MUSIC_U=abc", "Attaching cookies");
        });
        assert_eq!(
            entries[0].fields.get("cookie").map(String::as_str),
            Some("MUSIC_U=abc")
        );
    }

    #[test]
    fn test_redact_cookie_pairs_inside_values() {
        assert_eq!(
            redact_if_sensitive("header", "MUSIC_U=abc; Path=/; __csrf=xyz"),
            "MUSIC_U=[REDACTED]; Path=/; __csrf=[REDACTED]"
        );
        assert_eq!(redact_if_sensitive("query", "id=42"), "id=42");
        assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
    }
}
