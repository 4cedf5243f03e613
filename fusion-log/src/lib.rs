//! Fusion Logging
//!
//! Installs the process-wide `tracing` subscriber used by every Product
//! Fusion binary. Libraries in the workspace only emit events through the
//! `tracing` macros; this crate decides where and how they are written.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tracing::info;
//!
//! fusion_log::init();
//! info!(channel = "email-channel", "Subscriber started");
//! ```
//!
//! # Environment Variables
//!
//! - `FUSION_DEBUG=1` - Enable debug logging
//! - `FUSION_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `FUSION_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `FUSION_LOG_COLOR=1|0` - Enable/disable ANSI colors
//! - `RUST_LOG` - When set, overrides the level with a full filter directive

use once_cell::sync::OnceCell;
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for Fusion logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get the filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl FromStr for Level {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            // `fatal` and `critical` come from the older service settings.
            "error" | "fatal" | "critical" => Ok(Level::Error),
            "off" | "none" | "notset" => Ok(Level::Off),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl FromStr for Format {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

/// Returned when a level or format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown logging value: {}", self.0)
    }
}

impl std::error::Error for UnknownValue {}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include the event target (module path)
    pub target: bool,
    /// Extra filter directives appended after the level, e.g. `lettre=warn`
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            color: false, // JSON output doesn't use colors
            target: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let debug = flag("FUSION_DEBUG").unwrap_or(false);

        let level = env::var("FUSION_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("FUSION_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        let color = flag("FUSION_LOG_COLOR")
            .unwrap_or_else(|| format != Format::Json && color_terminal());

        Self {
            level,
            format,
            color,
            ..Self::default()
        }
    }

    /// Set the level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Override the level with a configured level name.
    ///
    /// The level is left unchanged when the name is not recognised.
    pub fn apply_level(&mut self, name: &str) -> Result<(), UnknownValue> {
        self.level = name.parse()?;
        Ok(())
    }

    /// Set the format.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Add a filter directive such as `fusion_dispatch=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Render the filter expression for this configuration.
    pub fn filter_expression(&self) -> String {
        let mut parts = vec![self.level.as_directive().to_string()];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.filter_expression()))
    }
}

fn flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn color_terminal() -> bool {
    env::var("NO_COLOR").is_err() && env::var("TERM").is_ok()
}

// ============================================================================
// Public API
// ============================================================================

static INSTALLED: OnceCell<LogConfig> = OnceCell::new();

/// Initialize logging from the environment.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    init_with(LogConfig::from_env());
}

/// Initialize logging with an explicit configuration.
///
/// Returns `false` when logging was already initialized, either by an
/// earlier call or by another global subscriber.
pub fn init_with(config: LogConfig) -> bool {
    let mut installed = false;
    INSTALLED.get_or_init(|| {
        installed = install(&config);
        config
    });
    installed
}

/// The configuration that was installed, if any.
pub fn installed_config() -> Option<&'static LogConfig> {
    INSTALLED.get()
}

fn install(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(config.target)
        .with_ansi(config.color);

    let result = match config.format {
        Format::Pretty => builder.pretty().try_init(),
        Format::Compact => builder.compact().try_init(),
        #[cfg(feature = "json")]
        Format::Json => builder.json().flatten_event(true).try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => builder.compact().try_init(),
    };

    match result {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
            true
        }
        Err(_) => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("debug".parse(), Ok(Level::Debug));
        assert_eq!("DEBUG".parse(), Ok(Level::Debug));
        assert_eq!("warning".parse(), Ok(Level::Warn));
        assert_eq!("FATAL".parse(), Ok(Level::Error));
        assert_eq!("NOTSET".parse(), Ok(Level::Off));
        assert!("invalid".parse::<Level>().is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("pretty".parse(), Ok(Format::Pretty));
        assert_eq!("compact".parse(), Ok(Format::Compact));
        assert_eq!("json".parse(), Ok(Format::Json));
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn test_apply_level() {
        let mut config = LogConfig::default().level(Level::Debug);

        assert!(config.apply_level("WARNING").is_ok());
        assert_eq!(config.level, Level::Warn);

        assert_eq!(
            config.apply_level("loud"),
            Err(UnknownValue("loud".to_string()))
        );
        assert_eq!(config.level, Level::Warn);
    }

    #[test]
    fn test_filter_expression() {
        let config = LogConfig::default()
            .level(Level::Warn)
            .directive("fusion_dispatch=debug")
            .directive("lettre=error");

        assert_eq!(
            config.filter_expression(),
            "warn,fusion_dispatch=debug,lettre=error"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init_with(LogConfig::default().format(Format::Compact));
        assert!(!init_with(LogConfig::default()));
        assert_eq!(
            installed_config().map(|c| c.format),
            Some(Format::Compact)
        );
    }
}
