//! Structured logging bootstrap for processes embedding the dump store.
//!
//! Storage crates only emit `tracing` events. The embedder installs a
//! subscriber once at startup with [`init_logging`], writing to stderr either
//! as human-readable lines or as one JSON object per event.

use std::io::IsTerminal;
use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Level variable checked before `RUST_LOG`.
pub const LOG_LEVEL_ENV_VAR: &str = "AD_LOG";

/// Output format variable.
pub const LOG_FORMAT_ENV_VAR: &str = "AD_LOG_FORMAT";

/// Event rendering on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One flattened JSON object per line.
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "json" | "jsonl" => Ok(LogFormat::Jsonl),
            other => Err(format!("unsupported log format '{}'", other)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// How the embedding process wants storage events rendered.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Level applied to the storage crates when `RUST_LOG` is unset.
    pub level: LevelFilter,
    /// Prefix human lines with a timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LevelFilter::INFO,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Build from the process environment; explicit arguments win.
    pub fn from_env(level: Option<LevelFilter>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    /// Build from `lookup`; explicit arguments win.
    ///
    /// `AD_LOG` takes a single level. Without it, the most verbose level
    /// named in `RUST_LOG` directives is used.
    pub fn from_lookup<F>(lookup: F, level: Option<LevelFilter>, format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = match lookup(LOG_LEVEL_ENV_VAR) {
            Some(val) => val.trim().parse::<LevelFilter>().ok(),
            None => lookup("RUST_LOG").and_then(|val| most_verbose_directive(&val)),
        };
        let env_format = lookup(LOG_FORMAT_ENV_VAR).and_then(|val| val.parse().ok());

        let defaults = LogConfig::default();
        LogConfig {
            format: format.or(env_format).unwrap_or(defaults.format),
            level: level.or(env_level).unwrap_or(defaults.level),
            timestamps: defaults.timestamps,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!("ad_storage={0},ad_common={0}", self.level)
    }
}

fn most_verbose_directive(directives: &str) -> Option<LevelFilter> {
    directives
        .split(',')
        .filter_map(|d| d.rsplit('=').next())
        .filter_map(|lvl| lvl.trim().parse::<LevelFilter>().ok())
        .max()
}

/// Install the global subscriber, failing if one is already set.
pub fn try_init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    let registry = tracing_subscriber::registry().with(filter);

    match (config.format, config.timestamps) {
        (LogFormat::Jsonl, _) => registry
            .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Human, with_time) => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false);
            if with_time {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        }
    }
}

/// Install the global subscriber; a repeated call only prints a warning.
pub fn init_logging(config: &LogConfig) {
    if let Err(e) = try_init_logging(config) {
        eprintln!("warning: activity dump logging already initialized: {}", e);
    }
}
