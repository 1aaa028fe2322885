//! Subscriber setup for the generator binary
//!
//! Library code only emits `tracing` events. The binary picks a verbosity from its
//! flags and installs a subscriber through [`LoggingConfig`]: human-readable output on
//! stderr, plus an optional daily-rolling JSON file of the same events.

use std::io;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Rolling log files are named `<prefix>.<date>`
pub const LOG_FILE_PREFIX: &str = "medscheduler";

/// Failure to build the filter or install the global subscriber
pub type LoggingInitError = Box<dyn std::error::Error + Send + Sync>;

/// How generator runs report progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Most verbose level shown for this crate
    pub level: Level,
    /// Emit console lines as JSON objects
    pub json_console: bool,
    /// Mirror events into rolling JSON files here
    pub log_dir: Option<PathBuf>,
    /// Report pipeline stage spans with their durations when they close
    pub stage_timings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_console: false,
            log_dir: None,
            stage_timings: false,
        }
    }
}

impl LoggingConfig {
    /// Warnings only, compact console output, no file sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Verbosity for the `--verbose` / `--debug` flag pair.
    ///
    /// Quiet runs only show warnings (reference-table fallbacks, rebookings with no
    /// free slot). Debug additionally times every pipeline stage.
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Self::new().with_level(Level::DEBUG).with_stage_timings()
        } else if verbose {
            Self::new().with_level(Level::INFO)
        } else {
            Self::new()
        }
    }

    /// Set the most verbose level shown
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Emit console lines as JSON objects
    pub fn with_json_console(mut self) -> Self {
        self.json_console = true;
        self
    }

    /// Also write daily-rolling JSON files into `dir`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Log each pipeline stage span with its duration when it closes
    pub fn with_stage_timings(mut self) -> Self {
        self.stage_timings = true;
        self
    }

    /// `RUST_LOG` wins over the configured level when it is set and parses.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), self.level))
        })
    }

    fn span_events(&self) -> FmtSpan {
        if self.stage_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Install the global subscriber.
    ///
    /// Keep the returned guard alive until exit; dropping it flushes the file writer.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingInitError> {
        let console = if self.json_console {
            fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(self.span_events())
                .boxed()
        } else {
            fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false)
                .with_span_events(self.span_events())
                .boxed()
        };

        let mut guard = None;
        let file = self.log_dir.as_ref().map(|dir| {
            let (writer, flush_guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            guard = Some(flush_guard);
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(self.span_events())
                .boxed()
        });

        Registry::default()
            .with(self.filter())
            .with(console)
            .with(file)
            .try_init()?;

        debug!(level = %self.level, log_dir = ?self.log_dir, "Logging ready");
        Ok(guard)
    }
}

/// Event tagged with the pipeline stage that emitted it
#[macro_export]
macro_rules! stage_event {
    ($level:ident, $stage:expr, $message:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::$level!(stage = $stage, $($key = $value,)* "{}", $message);
    };
    ($level:ident, $stage:expr, $message:expr) => {
        tracing::$level!(stage = $stage, "{}", $message);
    };
}
