//! The asynchronous logger: a thin handle over a bounded producer/consumer
//! queue. Call sites push a formatted line; a background worker thread
//! (owned by `tracing-appender`'s non-blocking writer) drains the queue and
//! writes to the configured sink. Nothing in the core ever blocks on a log
//! write beyond the channel send.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Matches the INI `[logging].level` values the config loader accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    All,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            "all" => Some(LogLevel::All),
            _ => None,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace | LogLevel::All => "trace",
        }
    }
}

/// Where the logger writes formatted lines.
#[derive(Clone, Debug)]
pub enum LogSink {
    Stderr,
    File(PathBuf),
}

/// A handle to the running logger. Dropping it flushes and stops the
/// background writer thread, so it must be kept alive for the process
/// lifetime (`main` holds it until shutdown).
pub struct Logger {
    // Held only to keep the non-blocking writer's worker thread alive; never
    // read directly.
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Install the global tracing subscriber writing to `sink` at `level`,
    /// and return a handle whose drop flushes the queue.
    pub fn init(sink: LogSink, level: LogLevel) -> Logger {
        let (writer, guard) = match &sink {
            LogSink::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogSink::File(path) => {
                let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "nvhttpd.log".to_string());
                let appender = tracing_appender::rolling::never(
                    dir.unwrap_or_else(|| Path::new(".")),
                    file_name,
                );
                tracing_appender::non_blocking(appender)
            }
        };

        let filter = EnvFilter::new(level.directive());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(matches!(sink, LogSink::Stderr))
            .try_init();

        Logger { _guard: Some(guard) }
    }

    /// A handle suitable for unit tests: does not install a global
    /// subscriber (tests that care can install their own), so calls are
    /// harmless no-ops if nothing is subscribed.
    pub fn for_test() -> Logger {
        Logger { _guard: None }
    }

    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!("{}", message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        tracing::warn!("{}", message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!("{}", message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!("{}", message.as_ref());
    }
}
