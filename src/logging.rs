//! Operation log shown in the log pane.
//!
//! Events from `tracing` at INFO and above are captured by [`LogPaneLayer`]
//! into a bounded [`LogBuffer`]; the renderer reads the buffer each frame.
//! An optional plain-text file log can be stacked on the same subscriber.

use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Layer};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    /// `[HH:MM:SS] message`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Ring buffer of log entries; the oldest entry is dropped once full.
pub struct LogBuffer {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.read().iter().filter(|e| e.level == level).count()
    }
}

/// Tracing layer feeding the log pane.
pub struct LogPaneLayer {
    buffer: Arc<LogBuffer>,
}

impl LogPaneLayer {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogPaneLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            _ => return,
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            self.buffer.push(LogEntry::new(level, message));
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

/// Installs the global subscriber: the log pane layer plus, when `log_file`
/// is given, a plain-text file log filtered by `RUST_LOG` or `level`.
pub fn init(buffer: Arc<LogBuffer>, log_file: Option<&Path>, level: &str) -> std::io::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
            Some(
                tracing_fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(LogPaneLayer::new(buffer))
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_captures_info_and_above() {
        let buffer = LogBuffer::new_shared();
        let subscriber = tracing_subscriber::registry().with(LogPaneLayer::new(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden");
            tracing::info!("Executing SQL: {}", "SELECT 1");
            tracing::warn!(path = "x.db", "Rollback failed");
            tracing::error!("SQL error: boom");
        });

        let entries = buffer.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "Executing SQL: SELECT 1");
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert_eq!(buffer.count(LogLevel::Error), 1);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let buffer = LogBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.push(LogEntry::new(LogLevel::Info, format!("entry {}", i)));
        }

        let messages: Vec<String> = buffer.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(buffer.tail(2).len(), 2);
        assert_eq!(buffer.tail(2)[1].message, "entry 4");
    }

    #[test]
    fn test_render_has_timestamp_prefix() {
        let line = LogEntry::new(LogLevel::Info, "Transaction started").render();
        assert!(line.starts_with('['));
        assert_eq!(&line[9..11], "] ");
        assert!(line.ends_with("Transaction started"));
    }
}
