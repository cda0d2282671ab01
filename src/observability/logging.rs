//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber (binary only)
//! - Provide the leveled [`Logger`] facade the proxy components write to
//! - Allow the level and the output provider to be swapped at runtime
//!
//! # Design Decisions
//! - Components receive an `Arc<Logger>`; `Logger::global()` is only the
//!   shared default, never implicit state
//! - Level is an atomic and the provider sits behind `ArcSwap`, so the
//!   steady-state path takes no locks
//! - The default provider forwards into `tracing`

use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ConfigError;

/// Install the fmt subscriber with an `EnvFilter` (RUST_LOG), falling back
/// to `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Log severity; the discriminant is the level's weight.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warn = 30,
    Error = 50,
    Silent = 80,
}

impl LogLevel {
    pub fn weight(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    fn from_weight(weight: u8) -> Self {
        match weight {
            10 => LogLevel::Debug,
            20 => LogLevel::Info,
            30 => LogLevel::Warn,
            50 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output sink for [`Logger`] messages.
pub trait LogProvider: Send + Sync {
    fn log(&self, message: &str);
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards messages to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProvider;

impl LogProvider for TracingProvider {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Plain stdout/stderr output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProvider;

impl LogProvider for ConsoleProvider {
    fn log(&self, message: &str) {
        println!("{message}");
    }

    fn debug(&self, message: &str) {
        println!("{message}");
    }

    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Resolve a provider by its configuration name.
pub fn provider_from_name(name: &str) -> Result<Box<dyn LogProvider>, ConfigError> {
    match name {
        "tracing" => Ok(Box::new(TracingProvider)),
        "console" => Ok(Box::new(ConsoleProvider)),
        other => Err(ConfigError::InvalidLogProvider(other.to_string())),
    }
}

/// Leveled logger with a replaceable provider.
pub struct Logger {
    level: AtomicU8,
    provider: ArcSwap<Box<dyn LogProvider>>,
}

impl Logger {
    /// Logger at `info` writing to [`TracingProvider`].
    pub fn new() -> Self {
        Self {
            level: AtomicU8::new(LogLevel::Info.weight()),
            provider: ArcSwap::from_pointee(Box::new(TracingProvider) as Box<dyn LogProvider>),
        }
    }

    /// The shared default instance.
    pub fn global() -> Arc<Logger> {
        static GLOBAL: OnceLock<Arc<Logger>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Logger::new())).clone()
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_weight(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level.weight(), Ordering::Relaxed);
    }

    pub fn set_provider<P: LogProvider + 'static>(&self, provider: P) {
        self.set_boxed_provider(Box::new(provider));
    }

    pub fn set_boxed_provider(&self, provider: Box<dyn LogProvider>) {
        self.provider.store(Arc::new(provider));
    }

    /// Apply the level and provider names from configuration.
    pub fn configure(&self, level: &str, provider: &str) -> Result<(), ConfigError> {
        let level = level.parse()?;
        let provider = provider_from_name(provider)?;
        self.set_level(level);
        self.set_boxed_provider(provider);
        Ok(())
    }

    /// Restore `info` and the tracing provider.
    pub fn reset(&self) {
        self.set_level(LogLevel::Info);
        self.set_provider(TracingProvider);
    }

    /// True when a message at `level` passes the current threshold.
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level().weight() <= level.weight()
    }

    /// Emits regardless of the threshold.
    pub fn log(&self, message: impl Display) {
        self.provider.load().log(&message.to_string());
    }

    pub fn debug(&self, message: impl Display) {
        if self.enabled(LogLevel::Debug) {
            self.provider.load().debug(&message.to_string());
        }
    }

    pub fn info(&self, message: impl Display) {
        if self.enabled(LogLevel::Info) {
            self.provider.load().info(&message.to_string());
        }
    }

    pub fn warn(&self, message: impl Display) {
        if self.enabled(LogLevel::Warn) {
            self.provider.load().warn(&message.to_string());
        }
    }

    pub fn error(&self, message: impl Display) {
        if self.enabled(LogLevel::Error) {
            self.provider.load().error(&message.to_string());
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level()).finish()
    }
}
