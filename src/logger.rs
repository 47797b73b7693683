//! Log forwarding to a host-application logger.
//!
//! The crate logs through the standard [`log`] facade. Host applications
//! install a [`Logger`] once at startup with [`set_logger`]; every record
//! is forwarded to it. Debug and trace records originating outside this
//! crate are dropped so a chatty dependency cannot flood the host log.

use std::sync::{Arc, OnceLock};

/// Receiver for log records emitted by this crate.
///
/// Implemented by the host application, natively or from foreign code.
#[uniffi::export(with_foreign)]
pub trait Logger: Send + Sync {
    /// Handles a single log message at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log message.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum LogLevel {
    /// Extremely detailed diagnostics.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of normal operation.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Failures that still allow the process to continue.
    Error,
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForwardingLogger;

impl log::Log for ForwardingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let from_this_crate = record
            .module_path()
            .is_some_and(|path| path.starts_with("secure_keychain"));
        let verbose =
            matches!(record.level(), log::Level::Debug | log::Level::Trace);
        if verbose && !from_this_crate {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(level_of(record.level()), format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}

const fn level_of(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// Installs the process-wide logger.
///
/// The first call wins; later calls are ignored. Call once at startup,
/// before constructing any store.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        return;
    }
    static FORWARDER: ForwardingLogger = ForwardingLogger;
    if log::set_logger(&FORWARDER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}
