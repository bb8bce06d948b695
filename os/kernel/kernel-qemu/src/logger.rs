use core::fmt::{self, Write};
use kernel_sync::SyncOnceCell;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: SyncOnceCell<QemuLogger> = SyncOnceCell::new();

/// `log` backend writing `"[LEVEL] target: message"` lines to the debug
/// console.
#[derive(Debug)]
pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install this logger as the global `log` backend.
    ///
    /// # Errors
    /// Fails if a logger has been installed before.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

/// Format `record` as one log line.
///
/// # Errors
/// Propagates errors of `out`.
pub fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            #[cfg(feature = "enabled")]
            let _ = write_record(&mut crate::qemu_fmt::QemuSink, record);
        }
    }

    fn flush(&self) {}
}
