use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log::Log` backend writing to the debug console port.
///
/// Messages are emitted as `[LEVEL] target: message`, one line each, with no
/// buffering and no allocation.
pub struct DebugconLogger;

impl DebugconLogger {
    /// Install the logger. Call once during early bootstrap.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        static LOGGER: DebugconLogger = DebugconLogger;
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        crate::debugcon_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // unbuffered port writes; nothing to do
    }
}
