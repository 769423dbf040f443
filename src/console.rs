//! Console Logger
//!
//! `log` backend that formats records onto any `core::fmt::Write` sink,
//! typically the debug serial port. The sink sits behind a spinlock so
//! records from different cores never interleave mid-line.
//!
//! # Usage
//! ```ignore
//! static LOGGER: ConsoleLogger<SerialPort> = ConsoleLogger::new(SerialPort::new(), LevelFilter::Debug);
//! log::set_logger(&LOGGER).ok();
//! log::set_max_level(LOGGER.level());
//! ```

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// A `log` backend over a locked text sink.
pub struct ConsoleLogger<W> {
    sink: Mutex<W>,
    level: LevelFilter,
}

impl<W: Write + Send> ConsoleLogger<W> {
    pub const fn new(sink: W, level: LevelFilter) -> Self {
        Self {
            sink: Mutex::new(sink),
            level,
        }
    }

    #[inline]
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Run `f` with exclusive access to the sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.sink.lock())
    }
}

impl<W: Write + Send> Log for ConsoleLogger<W> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut sink = self.sink.lock();
        // Dropped output is not worth failing a syscall over.
        let _ = writeln!(sink, "[{} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}
