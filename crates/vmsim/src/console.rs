//! Defines the console logger that writes log records to stderr.

use std::io::{self, Write};

use log::LevelFilter;
use spin::{Mutex, Once};

pub struct Console {
    output: Mutex<Box<dyn Write + Send>>,
}

static DEFAULT: Once<Console> = Once::new();

impl Console {
    /// Installs the console as the global logger, raising or lowering the default level by
    /// `verbosity` steps.
    pub fn init(verbosity: i8) -> &'static Self {
        let console = Self::default();
        console.install(verbosity);
        console
    }

    pub fn default() -> &'static Self {
        DEFAULT.call_once(|| Console {
            output: Mutex::new(Box::new(io::stderr())),
        })
    }

    pub fn install(&'static self, verbosity: i8) {
        // A logger may already be installed when running under a test harness.
        if log::set_logger(self).is_err() {
            return;
        }
        log::set_max_level(level_for(verbosity));
    }
}

/// Returns the level filter for a verbosity offset from the build's default.
///
/// Debug builds default to `Trace`, release builds to `Info`.
pub fn level_for(verbosity: i8) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];

    #[cfg(debug_assertions)]
    let base = 5;
    #[cfg(not(debug_assertions))]
    let base = 3;

    let index = (base + verbosity as i32).clamp(0, LEVELS.len() as i32 - 1);
    LEVELS[index as usize]
}

impl log::Log for Console {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut output = self.output.lock();
        // Nothing sensible to do if stderr is gone.
        let _ = write_log_entry_to(&mut **output, record);
    }

    fn flush(&self) {
        let _ = self.output.lock().flush();
    }
}

fn write_log_entry_to(writer: &mut dyn Write, record: &log::Record) -> io::Result<()> {
    #[cfg(feature = "detailed-logging")]
    return writeln!(
        writer,
        "[{} {}:{} {}] {}",
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.target(),
        record.args()
    );
    #[cfg(not(feature = "detailed-logging"))]
    return writeln!(writer, "[{:5}] {}", record.level(), record.args());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_moves_from_the_default_level() {
        #[cfg(debug_assertions)]
        {
            assert_eq!(level_for(0), LevelFilter::Trace);
            assert_eq!(level_for(3), LevelFilter::Trace);
            assert_eq!(level_for(-2), LevelFilter::Info);
        }
        #[cfg(not(debug_assertions))]
        {
            assert_eq!(level_for(0), LevelFilter::Info);
            assert_eq!(level_for(1), LevelFilter::Debug);
            assert_eq!(level_for(-2), LevelFilter::Error);
        }
        assert_eq!(level_for(-10), LevelFilter::Off);
    }

    #[test]
    #[cfg(not(feature = "detailed-logging"))]
    fn formats_level_and_message() {
        let mut buffer = Vec::new();
        let record = log::Record::builder()
            .level(log::Level::Warn)
            .args(format_args!("pid 3: out of frames"))
            .build();

        write_log_entry_to(&mut buffer, &record).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "[WARN ] pid 3: out of frames\n");
    }
}
