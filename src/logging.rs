//! Logging backend.
//!
//! The crate logs through the `log` facade. [`init`] installs `env_logger` with the configured
//! level and a pipe target that writes every record to stderr and to a size-rotated log file.
//! `RUST_LOG` still takes precedence over the configured level.

pub mod rotating_file;

pub use rotating_file::RotatingFile;

use crate::configuration::Config;
use chrono::Local;
use log::{warn, LevelFilter, SetLoggerError};
use std::io::{self, Write};

/// Console plus optional file output for log records.
pub struct LogSink {
    file: Option<RotatingFile>,
}

impl LogSink {
    pub fn new(file: Option<RotatingFile>) -> Self {
        Self { file }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // file errors are dropped, the console copy is authoritative
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Installs the global logger described by `config`.
///
/// If the log file cannot be opened logging continues on the console only and a warning is
/// emitted.
pub fn init(config: &Config) -> Result<(), SetLoggerError> {
    let level = config.log_level_filter().unwrap_or(LevelFilter::Info);
    let (file, file_err) =
        match RotatingFile::open(&config.log_file, config.max_log_size, config.log_backup_count) {
            Ok(f) => (Some(f), None),
            Err(e) => (None, Some(e)),
        };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - deadlockssh - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(LogSink::new(file))))
        .try_init()?;

    if let Some(e) = file_err {
        warn!(
            "Unable to open log file {}: {}, logging to console only",
            config.log_file.display(),
            e
        );
    }
    Ok(())
}
