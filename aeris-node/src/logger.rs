//! Fan-out logger
//!
//! Every record goes to stderr through an `env_logger` backend (so
//! `RUST_LOG` filtering works as usual). Warnings and errors are
//! additionally appended to the local rotating log file and queued for
//! the status feed, where the supervisor publishes them on its next
//! tick. The queue is bounded; under a log storm the oldest lines drop
//! first and the broker sees the most recent picture.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use aeris_core::logfile::RotatingFile;
use aeris_core::supervisor::{push_status, StatusQueue};

struct FanoutLogger {
    stderr: env_logger::Logger,
    logfile: Option<RotatingFile>,
    status: StatusQueue,
}

impl Log for FanoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata) || metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        self.stderr.log(record);
        if record.level() <= Level::Warn {
            let line = format!("{} - {}", record.level(), record.args());
            if let Some(logfile) = &self.logfile {
                let stamped = format!(
                    "{} {line}",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                );
                // A full disk must never take the loop down.
                let _ = logfile.append(&stamped);
            }
            push_status(&self.status, line);
        }
    }

    fn flush(&self) {
        self.stderr.flush();
    }
}

/// Install the fan-out logger. `RUST_LOG` controls the stderr level
/// (default `info`); warnings always reach the file and the queue.
pub fn init(logfile: Option<RotatingFile>, status: StatusQueue) -> Result<(), SetLoggerError> {
    let stderr = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .build();
    let max_level = stderr.filter().max(LevelFilter::Warn);
    log::set_boxed_logger(Box::new(FanoutLogger {
        stderr,
        logfile,
        status,
    }))?;
    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tempfile::tempdir;

    fn make_logger(logfile: Option<RotatingFile>) -> (FanoutLogger, StatusQueue) {
        let status: StatusQueue = Arc::new(Mutex::new(VecDeque::new()));
        let logger = FanoutLogger {
            stderr: env_logger::Builder::new()
                .filter_level(LevelFilter::Off)
                .build(),
            logfile,
            status: status.clone(),
        };
        (logger, status)
    }

    fn record<'a>(level: Level, message: &'a std::fmt::Arguments<'a>) -> Record<'a> {
        Record::builder()
            .level(level)
            .args(*message)
            .target("aeris")
            .build()
    }

    #[test]
    fn warnings_reach_the_queue_and_the_file() {
        let dir = tempdir().unwrap();
        let file = RotatingFile::new(dir.path().join("aeris.log"), 4096, 2);
        let (logger, status) = make_logger(Some(file.clone()));

        logger.log(&record(Level::Warn, &format_args!("sensor sht30 went dark")));

        let queued: Vec<String> = status.lock().unwrap().iter().cloned().collect();
        assert_eq!(queued, vec!["WARN - sensor sht30 went dark".to_string()]);
        let lines = file.tail(5).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("WARN - sensor sht30 went dark"));
    }

    #[test]
    fn info_is_not_mirrored() {
        let (logger, status) = make_logger(None);
        logger.log(&record(Level::Info, &format_args!("tick complete")));
        assert!(status.lock().unwrap().is_empty());
    }
}
