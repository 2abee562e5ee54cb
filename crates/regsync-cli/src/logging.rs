//! Tracing setup: stderr plus an optional per-day log file.
//!
//! Files are named `regression_progress_{YYYY-MM-DD}.log` and roll over at
//! UTC midnight, so the `/logs?date=` route can serve any day by name.

use chrono::{NaiveDate, Utc};
use regsync_core::config::log_file_name;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Appends to the file for the current UTC day, reopening when the day turns.
pub struct DailyLog {
    dir: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl DailyLog {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(log_file_name(date))
    }

    fn write_on(&self, date: NaiveDate, buf: &[u8]) -> io::Result<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = !matches!(current.as_ref(), Some((day, _)) if *day == date);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(date))?;
            *current = Some((date, file));
        }
        match current.as_mut() {
            Some((_, file)) => file.write_all(buf),
            None => Ok(()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

struct MultiWriter {
    stderr: io::Stderr,
    file: Option<Arc<DailyLog>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.stderr.write_all(buf);
        if let Some(file) = &self.file {
            let _ = file.write_on(Utc::now().date_naive(), buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stderr.flush();
        if let Some(file) = &self.file {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// When `log_dir` is given, every event is also appended to that day's file.
/// A log directory that cannot be created only disables file output.
pub fn init(default_level: tracing::Level, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_ascii_lowercase()));

    let file = log_dir.and_then(|dir| match DailyLog::open(dir) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            eprintln!("warning: cannot open log directory {}: {e}", dir.display());
            None
        }
    });

    let make_writer = BoxMakeWriter::new(move || MultiWriter {
        stderr: io::stderr(),
        file: file.clone(),
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn writes_to_file_named_for_the_day() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = DailyLog::open(dir.path().join("logs")).unwrap();
        log.write_on(day("2026-02-01"), b"first\n").unwrap();
        log.write_on(day("2026-02-01"), b"second\n").unwrap();
        log.flush().unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("logs/regression_progress_2026-02-01.log"))
                .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn rolls_over_when_the_day_changes() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = DailyLog::open(dir.path()).unwrap();
        log.write_on(day("2026-02-01"), b"old\n").unwrap();
        log.write_on(day("2026-02-02"), b"new\n").unwrap();
        log.flush().unwrap();

        let old = std::fs::read_to_string(log.path_for(day("2026-02-01"))).unwrap();
        let new = std::fs::read_to_string(log.path_for(day("2026-02-02"))).unwrap();
        assert_eq!(old, "old\n");
        assert_eq!(new, "new\n");
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("regression_progress_2026-02-01.log"), "earlier\n").unwrap();
        let log = DailyLog::open(dir.path()).unwrap();
        log.write_on(day("2026-02-01"), b"later\n").unwrap();
        log.flush().unwrap();

        let content = std::fs::read_to_string(log.path_for(day("2026-02-01"))).unwrap();
        assert_eq!(content, "earlier\nlater\n");
    }
}
