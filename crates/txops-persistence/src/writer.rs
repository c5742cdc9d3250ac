//! JSON Lines file writer for status-change facts.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if write was interrupted

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;
use crate::record::LogRecord;

/// File name prefix of the daily log files.
pub const FILE_PREFIX: &str = "facts_";
pub const FILE_EXTENSION: &str = "jsonl";

/// Active writer state for daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Append-only fact log, one file per UTC day.
///
/// Records are buffered and written on [`flush`](Self::flush). A failed flush
/// keeps the whole batch buffered for the next attempt.
pub struct JsonLinesLog {
    base_dir: PathBuf,
    buffer: Vec<LogRecord>,
    max_buffer_size: usize,
    /// Open until date rotation.
    active_writer: Option<ActiveWriter>,
}

impl JsonLinesLog {
    /// Open a log rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer a record, flushing when the buffer is full.
    pub fn add_record(&mut self, record: LogRecord) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed fact log file"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let path = self
            .base_dir
            .join(format!("{FILE_PREFIX}{date}.{FILE_EXTENSION}"));

        info!(path = %path.display(), "Opening fact log (append mode)");

        // Append mode: never truncates existing data
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        })
    }

    /// Writer for `date`, rotating away from any other day's file.
    fn writer_for(&mut self, date: &str) -> PersistenceResult<&mut ActiveWriter> {
        if self.active_writer.as_ref().is_some_and(|w| w.date != date) {
            self.close_active_writer();
        }
        let active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open_writer(date)?,
        };
        Ok(self.active_writer.insert(active))
    }

    fn write_records(&mut self, records: &[LogRecord]) -> PersistenceResult<()> {
        for record in records {
            let json = serde_json::to_string(record)?;
            let active = self.writer_for(&record.file_date())?;
            writeln!(active.writer, "{json}")?;
            active.records_written += 1;
        }

        if let Some(active) = self.active_writer.as_mut() {
            active.writer.flush()?;
        }
        Ok(())
    }

    /// Write buffered records to disk.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.buffer);
        match self.write_records(&pending) {
            Ok(()) => {
                debug!(records = pending.len(), "Flushed facts to JSON Lines");
                Ok(())
            }
            Err(e) => {
                // Retry the whole batch; lines already written may repeat.
                self.close_active_writer();
                self.buffer = pending;
                Err(e)
            }
        }
    }

    /// Close the log, flushing any pending data.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl Drop for JsonLinesLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_fact;
    use chrono::{TimeZone, Utc};
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<String> {
        let reader = BufReader::new(File::open(path).unwrap());
        reader.lines().map_while(Result::ok).collect()
    }

    fn files(dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();

        for i in 0..5 {
            log.add_record(LogRecord::new(sample_fact(i))).unwrap();
        }
        assert_eq!(log.pending(), 5);
        log.close().unwrap();
        assert_eq!(log.pending(), 0);

        let paths = files(temp_dir.path());
        assert_eq!(paths.len(), 1);
        let name = paths[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(FILE_PREFIX) && name.ends_with(".jsonl"));

        let lines = read_lines(&paths[0]);
        assert_eq!(lines.len(), 5);
        let record: LogRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record.fact, sample_fact(0));
    }

    #[test]
    fn test_append_mode() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();
            for i in 0..3 {
                log.add_record(LogRecord::new(sample_fact(i))).unwrap();
            }
            log.close().unwrap();
        }
        // Dropped without close: Drop flushes.
        {
            let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();
            for i in 3..6 {
                log.add_record(LogRecord::new(sample_fact(i))).unwrap();
            }
        }

        let total: usize = files(temp_dir.path())
            .iter()
            .map(|p| read_lines(p).len())
            .sum();
        assert_eq!(total, 6, "Should have 6 records total from 2 writes");
    }

    #[test]
    fn test_auto_flush_at_buffer_size() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = JsonLinesLog::new(temp_dir.path(), 2).unwrap();

        log.add_record(LogRecord::new(sample_fact(1))).unwrap();
        assert!(files(temp_dir.path()).is_empty());
        log.add_record(LogRecord::new(sample_fact(2))).unwrap();
        assert_eq!(log.pending(), 0);
        assert_eq!(read_lines(&files(temp_dir.path())[0]).len(), 2);
    }

    #[test]
    fn test_rotates_by_record_date() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();

        for (id, day) in [(1, 1), (2, 1), (3, 2)] {
            let mut record = LogRecord::new(sample_fact(id));
            record.logged_at = Utc.with_ymd_and_hms(2024, 7, day, 12, 0, 0).unwrap();
            log.add_record(record).unwrap();
        }
        log.close().unwrap();

        let paths = files(temp_dir.path());
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("facts_2024-07-01.jsonl"));
        assert_eq!(read_lines(&paths[0]).len(), 2);
        assert_eq!(read_lines(&paths[1]).len(), 1);
    }

    #[test]
    fn test_empty_flush_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();

        log.flush().unwrap();

        assert!(files(temp_dir.path()).is_empty());
    }
}
