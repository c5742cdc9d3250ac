//! Startup replay of the fact log.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use txops_telemetry::Metrics;

use crate::error::PersistenceResult;
use crate::record::LogRecord;
use crate::writer::{FILE_EXTENSION, FILE_PREFIX};

#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Records in file order (oldest day first, then line order).
    pub records: Vec<LogRecord>,
    pub files: usize,
    /// Lines that failed to parse and were skipped.
    pub corrupt_lines: usize,
}

fn log_files(dir: &Path) -> PersistenceResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX));
        if is_log {
            paths.push(path);
        }
    }
    // Date in the name sorts chronologically.
    paths.sort();
    Ok(paths)
}

/// Read every log file under `dir`.
///
/// A missing directory replays nothing. Unparseable lines (e.g. a torn final
/// write) are skipped with a warning.
pub fn replay(dir: impl AsRef<Path>) -> PersistenceResult<ReplayReport> {
    let dir = dir.as_ref();
    let mut report = ReplayReport::default();
    if !dir.exists() {
        return Ok(report);
    }

    for path in log_files(dir)? {
        let reader = BufReader::new(File::open(&path)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(&line) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    report.corrupt_lines += 1;
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping corrupt log line"
                    );
                }
            }
        }
        report.files += 1;
    }

    Metrics::log_replayed(report.records.len());
    info!(
        files = report.files,
        records = report.records.len(),
        corrupt = report.corrupt_lines,
        "Fact log replayed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_fact;
    use crate::writer::JsonLinesLog;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_replay_in_file_order() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();
            // Written out of day order; replay sorts by file date.
            for (id, day) in [(3, 2), (1, 1), (2, 1)] {
                let mut record = LogRecord::new(sample_fact(id));
                record.logged_at = Utc.with_ymd_and_hms(2024, 7, day, 8, 0, 0).unwrap();
                log.add_record(record).unwrap();
                log.flush().unwrap();
            }
        }

        let report = replay(temp_dir.path()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.corrupt_lines, 0);
        let ids: Vec<u64> = report
            .records
            .iter()
            .map(|r| r.fact.transaction_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_replay_skips_corrupt_lines() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut log = JsonLinesLog::new(temp_dir.path(), 100).unwrap();
            log.add_record(LogRecord::new(sample_fact(1))).unwrap();
            log.close().unwrap();
        }
        let path = log_files(temp_dir.path()).unwrap().remove(0);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"logged_at\": \"2024-").unwrap();
        writeln!(file).unwrap();

        // Unrelated files are ignored.
        std::fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();

        let report = replay(temp_dir.path()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.corrupt_lines, 1);
        assert_eq!(report.files, 1);
    }

    #[test]
    fn test_replay_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let report = replay(temp_dir.path().join("absent")).unwrap();
        assert!(report.records.is_empty());
    }
}
