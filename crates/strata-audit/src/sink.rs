// sink.rs — Where audit records go.
//
// The sink is the single pluggable point of the audit extension. The JSONL
// sink is the production shape: one JSON object per line, append-only,
// flushed after every record so a crash loses nothing already reported.
// The memory sink exists for tests and assertions.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AuditError;
use crate::record::AuditRecord;

/// Writes one audit record somewhere durable (or not, for tests).
pub trait AuditSink: Send {
    fn write(&mut self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Append-only JSONL audit log.
pub struct JsonlAuditSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlAuditSink {
    /// Open (or create) an audit log at the given path. Existing content is
    /// never overwritten; new records append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Read all records from a log file, oldest first. Blank lines are
    /// skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|source| AuditError::ReadFailed {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }
}

impl AuditSink for JsonlAuditSink {
    fn write(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{json}").map_err(|source| AuditError::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        self.writer
            .flush()
            .map_err(|source| AuditError::WriteFailed {
                path: self.path.clone(),
                source,
            })
    }
}

/// In-memory sink for tests. Clones share one record list, so a test can
/// keep a handle while the extension owns the sink.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditAction;
    use strata_workspace::WorkspaceId;
    use tempfile::tempdir;

    fn test_record(key: &str) -> AuditRecord {
        AuditRecord::new(WorkspaceId::new(), "Customer", key, AuditAction::Added)
    }

    #[test]
    fn jsonl_sink_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut sink = JsonlAuditSink::open(&path).unwrap();
        sink.write(&test_record("1")).unwrap();
        sink.write(&test_record("2")).unwrap();

        let records = JsonlAuditSink::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_key, "1");
        assert_eq!(records[1].entity_key, "2");
    }

    #[test]
    fn jsonl_sink_appends_across_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut sink = JsonlAuditSink::open(&path).unwrap();
            sink.write(&test_record("1")).unwrap();
        }
        {
            let mut sink = JsonlAuditSink::open(&path).unwrap();
            sink.write(&test_record("2")).unwrap();
        }

        let records = JsonlAuditSink::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn memory_sink_shares_records_across_clones() {
        let sink = MemoryAuditSink::new();
        let mut writer = sink.clone();
        writer.write(&test_record("1")).unwrap();

        assert_eq!(sink.records().len(), 1);
    }
}
