use chrono::{DateTime, Utc};
use edgepay_error::{coordinator_error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One append-only durability record: `(timestamp,
/// txn_id, state, action)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub txn_id: String,
    pub state: String,
    pub action: String,
}

/// Append-only file-backed transaction log. Each `append` call writes one
/// JSON line and `fsync`s before returning. This is what makes in-doubt
/// transactions enumerable at restart — see `crate::recovery`.
pub struct TxnLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl TxnLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| coordinator_error(format!("opening txn log {}: {err}", path.display())))?;
        Ok(TxnLog {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, txn_id: &str, state: &str, action: &str) -> Result<()> {
        let entry = LogEntry {
            ts: Utc::now(),
            txn_id: txn_id.to_string(),
            state: state.to_string(),
            action: action.to_string(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|err| coordinator_error(format!("serializing log entry: {err}")))?;
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|err| coordinator_error(format!("writing txn log: {err}")))?;
        file.sync_data()
            .map_err(|err| coordinator_error(format!("fsync txn log: {err}")))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_back_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txn.log");
        let log = TxnLog::open(&path).unwrap();
        log.append("txn1", "PREPARED", "prepare_ok").unwrap();
        log.append("txn1", "COMMITTED", "commit_ok").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.txn_id, "txn1");
        assert_eq!(first.state, "PREPARED");
    }
}
