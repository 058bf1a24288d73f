//! Operator-assisted recovery: the coordinator does **not** automatically
//! re-issue the last verb to each participant on restart. The log is
//! sufficient to *enumerate* in-doubt transactions; resolving them is a
//! manual/operator action. This module implements exactly the enumeration
//! half.

use crate::log::LogEntry;
use edgepay_error::{coordinator_error, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// A transaction whose last logged state was `PREPARED` with no later
/// terminal (`COMMITTED`/`ABORTED`/`FAILED`) entry — i.e. the coordinator
/// asked every participant to prepare but never recorded a final verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InDoubtTransaction {
    pub txn_id: String,
    pub last_state: String,
    pub last_action: String,
}

/// Reads a txn log file front to back and reports every `txn_id` whose
/// most recent entry is non-terminal. Does not mutate the log or contact
/// any participant.
pub fn scan_in_doubt(path: impl AsRef<Path>) -> Result<Vec<InDoubtTransaction>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|err| coordinator_error(format!("opening txn log {}: {err}", path.display())))?;
    let reader = std::io::BufReader::new(file);

    let mut last_by_txn: HashMap<String, LogEntry> = HashMap::new();
    for line in reader.lines() {
        let line = line.map_err(|err| coordinator_error(format!("reading txn log: {err}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(&line)
            .map_err(|err| coordinator_error(format!("parsing txn log entry: {err}")))?;
        last_by_txn.insert(entry.txn_id.clone(), entry);
    }

    let mut in_doubt: Vec<InDoubtTransaction> = last_by_txn
        .into_values()
        .filter(|entry| !matches!(entry.state.as_str(), "COMMITTED" | "ABORTED" | "FAILED"))
        .map(|entry| InDoubtTransaction {
            txn_id: entry.txn_id,
            last_state: entry.state,
            last_action: entry.action,
        })
        .collect();
    in_doubt.sort_by(|a, b| a.txn_id.cmp(&b.txn_id));
    Ok(in_doubt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::TxnLog;

    #[test]
    fn finds_transactions_stuck_at_prepared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txn.log");
        let log = TxnLog::open(&path).unwrap();
        log.append("txn1", "PREPARED", "prepare_ok").unwrap();
        log.append("txn1", "COMMITTED", "commit_ok").unwrap();
        log.append("txn2", "PREPARED", "prepare_ok").unwrap();

        let in_doubt = scan_in_doubt(&path).unwrap();
        assert_eq!(in_doubt.len(), 1);
        assert_eq!(in_doubt[0].txn_id, "txn2");
        assert_eq!(in_doubt[0].last_state, "PREPARED");
    }

    #[test]
    fn empty_log_has_no_in_doubt_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txn.log");
        TxnLog::open(&path).unwrap();
        let in_doubt = scan_in_doubt(&path).unwrap();
        assert!(in_doubt.is_empty());
    }
}
