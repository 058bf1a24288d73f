use crate::log::TxnLog;
use crate::participant::{Participant, ParticipantSlot, ParticipantState, Verdict};
use crate::transaction::{DistributedTransaction, TransactionState};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Per-transaction participant ceiling ( "Capacity bounds").
pub const MAX_PARTICIPANTS: usize = 8;
/// Coordinator-wide active-transaction ceiling.
pub const MAX_ACTIVE_TRANSACTIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginError {
    Duplicate,
    CapacityExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    CapacityExceeded,
}

/// Result of driving `commit(txn)` to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every participant PREPAREd and COMMITted. Terminal: `COMMITTED`.
    Committed,
    /// A PREPARE failed; everyone PREPARED/FAILED was ABORTed. Terminal:
    /// `ABORTED`. No participant's `commit` was called.
    Aborted,
    /// Every participant PREPAREd but at least one `commit` call failed
    /// after that. Terminal: `FAILED`. The caller must compensate.
    Failed,
}

pub type TxnHandle = Arc<Mutex<DistributedTransaction>>;

/// Drives the two-phase-commit protocol across registered participants.
/// The active set is a `Mutex<HashMap<..>>` of per-transaction handles: the
/// outer lock is held only to look up or insert an entry, so transactions
/// are linearizable per `txn_id` rather than globally — the inner
/// per-transaction lock is what's held across participant RPCs.
pub struct Coordinator {
    active: Mutex<HashMap<String, TxnHandle>>,
    prepare_timeout: Duration,
    commit_timeout: Duration,
    log: TxnLog,
}

impl Coordinator {
    pub fn new(log: TxnLog, prepare_timeout: Duration, commit_timeout: Duration) -> Self {
        Coordinator {
            active: Mutex::new(HashMap::new()),
            prepare_timeout,
            commit_timeout,
            log,
        }
    }

    /// Begins a new distributed transaction. Rejects a reused `txn_id`
    /// with `Duplicate` and an overfull coordinator with
    /// `CapacityExceeded`. A `txn_id` that already reached a terminal
    /// state is not considered reused: it was removed from `active` when
    /// it terminated (see `retire`), so the same `txn_id` submitted again
    /// (the idempotent-replay case) begins a fresh transaction rather
    /// than being rejected.
    pub fn begin(&self, txn_id: impl Into<String>) -> Result<TxnHandle, BeginError> {
        let txn_id = txn_id.into();
        let mut active = self.active.lock();
        if active.contains_key(&txn_id) {
            return Err(BeginError::Duplicate);
        }
        if active.len() >= MAX_ACTIVE_TRANSACTIONS {
            return Err(BeginError::CapacityExceeded);
        }

        let now = Utc::now();
        let txn = Arc::new(Mutex::new(DistributedTransaction::new(
            txn_id.clone(),
            now,
            self.prepare_timeout,
            self.commit_timeout,
        )));
        active.insert(txn_id.clone(), Arc::clone(&txn));
        let _ = self.log.append(&txn_id, "INIT", "begin");
        Ok(txn)
    }

    /// Registers a participant on `txn` in call order. Order is preserved
    /// and drives PREPARE/COMMIT/ABORT iteration.
    pub fn register_participant(
        &self,
        txn: &TxnHandle,
        name: impl Into<String>,
        participant: Box<dyn Participant>,
    ) -> Result<(), RegisterError> {
        let mut txn = txn.lock();
        if txn.participants.len() >= MAX_PARTICIPANTS {
            return Err(RegisterError::CapacityExceeded);
        }
        txn.participants.push(ParticipantSlot::new(name, participant));
        Ok(())
    }

    pub fn get_by_id(&self, txn_id: &str) -> Option<TxnHandle> {
        self.active.lock().get(txn_id).cloned()
    }

    /// Drops a terminal transaction from the active set. Once COMMITTED,
    /// ABORTED, or FAILED, the coordinator has no further use for the
    /// entry: the state log already recorded every transition, and
    /// `tx?request_id` lookups are served by `DbGateway`, not the
    /// coordinator. Without this, `active` grows without bound across the
    /// life of the process and a reused `txn_id` would be rejected as
    /// `Duplicate` forever instead of only while still in flight.
    fn retire(&self, txn_id: &str) {
        self.active.lock().remove(txn_id);
    }

    /// Drives PREPARE then COMMIT (or ABORT) across every registered
    /// participant
    pub fn commit(&self, txn: &TxnHandle) -> CommitOutcome {
        let mut guard = txn.lock();
        let txn_id = guard.txn_id.clone();

        guard.state = TransactionState::Preparing;
        let _ = self.log.append(&txn_id, "PREPARING", "prepare_begin");

        let mut failed_index: Option<usize> = None;
        let now = Utc::now();
        for (i, slot) in guard.participants.iter_mut().enumerate() {
            let verdict = if guard.prepare_expired(now) {
                Verdict::Error("prepare_timeout".to_string())
            } else {
                slot.participant.prepare(&txn_id)
            };
            match verdict {
                Verdict::Ok => {
                    slot.state = ParticipantState::Prepared;
                    let _ = self
                        .log
                        .append(&txn_id, "PREPARED", &format!("participant_prepare_ok:{}", slot.name));
                }
                Verdict::Error(msg) => {
                    slot.state = ParticipantState::Failed;
                    let _ = self.log.append(
                        &txn_id,
                        "PREPARE_FAILED",
                        &format!("participant_prepare_err:{}:{msg}", slot.name),
                    );
                    failed_index = Some(i);
                    break;
                }
            }
        }

        if failed_index.is_some() {
            guard.state = TransactionState::Aborting;
            let _ = self.log.append(&txn_id, "ABORTING", "abort_begin");
            for slot in guard.participants.iter_mut() {
                if matches!(
                    slot.state,
                    ParticipantState::Prepared | ParticipantState::Failed
                ) {
                    let verdict = slot.participant.abort(&txn_id);
                    slot.state = ParticipantState::Aborted;
                    let _ = self.log.append(
                        &txn_id,
                        "ABORTED",
                        &format!("participant_abort:{}:{verdict}", slot.name),
                    );
                }
            }
            guard.state = TransactionState::Aborted;
            let _ = self.log.append(&txn_id, "ABORTED", "abort_done");
            drop(guard);
            self.retire(&txn_id);
            return CommitOutcome::Aborted;
        }

        guard.state = TransactionState::Prepared;
        let _ = self.log.append(&txn_id, "PREPARED", "prepare_done");

        guard.state = TransactionState::Committing;
        let _ = self.log.append(&txn_id, "COMMITTING", "commit_begin");

        let mut any_commit_failed = false;
        for slot in guard.participants.iter_mut() {
            let verdict = slot.participant.commit(&txn_id);
            match verdict {
                Verdict::Ok => {
                    slot.state = ParticipantState::Committed;
                    let _ = self
                        .log
                        .append(&txn_id, "COMMITTED", &format!("participant_commit_ok:{}", slot.name));
                }
                Verdict::Error(msg) => {
                    any_commit_failed = true;
                    let _ = self.log.append(
                        &txn_id,
                        "COMMIT_FAILED",
                        &format!("participant_commit_err:{}:{msg}", slot.name),
                    );
                }
            }
        }

        let outcome = if any_commit_failed {
            guard.state = TransactionState::Failed;
            let _ = self.log.append(&txn_id, "FAILED", "commit_incomplete");
            CommitOutcome::Failed
        } else {
            guard.state = TransactionState::Committed;
            let _ = self.log.append(&txn_id, "COMMITTED", "commit_done");
            CommitOutcome::Committed
        };
        drop(guard);
        self.retire(&txn_id);
        outcome
    }

    /// Drives ABORT directly, for setup failures before PREPARE is ever
    /// attempted ( step 7/8: local resource errors abort the
    /// coordinator transaction).
    pub fn abort(&self, txn: &TxnHandle) {
        let mut guard = txn.lock();
        let txn_id = guard.txn_id.clone();
        guard.state = TransactionState::Aborting;
        let _ = self.log.append(&txn_id, "ABORTING", "abort_begin");
        for slot in guard.participants.iter_mut() {
            if matches!(
                slot.state,
                ParticipantState::Prepared | ParticipantState::Failed | ParticipantState::Init
            ) {
                let verdict = slot.participant.abort(&txn_id);
                slot.state = ParticipantState::Aborted;
                let _ = self.log.append(
                    &txn_id,
                    "ABORTED",
                    &format!("participant_abort:{}:{verdict}", slot.name),
                );
            }
        }
        guard.state = TransactionState::Aborted;
        let _ = self.log.append(&txn_id, "ABORTED", "abort_done");
        drop(guard);
        self.retire(&txn_id);
    }

    pub fn log(&self) -> &TxnLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeParticipant {
        name: String,
        prepare_ok: bool,
        commit_ok: bool,
        calls: Vec<&'static str>,
    }

    impl FakeParticipant {
        fn new(name: &str, prepare_ok: bool, commit_ok: bool) -> Self {
            FakeParticipant {
                name: name.to_string(),
                prepare_ok,
                commit_ok,
                calls: Vec::new(),
            }
        }
    }

    impl Participant for FakeParticipant {
        fn name(&self) -> &str {
            &self.name
        }

        fn prepare(&mut self, _txn_id: &str) -> Verdict {
            self.calls.push("prepare");
            if self.prepare_ok {
                Verdict::Ok
            } else {
                Verdict::Error("prepare failed".into())
            }
        }

        fn commit(&mut self, _txn_id: &str) -> Verdict {
            self.calls.push("commit");
            if self.commit_ok {
                Verdict::Ok
            } else {
                Verdict::Error("commit failed".into())
            }
        }

        fn abort(&mut self, _txn_id: &str) -> Verdict {
            self.calls.push("abort");
            Verdict::Ok
        }
    }

    fn new_coordinator(dir: &tempfile::TempDir) -> Coordinator {
        let log = TxnLog::open(dir.path().join("txn.log")).unwrap();
        Coordinator::new(log, Duration::from_secs(5), Duration::from_secs(5))
    }

    #[test]
    fn commit_succeeds_when_all_participants_agree() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        let txn = coord.begin("txn1").unwrap();
        coord
            .register_participant(&txn, "db", Box::new(FakeParticipant::new("db", true, true)))
            .unwrap();
        coord
            .register_participant(
                &txn,
                "clearing",
                Box::new(FakeParticipant::new("clearing", true, true)),
            )
            .unwrap();

        let outcome = coord.commit(&txn);
        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(txn.lock().state, TransactionState::Committed);
    }

    #[test]
    fn duplicate_txn_id_is_rejected_while_still_active() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        coord.begin("txn1").unwrap();
        assert_eq!(coord.begin("txn1").unwrap_err(), BeginError::Duplicate);
    }

    #[test]
    fn terminal_transaction_is_retired_and_its_txn_id_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        let txn = coord.begin("txn1").unwrap();
        coord
            .register_participant(&txn, "db", Box::new(FakeParticipant::new("db", true, true)))
            .unwrap();
        assert_eq!(coord.commit(&txn), CommitOutcome::Committed);

        // A committed transaction no longer occupies the active set: the
        // coordinator has no lookup use for it (tx?request_id goes through
        // DbGateway), and the same txn_id must be usable again rather
        // than rejected as Duplicate forever.
        assert!(coord.get_by_id("txn1").is_none());
        assert!(coord.begin("txn1").is_ok());
    }

    #[test]
    fn prepare_failure_aborts_only_prepared_and_failed_participants() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        let txn = coord.begin("txn1").unwrap();
        coord
            .register_participant(&txn, "db", Box::new(FakeParticipant::new("db", true, true)))
            .unwrap();
        coord
            .register_participant(
                &txn,
                "clearing",
                Box::new(FakeParticipant::new("clearing", false, true)),
            )
            .unwrap();

        let outcome = coord.commit(&txn);
        assert_eq!(outcome, CommitOutcome::Aborted);
        let guard = txn.lock();
        assert_eq!(guard.state, TransactionState::Aborted);
        // Neither participant's commit should ever have been called.
        for slot in &guard.participants {
            assert_eq!(slot.state, ParticipantState::Aborted);
        }
    }

    #[test]
    fn commit_failure_after_prepare_marks_transaction_failed() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        let txn = coord.begin("txn1").unwrap();
        coord
            .register_participant(&txn, "db", Box::new(FakeParticipant::new("db", true, true)))
            .unwrap();
        coord
            .register_participant(
                &txn,
                "clearing",
                Box::new(FakeParticipant::new("clearing", true, false)),
            )
            .unwrap();

        let outcome = coord.commit(&txn);
        assert_eq!(outcome, CommitOutcome::Failed);
        assert_eq!(txn.lock().state, TransactionState::Failed);
    }

    #[test]
    fn participant_capacity_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let coord = new_coordinator(&dir);
        let txn = coord.begin("txn1").unwrap();
        for i in 0..MAX_PARTICIPANTS {
            coord
                .register_participant(
                    &txn,
                    format!("p{i}"),
                    Box::new(FakeParticipant::new("p", true, true)),
                )
                .unwrap();
        }
        let result = coord.register_participant(
            &txn,
            "overflow",
            Box::new(FakeParticipant::new("overflow", true, true)),
        );
        assert_eq!(result.unwrap_err(), RegisterError::CapacityExceeded);
    }
}
