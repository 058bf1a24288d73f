use crate::participant::ParticipantSlot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Coordinator-level transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionState {
    Init,
    Preparing,
    Prepared,
    Committing,
    Committed,
    Aborting,
    Aborted,
    /// Reached only when a participant's `commit` fails after every
    /// participant successfully PREPAREd. Terminal; the caller is
    /// responsible for enqueuing compensation.
    Failed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Init => "INIT",
            TransactionState::Preparing => "PREPARING",
            TransactionState::Prepared => "PREPARED",
            TransactionState::Committing => "COMMITTING",
            TransactionState::Committed => "COMMITTED",
            TransactionState::Aborting => "ABORTING",
            TransactionState::Aborted => "ABORTED",
            TransactionState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted | TransactionState::Failed
        )
    }
}

/// One in-flight (or terminal, retained for lookup) distributed
/// transaction. `participants` is append-only until a terminal state is
/// reached.
pub struct DistributedTransaction {
    pub txn_id: String,
    pub state: TransactionState,
    pub participants: Vec<ParticipantSlot>,
    pub started_at: DateTime<Utc>,
    pub prepare_deadline: DateTime<Utc>,
    pub commit_deadline: DateTime<Utc>,
}

impl DistributedTransaction {
    pub fn new(
        txn_id: impl Into<String>,
        started_at: DateTime<Utc>,
        prepare_timeout: Duration,
        commit_timeout: Duration,
    ) -> Self {
        let prepare_deadline = started_at
            + chrono::Duration::from_std(prepare_timeout).unwrap_or(chrono::Duration::seconds(30));
        let commit_deadline = started_at
            + chrono::Duration::from_std(commit_timeout).unwrap_or(chrono::Duration::seconds(30));
        DistributedTransaction {
            txn_id: txn_id.into(),
            state: TransactionState::Init,
            participants: Vec::new(),
            started_at,
            prepare_deadline,
            commit_deadline,
        }
    }

    pub fn prepare_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.prepare_deadline
    }
}
