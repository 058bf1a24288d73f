//! Two-phase-commit coordinator: registers participants in
//! call order, drives PREPARE→COMMIT or PREPARE-failure→ABORT, and
//! appends every state transition to a durable, fsync'd log.

mod coordinator;
mod log;
mod participant;
pub mod recovery;
mod transaction;

pub use coordinator::{
    BeginError, Coordinator, CommitOutcome, RegisterError, TxnHandle, MAX_ACTIVE_TRANSACTIONS,
    MAX_PARTICIPANTS,
};
pub use log::{LogEntry, TxnLog};
pub use participant::{Participant, ParticipantSlot, ParticipantState, Verdict};
pub use transaction::{DistributedTransaction, TransactionState};
