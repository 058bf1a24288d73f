use std::fmt;

/// Outcome of one participant capability call: each returns OK or ERROR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Error(String),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Verdict::Error(msg) => Some(msg),
            Verdict::Ok => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Error(msg) => write!(f, "ERROR({msg})"),
        }
    }
}

/// A resource manager the coordinator drives through PREPARE/COMMIT/ABORT.
/// Implementations own their private context; the coordinator
/// only ever calls these three methods and tracks the resulting state
/// itself (see `ParticipantState`).
pub trait Participant: Send {
    fn name(&self) -> &str;
    fn prepare(&mut self, txn_id: &str) -> Verdict;
    fn commit(&mut self, txn_id: &str) -> Verdict;
    fn abort(&mut self, txn_id: &str) -> Verdict;
}

/// Per-participant state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantState {
    Init,
    Prepared,
    Committed,
    Aborted,
    Failed,
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipantState::Init => "INIT",
            ParticipantState::Prepared => "PREPARED",
            ParticipantState::Committed => "COMMITTED",
            ParticipantState::Aborted => "ABORTED",
            ParticipantState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// A registered participant plus the coordinator's view of its state.
/// Registration order is preserved in the owning transaction's `Vec` and
/// used for deterministic PREPARE/COMMIT/ABORT iteration.
pub struct ParticipantSlot {
    pub name: String,
    pub state: ParticipantState,
    pub participant: Box<dyn Participant>,
}

impl ParticipantSlot {
    pub fn new(name: impl Into<String>, participant: Box<dyn Participant>) -> Self {
        ParticipantSlot {
            name: name.into(),
            state: ParticipantState::Init,
            participant,
        }
    }
}
