//! Error kinds shared by every crate in the edge: one small `ErrorKind`
//! enum, a single `Error` wrapper carrying a message, and a crate-local
//! `Result<T>` alias.

use derive_more::Display;
use std::fmt;

/// Coarse classification of where a failure originated.
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed or out-of-policy input; never reaches a transaction.
    Request,
    /// Local resource failure: DB connection, local transaction begin, etc.
    Database,
    /// Remote clearing network failure, including circuit-breaker short-circuits.
    Clearing,
    /// 2PC coordinator bookkeeping (capacity, duplicate txn_id, unknown participant).
    Coordinator,
    /// Reversal / compensation queue failure.
    Reversal,
    /// Configuration loading or validation failure.
    Config,
    /// Anything else internal that doesn't fit the above.
    Internal,
}

/// A boxed, context-carrying error. Kept deliberately simple: no backtraces,
/// no downcasting chain — the pipeline only ever needs a kind plus a message
/// for logs and reason codes.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand constructor for an `Internal`-kind error.
pub fn internal_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Internal, message)
}

pub fn database_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Database, message)
}

pub fn clearing_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Clearing, message)
}

pub fn coordinator_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Coordinator, message)
}

pub fn reversal_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Reversal, message)
}

pub fn config_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Config, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = database_error("connection refused");
        assert_eq!(err.kind(), ErrorKind::Database);
        assert_eq!(format!("{}", err), "Database: connection refused");
    }
}
