use crate::gateway::insert_or_get;
use edgepay_coordinator::{Participant, Verdict};
use edgepay_error::{database_error, Result};
use edgepay_types::TransactionStatus;
use postgres::{Client, NoTls};

/// Local lifecycle of one `DbParticipant` `NONE → ACTIVE →
/// PREPARED → {COMMITTED | ABORTED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalState {
    None,
    Active,
    Prepared,
    Committed,
    Aborted,
    Failed,
}

/// Wraps one Postgres connection for the lifetime of a single `txn_id`,
/// using the database's native prepared-transaction feature
/// (`PREPARE TRANSACTION` / `COMMIT PREPARED` / `ROLLBACK PREPARED`) to
/// satisfy literally. `postgres::Client` issues are plain SQL
/// statements rather than the crate's own `Transaction` wrapper, because
/// that wrapper assumes it alone decides commit vs. rollback — here the
/// 2PC coordinator decides, potentially much later and from a different
/// call stack.
pub struct DbParticipant {
    client: Client,
    state: LocalState,
    txn_id: Option<String>,
}

impl DbParticipant {
    pub fn connect(db_uri: &str) -> Result<Self> {
        let client = Client::connect(db_uri, NoTls)
            .map_err(|err| database_error(format!("connecting db participant: {err}")))?;
        Ok(DbParticipant {
            client,
            state: LocalState::None,
            txn_id: None,
        })
    }

    /// Opens a local transaction for `txn_id`. One-at-a-time per context:
    /// calling `begin` twice without an intervening commit/abort is an
    /// error.
    pub fn begin(&mut self, txn_id: &str) -> Result<()> {
        if self.state != LocalState::None {
            return Err(database_error("begin called while a local transaction is active"));
        }
        self.client
            .batch_execute("BEGIN")
            .map_err(|err| database_error(format!("BEGIN: {err}")))?;
        self.txn_id = Some(txn_id.to_string());
        self.state = LocalState::Active;
        Ok(())
    }

    /// Inserts the row under the currently ACTIVE local transaction. Must
    /// only be called between `begin` and `prepare`.
    pub fn insert_transaction(
        &mut self,
        request_id: Option<&str>,
        masked_pan: &str,
        amount_cents: i64,
        status: TransactionStatus,
    ) -> Result<(bool, TransactionStatus)> {
        if self.state != LocalState::Active {
            return Err(database_error("insert_transaction called outside ACTIVE state"));
        }
        insert_or_get(&mut self.client, request_id, masked_pan, amount_cents, status)
    }
}

impl Participant for DbParticipant {
    fn name(&self) -> &str {
        "database"
    }

    fn prepare(&mut self, _txn_id: &str) -> Verdict {
        if self.state != LocalState::Active {
            self.state = LocalState::Failed;
            return Verdict::Error("prepare called outside ACTIVE state".to_string());
        }
        let txn_id = self.txn_id.clone().unwrap_or_default();
        let stmt = format!("PREPARE TRANSACTION {}", quote_literal(&txn_id));
        match self.client.batch_execute(&stmt) {
            Ok(()) => {
                self.state = LocalState::Prepared;
                Verdict::Ok
            }
            Err(err) => {
                self.state = LocalState::Failed;
                Verdict::Error(format!("PREPARE TRANSACTION: {err}"))
            }
        }
    }

    fn commit(&mut self, _txn_id: &str) -> Verdict {
        if self.state != LocalState::Prepared {
            return Verdict::Error("commit called outside PREPARED state".to_string());
        }
        let txn_id = self.txn_id.clone().unwrap_or_default();
        let stmt = format!("COMMIT PREPARED {}", quote_literal(&txn_id));
        match self.client.batch_execute(&stmt) {
            Ok(()) => {
                self.state = LocalState::Committed;
                Verdict::Ok
            }
            Err(err) => Verdict::Error(format!("COMMIT PREPARED: {err}")),
        }
    }

    /// Idempotent and unconditional: a no-op abort (no local transaction
    /// was ever opened) returns OK, matching
    fn abort(&mut self, _txn_id: &str) -> Verdict {
        let txn_id = self.txn_id.clone().unwrap_or_default();
        match self.state {
            LocalState::None | LocalState::Aborted | LocalState::Committed => Verdict::Ok,
            LocalState::Active => {
                let _ = self.client.batch_execute("ROLLBACK");
                self.state = LocalState::Aborted;
                Verdict::Ok
            }
            LocalState::Prepared | LocalState::Failed => {
                let stmt = format!("ROLLBACK PREPARED {}", quote_literal(&txn_id));
                let _ = self.client.batch_execute(&stmt);
                self.state = LocalState::Aborted;
                Verdict::Ok
            }
        }
    }
}

/// Quotes a string as a SQL string literal. `txn_id` values are
/// coordinator-generated but embed the client-supplied `request_id`
///, so this cannot be skipped even though `txn_id`
/// never flows through a parameterized placeholder (`PREPARE TRANSACTION`
/// takes a literal, not a bind parameter).
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_literal_escapes_single_quotes() {
        assert_eq!(quote_literal("visa_r1_123"), "'visa_r1_123'");
        assert_eq!(quote_literal("a'b"), "'a''b'");
    }
}
