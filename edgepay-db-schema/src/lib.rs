//! Schema constants for the two tables the edge owns: the transaction
//! ledger (`TransactionRecord`) and the coordinator's append-only
//! transition log. Kept as a standalone crate so table/column names and
//! DDL for Postgres live in one place shared by the gateway, the
//! participant, and the recovery scanner.

/// Column name alias type.
pub type Column = &'static str;

pub mod transactions {
    use super::Column;

    pub const TABLE: &str = "transactions";

    pub const COL_REQUEST_ID: Column = "request_id";
    pub const COL_PAN_MASKED: Column = "pan_masked";
    pub const COL_AMOUNT: Column = "amount";
    pub const COL_STATUS: Column = "status";
    pub const COL_CREATED_AT: Column = "created_at";

    /// DDL executed at startup (`CREATE TABLE IF NOT EXISTS`). `request_id`
    /// is `UNIQUE` but `NULL`able per the spec's idempotency invariant: it
    /// only dedups for non-empty request ids.
    pub const CREATE_TABLE_SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id          BIGSERIAL PRIMARY KEY,
            request_id  TEXT UNIQUE,
            pan_masked  TEXT NOT NULL,
            amount      NUMERIC NOT NULL,
            status      TEXT NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#;
}

pub mod txn_log {
    pub const TABLE: &str = "coordinator_log";

    /// Fallback DDL for a durable log table; the default deployment instead
    /// uses an append-only file (`edgepay_coordinator::log::TxnLog`). Kept
    /// here so a DB-backed log can be swapped in without inventing a schema
    /// later.
    pub const CREATE_TABLE_SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS coordinator_log (
            id          BIGSERIAL PRIMARY KEY,
            ts          TIMESTAMPTZ NOT NULL,
            txn_id      TEXT NOT NULL,
            state       TEXT NOT NULL,
            action      TEXT NOT NULL
        )
    "#;
}
