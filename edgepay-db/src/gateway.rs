use edgepay_db_schema::transactions;
use edgepay_error::{database_error, Result};
use edgepay_types::{TransactionRecord, TransactionStatus};
use parking_lot::Mutex;
use postgres::{Client, NoTls};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::thread::{self, ThreadId};

/// Converts integer minor units (cents) to the exact `NUMERIC` value
/// stored in the `amount` column. `Decimal::new(cents, 2)` is
/// `cents * 10^-2` computed in fixed-point, so this never goes through
/// `f64` and can't round-trip-lose precision the way `cents as f64 /
/// 100.0` can for large amounts.
fn cents_to_decimal(amount_cents: i64) -> Decimal {
    Decimal::new(amount_cents, 2)
}

/// Inverse of `cents_to_decimal`: reads the `NUMERIC` column back into
/// integer cents without an `f64` intermediary.
fn decimal_to_cents(amount: Decimal) -> Result<i64> {
    (amount * Decimal::from(100))
        .round_dp(0)
        .to_i64()
        .ok_or_else(|| database_error(format!("amount {amount} out of i64 cents range")))
}

/// Supplies one `postgres::Client` per worker thread, built lazily from a
/// shared bootstrap URI. The worker pool is a fixed set of blocking OS
/// threads, so binding one connection per `ThreadId` for the life of the
/// process is enough — there is no async task migration to account for.
pub struct DbGateway {
    db_uri: String,
    connections: Mutex<HashMap<ThreadId, Client>>,
}

impl DbGateway {
    pub fn new(db_uri: impl Into<String>) -> Self {
        DbGateway {
            db_uri: db_uri.into(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the `transactions` table if it doesn't already exist. Meant
    /// to run once at startup on any connection.
    pub fn ensure_schema(&self) -> Result<()> {
        self.with_connection(|client| {
            client
                .batch_execute(transactions::CREATE_TABLE_SQL)
                .map_err(|err| database_error(format!("creating schema: {err}")))
        })
    }

    /// Runs `f` against the calling thread's dedicated connection,
    /// opening one lazily on first use.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Client) -> Result<T>) -> Result<T> {
        let thread_id = thread::current().id();
        let mut connections = self.connections.lock();
        if !connections.contains_key(&thread_id) {
            let client = Client::connect(&self.db_uri, NoTls)
                .map_err(|err| database_error(format!("connecting to database: {err}")))?;
            connections.insert(thread_id, client);
        }
        let client = connections.get_mut(&thread_id).expect("just inserted");
        f(client)
    }

    /// Atomically inserts a new row or, on a unique-key conflict on
    /// `request_id`, returns the existing row's status. A missing/empty
    /// `request_id` never dedups — every such request inserts a fresh row.
    pub fn insert_or_get_by_request_id(
        &self,
        request_id: Option<&str>,
        masked_pan: &str,
        amount_cents: i64,
        status: TransactionStatus,
    ) -> Result<(bool, TransactionStatus)> {
        self.with_connection(|client| {
            insert_or_get(client, request_id, masked_pan, amount_cents, status)
        })
    }

    /// Backing lookup for the `tx?request_id=...` operational endpoint
    ///. Returns `None` if no row carries that `request_id`.
    pub fn lookup_by_request_id(&self, request_id: &str) -> Result<Option<TransactionRecord>> {
        self.with_connection(|client| {
            let row = client
                .query_opt(
                    &format!(
                        "SELECT {}, {}, {}, {}, {} FROM {} WHERE {} = $1",
                        transactions::COL_REQUEST_ID,
                        transactions::COL_PAN_MASKED,
                        transactions::COL_AMOUNT,
                        transactions::COL_STATUS,
                        transactions::COL_CREATED_AT,
                        transactions::TABLE,
                        transactions::COL_REQUEST_ID,
                    ),
                    &[&request_id],
                )
                .map_err(|err| database_error(format!("lookup_by_request_id: {err}")))?;

            let Some(row) = row else {
                return Ok(None);
            };
            let amount: Decimal = row.get(2);
            let status: String = row.get(3);
            Ok(Some(TransactionRecord {
                request_id: row.get(0),
                pan_masked: row.get(1),
                amount_cents: decimal_to_cents(amount)?,
                status: TransactionStatus::from_str(&status).map_err(database_error)?,
                created_at: row.get(4),
            }))
        })
    }

    /// Liveness probe used by the `ready` operational endpoint: whether the
    /// calling thread's connection can still round-trip a trivial query.
    pub fn is_ready(&self) -> bool {
        self.with_connection(|client| {
            client
                .simple_query("SELECT 1")
                .map(|_| ())
                .map_err(|err| database_error(format!("readiness probe: {err}")))
        })
        .is_ok()
    }
}

/// Runs the idempotent insert against an already-open client or
/// transaction. Shared by `DbGateway` and `DbParticipant` so both paths
/// use identical SQL.
pub(crate) fn insert_or_get<C: postgres::GenericClient>(
    client: &mut C,
    request_id: Option<&str>,
    masked_pan: &str,
    amount_cents: i64,
    status: TransactionStatus,
) -> Result<(bool, TransactionStatus)> {
    let amount = cents_to_decimal(amount_cents);
    match request_id {
        Some(rid) if !rid.is_empty() => {
            let row = client
                .query_opt(
                    &format!(
                        "INSERT INTO {} ({}, {}, {}, {}) VALUES ($1, $2, $3, $4) \
                         ON CONFLICT ({}) DO NOTHING RETURNING {}",
                        transactions::TABLE,
                        transactions::COL_REQUEST_ID,
                        transactions::COL_PAN_MASKED,
                        transactions::COL_AMOUNT,
                        transactions::COL_STATUS,
                        transactions::COL_REQUEST_ID,
                        transactions::COL_STATUS,
                    ),
                    &[&rid, &masked_pan, &amount, &status.as_str()],
                )
                .map_err(|err| database_error(format!("insert_or_get: {err}")))?;

            match row {
                Some(_) => Ok((false, status)),
                None => {
                    let existing = client
                        .query_one(
                            &format!(
                                "SELECT {} FROM {} WHERE {} = $1",
                                transactions::COL_STATUS,
                                transactions::TABLE,
                                transactions::COL_REQUEST_ID,
                            ),
                            &[&rid],
                        )
                        .map_err(|err| database_error(format!("lookup existing row: {err}")))?;
                    let existing_status: String = existing.get(0);
                    let status = TransactionStatus::from_str(&existing_status)
                        .map_err(database_error)?;
                    Ok((true, status))
                }
            }
        }
        _ => {
            client
                .execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3)",
                        transactions::TABLE,
                        transactions::COL_PAN_MASKED,
                        transactions::COL_AMOUNT,
                        transactions::COL_STATUS,
                    ),
                    &[&masked_pan, &amount, &status.as_str()],
                )
                .map_err(|err| database_error(format!("insert (no request_id): {err}")))?;
            Ok((false, status))
        }
    }
}
