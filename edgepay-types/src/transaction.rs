use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted disposition of a `TransactionRecord`. There is no `PENDING`
/// state on the persisted row — by the time a row exists it has already
/// been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Approved,
    Declined,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(TransactionStatus::Approved),
            "DECLINED" => Ok(TransactionStatus::Declined),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Row shape for the `transactions` table. `request_id` is
/// `UNIQUE NULLABLE`: at most one row per non-empty `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub request_id: Option<String>,
    pub pan_masked: String,
    pub amount_cents: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}
