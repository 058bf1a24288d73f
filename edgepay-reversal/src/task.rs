use std::time::Instant;

/// One queued compensation. Created when a commit-phase failure
/// leaves the clearing side in an unknown or held state after the DB side
/// may already be committed.
#[derive(Debug, Clone)]
pub struct ReversalTask {
    pub txn_id: String,
    pub masked_pan: String,
    pub amount_cents: i64,
    pub merchant_id: String,
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

impl ReversalTask {
    pub fn new(
        txn_id: impl Into<String>,
        masked_pan: impl Into<String>,
        amount_cents: i64,
        merchant_id: impl Into<String>,
    ) -> Self {
        ReversalTask {
            txn_id: txn_id.into(),
            masked_pan: masked_pan.into(),
            amount_cents,
            merchant_id: merchant_id.into(),
            attempts: 0,
            next_attempt_at: Instant::now(),
        }
    }
}
