use crate::task::ReversalTask;
use edgepay_clearing::{ClearingHttpClient, ClearingRequest};
use std::sync::Arc;

/// What the reversal queue needs from the clearing side: a direct,
/// success/failure-reporting abort call. This is deliberately *not* the
/// `Participant::abort` used by the coordinator — that one is best-effort
/// and always reports OK; the reversal queue is the one place
/// that needs to know whether the remote abort actually succeeded so it
/// can decide to retry.
pub trait ClearingAbort: Send + Sync {
    fn abort(&self, task: &ReversalTask) -> bool;
}

/// Default implementation, calling the clearing endpoint's `abort` verb
/// directly over HTTP.
pub struct HttpClearingAbort {
    client: Arc<ClearingHttpClient>,
    currency: String,
}

impl HttpClearingAbort {
    pub fn new(client: Arc<ClearingHttpClient>, currency: impl Into<String>) -> Self {
        HttpClearingAbort {
            client,
            currency: currency.into(),
        }
    }
}

impl ClearingAbort for HttpClearingAbort {
    fn abort(&self, task: &ReversalTask) -> bool {
        let body = ClearingRequest {
            txn_id: task.txn_id.clone(),
            pan: task.masked_pan.clone(),
            amount: format!("{}.{:02}", task.amount_cents / 100, (task.amount_cents % 100).abs()),
            currency: self.currency.clone(),
            merchant_id: task.merchant_id.clone(),
        };
        match self.client.call("abort", &body) {
            Ok(_) => true,
            Err(err) => {
                log::warn!(target: "edgepay_reversal", "abort call failed for txn {}: {err}", task.txn_id);
                false
            }
        }
    }
}
