use crate::breaker::{Admission, CircuitBreaker};
use crate::retry::retry_with_backoff;
use crate::rpc::{ClearingHttpClient, ClearingRequest};
use edgepay_coordinator::{Participant, Verdict};
use edgepay_metrics::Metrics;
use std::sync::Arc;

/// Pending transaction details set by `set_transaction` before `prepare`
/// is ever called.
#[derive(Debug, Clone)]
struct PendingTransaction {
    txn_id: String,
    masked_pan: String,
    amount_cents: i64,
    currency: String,
    merchant_id: String,
}

/// Speaks `prepare | commit | abort` to the remote clearing network,
/// guarded by a circuit breaker shared across every participant instance
/// for the same endpoint and a bounded exponential-backoff retry.
pub struct ClearingParticipant {
    client: Arc<ClearingHttpClient>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<Metrics>,
    max_retries: u32,
    retry_base_ms: u64,
    pending: Option<PendingTransaction>,
    has_hold: bool,
}

impl ClearingParticipant {
    pub fn new(
        client: Arc<ClearingHttpClient>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<Metrics>,
        max_retries: u32,
        retry_base_ms: u64,
    ) -> Self {
        ClearingParticipant {
            client,
            breaker,
            metrics,
            max_retries,
            retry_base_ms,
            pending: None,
            has_hold: false,
        }
    }

    /// Must be called before `prepare`.
    pub fn set_transaction(
        &mut self,
        txn_id: impl Into<String>,
        masked_pan: impl Into<String>,
        amount_cents: i64,
        currency: impl Into<String>,
        merchant_id: impl Into<String>,
    ) {
        self.pending = Some(PendingTransaction {
            txn_id: txn_id.into(),
            masked_pan: masked_pan.into(),
            amount_cents,
            currency: currency.into(),
            merchant_id: merchant_id.into(),
        });
    }

    fn body(&self, pending: &PendingTransaction) -> ClearingRequest {
        ClearingRequest {
            txn_id: pending.txn_id.clone(),
            pan: pending.masked_pan.clone(),
            amount: format_cents(pending.amount_cents),
            currency: pending.currency.clone(),
            merchant_id: pending.merchant_id.clone(),
        }
    }

    /// Runs one verb through the circuit breaker and retry policy. A
    /// short-circuited breaker counts toward `clearing_cb_short_circuit`
    /// and fails without attempting the remote at all.
    fn call_guarded(&self, verb: &str, body: &ClearingRequest) -> Result<(), String> {
        if self.breaker.admit() == Admission::ShortCircuited {
            self.metrics.incr_clearing_cb_short_circuit();
            return Err("circuit_open".to_string());
        }

        let result = retry_with_backoff(self.max_retries, self.retry_base_ms, |_attempt| {
            self.client.call(verb, body).map(|_| ())
        });

        match &result {
            Ok(()) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

impl Participant for ClearingParticipant {
    fn name(&self) -> &str {
        "clearing"
    }

    fn prepare(&mut self, txn_id: &str) -> Verdict {
        let pending = match &self.pending {
            Some(p) if p.txn_id == txn_id => p.clone(),
            Some(_) | None => {
                return Verdict::Error("prepare called before set_transaction".to_string())
            }
        };
        let body = self.body(&pending);
        match self.call_guarded("prepare", &body) {
            Ok(()) => {
                self.has_hold = true;
                Verdict::Ok
            }
            Err(err) => Verdict::Error(err),
        }
    }

    fn commit(&mut self, txn_id: &str) -> Verdict {
        let pending = match &self.pending {
            Some(p) if p.txn_id == txn_id && self.has_hold => p.clone(),
            _ => return Verdict::Error("commit called without a held prepare".to_string()),
        };
        let body = self.body(&pending);
        match self.call_guarded("commit", &body) {
            Ok(()) => {
                self.has_hold = false;
                self.pending = None;
                Verdict::Ok
            }
            Err(err) => Verdict::Error(err),
        }
    }

    /// Idempotent and best-effort: clears local state
    /// unconditionally and always returns OK, even if the remote abort
    /// itself fails — the reversal queue is the remedy in that case.
    fn abort(&mut self, _txn_id: &str) -> Verdict {
        if let Some(pending) = self.pending.take() {
            let body = self.body(&pending);
            let _ = self.call_guarded("abort", &body);
        }
        self.has_hold = false;
        Verdict::Ok
    }
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ClearingHttpClient;
    use std::time::Duration;

    fn participant() -> ClearingParticipant {
        ClearingParticipant::new(
            Arc::new(ClearingHttpClient::new("http://127.0.0.1:1", Duration::from_millis(10))),
            Arc::new(CircuitBreaker::new(Duration::from_secs(60), 3, Duration::from_secs(30))),
            Arc::new(Metrics::new()),
            0,
            1,
        )
    }

    #[test]
    fn prepare_without_set_transaction_fails() {
        let mut p = participant();
        let verdict = p.prepare("txn1");
        assert!(!verdict.is_ok());
    }

    #[test]
    fn commit_without_hold_fails() {
        let mut p = participant();
        p.set_transaction("txn1", "411111******1111", 1000, "USD", "MERCHANT001");
        let verdict = p.commit("txn1");
        assert!(!verdict.is_ok());
    }

    #[test]
    fn abort_without_any_hold_is_a_no_op_ok() {
        let mut p = participant();
        assert!(p.abort("txn1").is_ok());
    }

    #[test]
    fn format_cents_pads_single_digit_cents() {
        assert_eq!(format_cents(1005), "10.05");
        assert_eq!(format_cents(1000), "10.00");
    }
}
