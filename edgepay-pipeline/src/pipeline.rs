use crate::response::PipelineResponse;
use edgepay_clearing::{CircuitBreaker, ClearingHttpClient, ClearingParticipant};
use edgepay_config::Config;
use edgepay_coordinator::{BeginError, CommitOutcome, Coordinator, RegisterError};
use edgepay_db::DbParticipant;
use edgepay_mask::luhn_check;
use edgepay_metrics::Metrics;
use edgepay_parser::parse_request;
use edgepay_reversal::ReversalQueue;
use edgepay_risk::RiskEngine;
use edgepay_types::{MaskedRequest, TransactionStatus};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound on the decimal amount a request may carry: `0 < amount <=
/// 10000` major units, expressed here in cents.
const MAX_REQUEST_AMOUNT_CENTS: i64 = 10_000 * 100;

/// Base delay for the clearing participant's retry backoff. Only the
/// retry count is configurable; the per-attempt sleep unit is fixed
/// rather than surfaced as its own tunable.
const CLEARING_RETRY_BASE_MS: u64 = 100;

/// The single orchestration path shared by every transport adapter. Holds
/// everything a request needs except the request body itself; transports
/// own framing, this owns what happens to one parsed request.
pub struct Pipeline {
    config: Arc<Config>,
    metrics: Arc<Metrics>,
    risk: RiskEngine,
    coordinator: Arc<Coordinator>,
    clearing_client: Arc<ClearingHttpClient>,
    clearing_breaker: Arc<CircuitBreaker>,
    reversal: Arc<ReversalQueue>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        metrics: Arc<Metrics>,
        coordinator: Arc<Coordinator>,
        clearing_client: Arc<ClearingHttpClient>,
        clearing_breaker: Arc<CircuitBreaker>,
        reversal: Arc<ReversalQueue>,
    ) -> Self {
        let risk = RiskEngine::new(&config);
        Pipeline {
            config,
            metrics,
            risk,
            coordinator,
            clearing_client,
            clearing_breaker,
            reversal,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Runs one request body through parse → Luhn → amount sanity → risk →
    /// 2PC commit Never panics on malformed input; every
    /// rejection path returns a `Declined` response instead.
    pub fn handle(&self, body: &str) -> PipelineResponse {
        self.metrics.incr_total();

        let request = match parse_request(body) {
            Ok(req) => req,
            Err(err) => {
                log::debug!(target: "edgepay_pipeline", "parse failed: {}", err.detail());
                self.metrics.incr_declined();
                return PipelineResponse::declined(err.reason_code());
            }
        };

        if !luhn_check(&request.pan).is_valid() {
            log::debug!(target: "edgepay_pipeline", "luhn check failed for masked pan");
            self.metrics.incr_declined();
            self.metrics.incr_risk_declined();
            return PipelineResponse::declined("luhn_failed");
        }

        let cents = request.amount.cents();
        if !(cents > 0 && cents <= MAX_REQUEST_AMOUNT_CENTS) {
            log::debug!(target: "edgepay_pipeline", "amount {cents} cents out of bounds");
            self.metrics.incr_declined();
            return PipelineResponse::declined("amount_invalid");
        }

        let risk_decision = self.risk.evaluate(&request);
        if !risk_decision.allow {
            let reason = risk_decision.reason.unwrap_or("risk_decline");
            log::debug!(target: "edgepay_pipeline", "risk declined: {reason}");
            self.metrics.incr_declined();
            self.metrics.incr_risk_declined();
            return PipelineResponse::declined(reason);
        }

        let masked = MaskedRequest::from(&request);
        let txn_id = format!(
            "visa_{}_{}",
            request.request_id_or_empty(),
            unix_now(),
        );
        log::debug!(target: "edgepay_pipeline", "txn {txn_id} masked_pan={}", masked.masked_pan);

        let txn = match self.coordinator.begin(txn_id.clone()) {
            Ok(txn) => txn,
            Err(BeginError::Duplicate) | Err(BeginError::CapacityExceeded) => {
                log::debug!(target: "edgepay_pipeline", "txn {txn_id} init failed");
                self.metrics.incr_declined();
                return PipelineResponse::declined("txn_init_failed");
            }
        };

        let mut db_participant = match DbParticipant::connect(&self.config.db_uri) {
            Ok(p) => p,
            Err(err) => {
                log::warn!(target: "edgepay_pipeline", "txn {txn_id} db participant init failed: {err}");
                self.coordinator.abort(&txn);
                self.metrics.incr_declined();
                return PipelineResponse::declined("participant_init_failed");
            }
        };

        if let Err(err) = db_participant.begin(&txn_id) {
            log::warn!(target: "edgepay_pipeline", "txn {txn_id} db begin failed: {err}");
            self.coordinator.abort(&txn);
            self.metrics.incr_declined();
            return PipelineResponse::declined("db_begin_failed");
        }

        let is_duplicate = match db_participant.insert_transaction(
            masked.request_id.as_deref(),
            &masked.masked_pan,
            masked.amount_cents,
            TransactionStatus::Approved,
        ) {
            Ok((is_duplicate, _status)) => is_duplicate,
            Err(err) => {
                log::warn!(target: "edgepay_pipeline", "txn {txn_id} insert failed: {err}");
                self.coordinator.abort(&txn);
                self.metrics.incr_declined();
                return PipelineResponse::declined("db_error");
            }
        };

        let mut clearing_participant = ClearingParticipant::new(
            Arc::clone(&self.clearing_client),
            Arc::clone(&self.clearing_breaker),
            Arc::clone(&self.metrics),
            self.config.clearing_retry_max,
            CLEARING_RETRY_BASE_MS,
        );
        clearing_participant.set_transaction(
            txn_id.clone(),
            masked.masked_pan.clone(),
            masked.amount_cents,
            masked.currency.clone(),
            masked.merchant_id.clone(),
        );

        if let Err(RegisterError::CapacityExceeded) =
            self.coordinator
                .register_participant(&txn, "database", Box::new(db_participant))
        {
            log::warn!(target: "edgepay_pipeline", "txn {txn_id} database registration failed");
            self.coordinator.abort(&txn);
            self.metrics.incr_declined();
            return PipelineResponse::declined("participant_registration_failed");
        }
        if let Err(RegisterError::CapacityExceeded) = self.coordinator.register_participant(
            &txn,
            "clearing",
            Box::new(clearing_participant),
        ) {
            log::warn!(target: "edgepay_pipeline", "txn {txn_id} clearing registration failed");
            self.coordinator.abort(&txn);
            self.metrics.incr_declined();
            return PipelineResponse::declined("participant_registration_failed");
        }

        match self.coordinator.commit(&txn) {
            CommitOutcome::Committed => {
                log::info!(target: "edgepay_pipeline", "txn {txn_id} committed");
                self.metrics.incr_twopc_committed();
                self.metrics.incr_approved();
                PipelineResponse::Approved {
                    txn_id,
                    idempotent: is_duplicate.then_some(true),
                }
            }
            CommitOutcome::Aborted | CommitOutcome::Failed => {
                log::warn!(target: "edgepay_pipeline", "txn {txn_id} did not commit cleanly, enqueueing reversal");
                self.metrics.incr_twopc_aborted();
                self.metrics.incr_declined();
                self.metrics.incr_reversal_enqueued();
                self.reversal.enqueue(edgepay_reversal::ReversalTask::new(
                    txn_id,
                    masked.masked_pan,
                    masked.amount_cents,
                    masked.merchant_id,
                ));
                PipelineResponse::declined("commit_failed")
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
