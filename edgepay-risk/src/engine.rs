use crate::velocity::VelocityTable;
use edgepay_config::Config;
use edgepay_mask::bin_of;
use edgepay_types::Request;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

const DEFAULT_TABLE_CAPACITY: usize = 100_000;

/// Outcome of evaluating a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub allow: bool,
    pub reason: Option<&'static str>,
    pub risk_score: f64,
}

impl RiskDecision {
    fn allow() -> Self {
        RiskDecision {
            allow: true,
            reason: None,
            // Placeholder score for approved requests.
            risk_score: 0.1,
        }
    }

    fn deny(reason: &'static str) -> Self {
        RiskDecision {
            allow: false,
            reason: Some(reason),
            risk_score: 1.0,
        }
    }
}

/// Deterministic allow/deny engine. Rules run in order; the first decline
/// wins: amount limit, BIN blacklist, velocity.
pub struct RiskEngine {
    enabled: bool,
    max_amount_cents: i64,
    bin_blacklist: HashSet<String>,
    velocity_limit: u32,
    velocity_window: Duration,
    velocity: VelocityTable,
}

impl RiskEngine {
    pub fn new(config: &Config) -> Self {
        RiskEngine {
            enabled: config.risk_enabled,
            max_amount_cents: config.risk_max_amount.cents(),
            bin_blacklist: config.risk_bin_blacklist.clone(),
            velocity_limit: config.risk_velocity_limit,
            velocity_window: Duration::from_secs(config.risk_velocity_window_sec),
            velocity: VelocityTable::new(DEFAULT_TABLE_CAPACITY),
        }
    }

    /// Evaluates `request` against the current wall clock.
    pub fn evaluate(&self, request: &Request) -> RiskDecision {
        self.evaluate_at(request, SystemTime::now())
    }

    /// Evaluates `request` at an explicit instant, so tests can drive the
    /// sliding velocity window deterministically.
    pub fn evaluate_at(&self, request: &Request, now: SystemTime) -> RiskDecision {
        if !self.enabled {
            return RiskDecision::allow();
        }

        if request.amount.cents() > self.max_amount_cents {
            return RiskDecision::deny("amount_limit_exceeded");
        }

        let bin = bin_of(&request.pan);
        if self.bin_blacklist.contains(bin) {
            return RiskDecision::deny("blacklisted_pan");
        }

        let result = self.velocity.record(&request.pan, now, self.velocity_window);
        if result.count_in_window > self.velocity_limit {
            return RiskDecision::deny("velocity_limit_exceeded");
        }

        RiskDecision::allow()
    }
}
