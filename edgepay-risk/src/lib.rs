//! Deterministic risk evaluation: amount limit, BIN blacklist,
//! sliding-window velocity per PAN, evaluated in that order with first
//! decline winning.

mod engine;
mod velocity;

pub use engine::RiskDecision;
pub use engine::RiskEngine;
