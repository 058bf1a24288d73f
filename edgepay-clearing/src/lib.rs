//! Remote clearing participant: HTTP RPC over
//! `prepare | commit | abort`, guarded by a circuit breaker and bounded
//! exponential-backoff retries with a per-call timeout.

mod breaker;
mod participant;
mod retry;
mod rpc;

pub use breaker::{Admission, BreakerState, CircuitBreaker};
pub use participant::ClearingParticipant;
pub use retry::retry_with_backoff;
pub use rpc::{ClearingHttpClient, ClearingRequest, ClearingResponse};
