//! Monotonically increasing counters for the edge. Deliberately **not** a
//! set of process statics: callers hold an `Arc<Metrics>` and pass it
//! through the pipeline, so tests can construct an isolated instance
//! instead of sharing global state across test threads.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($field:ident => $method:ident, $inc:ident;)*) => {
        #[derive(Default, Debug)]
        pub struct Metrics {
            $($field: AtomicU64,)*
        }

        /// Point-in-time snapshot, read without locking since every counter
        /// is monotonic.
        #[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
        pub struct MetricsSnapshot {
            $(pub $field: u64,)*
        }

        impl Metrics {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                pub fn $inc(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }

                pub fn $method(&self) -> u64 {
                    self.$field.load(Ordering::Relaxed)
                }
            )*

            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($field: self.$method(),)*
                }
            }
        }
    };
}

counters! {
    total => total, incr_total;
    approved => approved, incr_approved;
    declined => declined, incr_declined;
    server_busy => server_busy, incr_server_busy;
    risk_declined => risk_declined, incr_risk_declined;
    twopc_committed => twopc_committed, incr_twopc_committed;
    twopc_aborted => twopc_aborted, incr_twopc_aborted;
    clearing_cb_short_circuit => clearing_cb_short_circuit, incr_clearing_cb_short_circuit;
    reversal_enqueued => reversal_enqueued, incr_reversal_enqueued;
    reversal_succeeded => reversal_succeeded, incr_reversal_succeeded;
    reversal_failed => reversal_failed, incr_reversal_failed;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment_independently() {
        let m = Metrics::new();
        assert_eq!(m.total(), 0);
        m.incr_total();
        m.incr_total();
        m.incr_approved();
        assert_eq!(m.total(), 2);
        assert_eq!(m.approved(), 1);
        assert_eq!(m.declined(), 0);
    }

    #[test]
    fn snapshot_reflects_live_counters() {
        let m = Metrics::new();
        m.incr_reversal_enqueued();
        m.incr_reversal_succeeded();
        let snap = m.snapshot();
        assert_eq!(snap.reversal_enqueued, 1);
        assert_eq!(snap.reversal_succeeded, 1);
        assert_eq!(snap.reversal_failed, 0);
    }

    #[test]
    fn instances_are_independent() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.incr_total();
        assert_eq!(a.total(), 1);
        assert_eq!(b.total(), 0);
    }
}
