use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// `pan -> (window_start, count)`, kept as a fixed-capacity table
/// so one card number spammed with distinct `request_id`s cannot grow the
/// engine's memory without bound; when full, the entry with the oldest
/// `window_start` is evicted to make room.
pub struct VelocityTable {
    capacity: usize,
    entries: Mutex<HashMap<String, VelocityEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct VelocityEntry {
    window_start: SystemTime,
    count: u32,
}

/// Outcome of recording one request against the velocity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityResult {
    pub count_in_window: u32,
}

impl VelocityTable {
    pub fn new(capacity: usize) -> Self {
        VelocityTable {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
        }
    }

    /// Records one request for `pan` at time `now` and returns the count of
    /// requests observed in the current window, including this one. Opens
    /// a new window if none exists, the window has expired, or the table
    /// had to evict to make room for a first-seen PAN.
    pub fn record(&self, pan: &str, now: SystemTime, window: Duration) -> VelocityResult {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(pan) {
            let elapsed = now
                .duration_since(entry.window_start)
                .unwrap_or(Duration::ZERO);
            if elapsed >= window {
                entry.window_start = now;
                entry.count = 1;
            } else {
                entry.count += 1;
            }
            return VelocityResult {
                count_in_window: entry.count,
            };
        }

        if entries.len() >= self.capacity {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.window_start)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            pan.to_string(),
            VelocityEntry {
                window_start: now,
                count: 1,
            },
        );
        VelocityResult { count_in_window: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_opens_a_window() {
        let table = VelocityTable::new(16);
        let now = SystemTime::UNIX_EPOCH;
        let result = table.record("411111", now, Duration::from_secs(60));
        assert_eq!(result.count_in_window, 1);
    }

    #[test]
    fn requests_within_window_increment() {
        let table = VelocityTable::new(16);
        let now = SystemTime::UNIX_EPOCH;
        table.record("411111", now, Duration::from_secs(60));
        let result = table.record("411111", now + Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(result.count_in_window, 2);
    }

    #[test]
    fn window_resets_after_expiry() {
        let table = VelocityTable::new(16);
        let now = SystemTime::UNIX_EPOCH;
        table.record("411111", now, Duration::from_secs(60));
        table.record("411111", now + Duration::from_secs(10), Duration::from_secs(60));
        let result = table.record("411111", now + Duration::from_secs(61), Duration::from_secs(60));
        assert_eq!(result.count_in_window, 1);
    }

    #[test]
    fn eviction_replaces_oldest_window_when_full() {
        let table = VelocityTable::new(2);
        let now = SystemTime::UNIX_EPOCH;
        table.record("pan_a", now, Duration::from_secs(60));
        table.record("pan_b", now + Duration::from_secs(1), Duration::from_secs(60));
        // Table is full; pan_c should evict pan_a (oldest window_start).
        table.record("pan_c", now + Duration::from_secs(2), Duration::from_secs(60));
        let result = table.record("pan_a", now + Duration::from_secs(3), Duration::from_secs(60));
        assert_eq!(result.count_in_window, 1, "pan_a should have been evicted and reopened");
    }
}
