//! Per-sender sliding-window rate limiting.
//!
//! Each sender owns a queue of admission timestamps. A request is admitted while fewer
//! than `max_requests` timestamps fall inside the trailing window. Histories live in a
//! sharded [`DashMap`]; the prune/check/append sequence for a sender runs under that
//! sender's entry lock, so two concurrent requests can never both take the last slot.

use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Limits applied to every sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window. Zero disables limiting.
    pub max_requests: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Whether limiting is disabled.
    pub fn is_unlimited(&self) -> bool {
        self.max_requests == 0
    }
}

/// Sliding-window limiter keyed by sender ID.
pub struct RateLimiter {
    config: RateLimitConfig,
    records: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Decide whether `sender_id` may make a request at `now`, recording it if so.
    ///
    /// Rejections leave the sender's history untouched apart from dropping expired entries.
    pub fn admit(&self, sender_id: &str, now: Instant) -> bool {
        if self.config.is_unlimited() {
            return true;
        }
        let max = self.config.max_requests as usize;
        let window = self.config.window;

        match self.records.entry(sender_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let history = entry.get_mut();
                prune(history, now, window);
                if history.len() < max {
                    // A caller that sampled `now` before queueing on the lock must not
                    // push a timestamp older than the newest one.
                    let stamp = history.back().map_or(now, |&last| last.max(now));
                    history.push_back(stamp);
                    true
                } else {
                    debug!(
                        "rate_limit: rejected {sender_id} ({} in window)",
                        history.len()
                    );
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::from([now]));
                true
            }
        }
    }

    /// Drop every sender whose history has fully expired at `now`.
    ///
    /// Returns the number of senders evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.config.window;
        let before = self.records.len();
        self.records.retain(|_, history| {
            prune(history, now, window);
            !history.is_empty()
        });
        before.saturating_sub(self.records.len())
    }

    /// Number of senders currently tracked.
    pub fn tracked_senders(&self) -> usize {
        self.records.len()
    }
}

/// Remove timestamps that are `window` or more older than `now`.
fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = history.front() {
        if now.saturating_duration_since(oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(max, window_secs))
    }

    #[test]
    fn test_admits_up_to_max_then_rejects() {
        let rl = limiter(3, 60);
        let t0 = Instant::now();
        assert!(rl.admit("alice", t0));
        assert!(rl.admit("alice", t0 + Duration::from_secs(1)));
        assert!(rl.admit("alice", t0 + Duration::from_secs(2)));
        assert!(!rl.admit("alice", t0 + Duration::from_secs(3)));
        assert!(!rl.admit("alice", t0 + Duration::from_secs(59)));
    }

    #[test]
    fn test_slot_frees_when_oldest_leaves_window() {
        let rl = limiter(2, 60);
        let t0 = Instant::now();
        assert!(rl.admit("bob", t0));
        assert!(rl.admit("bob", t0 + Duration::from_secs(30)));
        assert!(!rl.admit("bob", t0 + Duration::from_secs(59)));
        // Exactly one window after the first request, it no longer counts.
        assert!(rl.admit("bob", t0 + Duration::from_secs(60)));
        assert!(!rl.admit("bob", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let rl = limiter(1, 10);
        let t0 = Instant::now();
        assert!(rl.admit("carol", t0));
        for s in 1..10 {
            assert!(!rl.admit("carol", t0 + Duration::from_secs(s)));
        }
        assert!(rl.admit("carol", t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_expired_sender_behaves_like_new_sender() {
        let rl = limiter(2, 5);
        let t0 = Instant::now();
        assert!(rl.admit("dave", t0));
        assert!(rl.admit("dave", t0));
        assert!(!rl.admit("dave", t0));

        let later = t0 + Duration::from_secs(100);
        let fresh = limiter(2, 5);
        for _ in 0..3 {
            assert_eq!(rl.admit("dave", later), fresh.admit("dave", later));
        }
    }

    #[test]
    fn test_zero_max_is_unlimited() {
        let rl = limiter(0, 60);
        let t0 = Instant::now();
        for _ in 0..10_000 {
            assert!(rl.admit("eve", t0));
        }
        assert_eq!(rl.tracked_senders(), 0);
    }

    #[test]
    fn test_senders_are_independent() {
        let rl = limiter(1, 60);
        let t0 = Instant::now();
        assert!(rl.admit("a", t0));
        assert!(!rl.admit("a", t0));
        assert!(rl.admit("b", t0));
    }

    #[test]
    fn test_sweep_evicts_fully_expired_senders() {
        let rl = limiter(5, 10);
        let t0 = Instant::now();
        rl.admit("old", t0);
        rl.admit("recent", t0 + Duration::from_secs(8));
        assert_eq!(rl.tracked_senders(), 2);

        let evicted = rl.sweep(t0 + Duration::from_secs(12));
        assert_eq!(evicted, 1);
        assert_eq!(rl.tracked_senders(), 1);

        assert_eq!(rl.sweep(t0 + Duration::from_secs(30)), 1);
        assert_eq!(rl.tracked_senders(), 0);
    }

    #[test]
    fn test_out_of_order_now_keeps_history_monotonic() {
        let rl = limiter(3, 10);
        let t0 = Instant::now();
        assert!(rl.admit("f", t0 + Duration::from_secs(5)));
        // Sampled earlier, arrived later.
        assert!(rl.admit("f", t0 + Duration::from_secs(4)));
        let history = rl.records.get("f").unwrap().clone();
        assert!(history.iter().zip(history.iter().skip(1)).all(|(a, b)| a <= b));
    }

    #[test]
    fn test_never_more_than_max_in_any_window() {
        let max = 4;
        let window = Duration::from_secs(10);
        let rl = RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window,
        });
        let t0 = Instant::now();

        // Deterministic pseudo-random arrival gaps between 0 and 3 seconds.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut at = t0;
        let mut admitted = Vec::new();
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            at += Duration::from_millis((seed >> 33) % 3000);
            if rl.admit("g", at) {
                admitted.push(at);
            }
        }

        for (i, &start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|&&t| t.duration_since(start) < window)
                .count();
            assert!(in_window <= max as usize, "{in_window} admissions in one window");
        }
    }

    #[test]
    fn test_concurrent_last_slot_admits_exactly_one() {
        for round in 0..200 {
            let rl = Arc::new(limiter(3, 60));
            let sender = format!("racer-{round}");
            let now = Instant::now();
            assert!(rl.admit(&sender, now));
            assert!(rl.admit(&sender, now));

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let rl = rl.clone();
                    let barrier = barrier.clone();
                    let sender = sender.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        rl.admit(&sender, Instant::now())
                    })
                })
                .collect();

            let admitted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|&ok| ok)
                .count();
            assert_eq!(admitted, 1, "round {round}");
        }
    }
}
