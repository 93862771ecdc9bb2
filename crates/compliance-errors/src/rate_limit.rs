//! IP-keyed sliding-window rate limiter (spec.md §5). Same shape as the
//! teacher's `AntifragileEngine::circuits`: a lock-protected map keyed by
//! identity, garbage-collected lazily on access rather than by a background
//! sweep.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub struct RateLimiter {
    window: Duration,
    limit: u32,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self { window: Duration::from_secs(60), limit: limit_per_minute, hits: Mutex::new(HashMap::new()) }
    }

    /// Records one request from `ip` and reports whether it's within the
    /// window's limit. The window is garbage-collected here, lazily, rather
    /// than by a dedicated task.
    pub fn allow_request(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let entry = hits.entry(ip).or_default();

        while let Some(&front) = entry.front() {
            if now.duration_since(front) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() as u32 >= self.limit {
            return false;
        }
        entry.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(2);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.allow_request(ip));
        assert!(limiter.allow_request(ip));
        assert!(!limiter.allow_request(ip));
    }

    #[test]
    fn distinct_ips_have_independent_windows() {
        let limiter = RateLimiter::new(1);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.allow_request(a));
        assert!(limiter.allow_request(b));
        assert!(!limiter.allow_request(a));
    }
}
