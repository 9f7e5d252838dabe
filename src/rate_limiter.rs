//! Global async token-bucket rate limiter.
//!
//! A packed-atomic token bucket with a "blocking wait until a token is
//! free" contract rather than non-blocking allow/deny: this engine has
//! exactly one bucket for the whole job, and callers must be served in
//! FIFO order rather than racing each other on retry. A
//! `tokio::sync::Mutex` around the acquire path gives that FIFO queueing
//! (tokio grants a `Mutex` to waiters in the order they called `lock`);
//! the packed `AtomicU128` still does the actual refill/consume math so
//! the hot path never double-locks once a caller's turn comes up.

use portable_atomic::{AtomicU128, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_SCALE: u64 = 1000;
const RATE_SCALE: u64 = 1_000_000;

#[inline(always)]
fn pack_state(tokens: u64, last_refill_nanos: u64) -> u128 {
    ((tokens as u128) << 64) | (last_refill_nanos as u128)
}

#[inline(always)]
fn unpack_state(packed: u128) -> (u64, u64) {
    let tokens = (packed >> 64) as u64;
    let last_refill_nanos = (packed & 0xFFFF_FFFF_FFFF_FFFF) as u64;
    (tokens, last_refill_nanos)
}

/// Single process-global token bucket shared by every outbound fetch in a
/// job. Capacity equals the configured rate (one second's worth of
/// tokens); cross-host/per-domain isolation is out of scope here.
pub struct RateLimiter {
    state: AtomicU128,
    rate_per_nano: u64,
    max_tokens: u64,
    base_time: Instant,
    queue: Mutex<()>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(rate_per_second: u32) -> Self {
        let rate_rps = f64::from(rate_per_second.max(1));
        let max_tokens = (rate_rps * TOKEN_SCALE as f64) as u64;
        let rate_per_nano =
            ((rate_rps * TOKEN_SCALE as f64 * RATE_SCALE as f64) / 1_000_000_000.0) as u64;
        Self {
            state: AtomicU128::new(pack_state(max_tokens, 0)),
            rate_per_nano,
            max_tokens,
            base_time: Instant::now(),
            queue: Mutex::new(()),
        }
    }

    /// Block until a token is available, then consume it. Waiters are
    /// served in the order they called `acquire`.
    pub async fn acquire(&self) {
        let _turn = self.queue.lock().await;
        loop {
            let now_nanos = self.base_time.elapsed().as_nanos() as u64;
            self.refill(now_nanos);

            let mut current = self.state.load(Ordering::Relaxed);
            loop {
                let (tokens, last_refill) = unpack_state(current);
                if tokens < TOKEN_SCALE {
                    let needed = TOKEN_SCALE.saturating_sub(tokens);
                    let nanos = if self.rate_per_nano > 0 {
                        (needed.saturating_mul(RATE_SCALE)) / self.rate_per_nano
                    } else {
                        1_000_000
                    };
                    tokio::time::sleep(Duration::from_nanos(nanos)).await;
                    break;
                }
                let new_state = pack_state(tokens - TOKEN_SCALE, last_refill);
                match self.state.compare_exchange_weak(
                    current,
                    new_state,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    Err(actual) => current = actual,
                }
            }
        }
    }

    fn refill(&self, now_nanos: u64) {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let (tokens, last_refill) = unpack_state(current);
            if now_nanos <= last_refill {
                return;
            }
            let elapsed = now_nanos.saturating_sub(last_refill);
            let to_add = (elapsed.saturating_mul(self.rate_per_nano)) / RATE_SCALE;
            let credited_nanos = if self.rate_per_nano > 0 {
                (to_add.saturating_mul(RATE_SCALE)) / self.rate_per_nano
            } else {
                0
            };
            let new_last_refill = last_refill.saturating_add(credited_nanos);
            let new_tokens = if to_add > 0 {
                tokens.saturating_add(to_add).min(self.max_tokens)
            } else {
                tokens
            };
            match self.state.compare_exchange_weak(
                current,
                pack_state(new_tokens, new_last_refill),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_burst_up_to_capacity_does_not_block() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_capacity_waits_for_refill() {
        let limiter = RateLimiter::new(1);
        limiter.acquire().await;

        let acquired = tokio::time::timeout(Duration::from_millis(500), limiter.acquire()).await;
        assert!(acquired.is_err(), "second token should not be free yet");

        tokio::time::advance(Duration::from_secs(2)).await;
        let acquired = tokio::time::timeout(Duration::from_millis(500), limiter.acquire()).await;
        assert!(acquired.is_ok());
    }
}
