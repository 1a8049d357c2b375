use std::sync::Mutex;
use std::time::Instant;

/// `{capacity, tokens, last_refill, refill_rate}` (spec.md §3). `consume`
/// refills to `min(capacity, tokens + elapsed*rate)` then atomically
/// subtracts `n` iff enough tokens are available. Guarded by a single
/// mutex per spec.md §5 ("mutated under a single mutex; consume is O(1)").
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
            capacity,
            refill_rate,
        }
    }

    pub fn try_consume(&self, n: f64) -> bool {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn burst_is_consumed_then_exhausted() {
        let bucket = TokenBucket::new(2.0, 1.0);
        assert!(bucket.try_consume(1.0));
        assert!(bucket.try_consume(1.0));
        assert!(!bucket.try_consume(1.0));
    }

    #[test]
    fn tokens_refill_over_time() {
        let bucket = TokenBucket::new(1.0, 1000.0);
        assert!(bucket.try_consume(1.0));
        assert!(!bucket.try_consume(1.0));
        sleep(Duration::from_millis(5));
        assert!(bucket.try_consume(1.0));
    }
}
