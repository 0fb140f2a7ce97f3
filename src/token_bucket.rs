use std::sync::Mutex;
use std::time::Instant;

/// Continuous-refill token bucket.
///
/// Starts full. Tokens accrue proportionally to elapsed time and are capped
/// at the burst capacity.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket refilled at `per_minute` tokens per minute holding at
    /// most `burst` tokens. Both are raised to 1 if given as 0.
    pub fn per_minute(per_minute: u32, burst: u32, now: Instant) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: per_minute.max(1) as f64 / 60.0,
            last_refill: now,
        }
    }

    /// Take one token if available. A denied attempt only advances the refill
    /// bookkeeping.
    pub fn try_admit_at(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available_tokens_at(&mut self, now: Instant) -> u32 {
        self.refill(now);
        self.tokens.floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    fn refill(&mut self, now: Instant) {
        // A caller holding an older `now` must not rewind the clock.
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }

        let tokens_to_add = self.refill_rate * elapsed.as_secs_f64();
        self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
        self.last_refill = now;
    }
}

/// A [`TokenBucket`] that may be shared between request handlers.
///
/// Used for the process-wide ceiling that every client draws from.
#[derive(Debug)]
pub struct Limiter {
    bucket: Mutex<TokenBucket>,
}

impl Limiter {
    pub fn per_minute(per_minute: u32, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::per_minute(per_minute, burst, Instant::now())),
        }
    }

    pub fn try_admit_at(&self, now: Instant) -> bool {
        // The bucket holds plain numbers; a panic elsewhere cannot leave it
        // half-updated, so a poisoned lock is still usable.
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.try_admit_at(now)
    }
}
