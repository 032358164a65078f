//! Token bucket rate limiting and cooperative cancellation.

use crate::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct CancelInner {
    flag: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

/// A cooperative cancellation handle shared between a pool and its tasks.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                flag: AtomicBool::new(false),
                lock: Mutex::new(()),
                signal: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().expect("cancel lock");
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Sleep up to `timeout`, waking early on cancellation. Returns whether the
    /// token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let guard = self.inner.lock.lock().expect("cancel lock");
        let (_guard, _result) = self
            .inner
            .signal
            .wait_timeout(guard, timeout)
            .expect("cancel lock");
        self.is_cancelled()
    }
}

struct Bucket {
    tokens: f64,
    refilled: Instant,
}

/// A token bucket with capacity `rate`, refilled one token every `1/rate` of a
/// second.
pub struct RateLimiter {
    capacity: f64,
    per_token: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(rate: u32) -> Self {
        let rate = rate.max(1);
        Self {
            capacity: rate as f64,
            per_token: Duration::from_secs_f64(1.0 / rate as f64),
            bucket: Mutex::new(Bucket {
                tokens: rate as f64,
                refilled: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled);
        let earned = elapsed.as_secs_f64() / self.per_token.as_secs_f64();
        if earned > 0.0 {
            bucket.tokens = (bucket.tokens + earned).min(self.capacity);
            bucket.refilled = now;
        }
    }

    /// Take a token without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().expect("limiter lock");
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block for a token or until the token is cancelled.
    pub fn wait(&self, cancel: &CancelToken) -> Result<(), Error> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::new(
                    ErrorKind::Operator,
                    "cancelled while waiting for a rate limit token".to_string(),
                ));
            }
            let pause = {
                let mut bucket = self.bucket.lock().expect("limiter lock");
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                let deficit = 1.0 - bucket.tokens;
                self.per_token.mul_f64(deficit.max(0.0))
            };
            if cancel.wait_timeout(pause.max(Duration::from_millis(1))) {
                return Err(Error::new(
                    ErrorKind::Operator,
                    "cancelled while waiting for a rate limit token".to_string(),
                ));
            }
        }
    }
}
