//! Pacing for connection attempts.
//!
//! A token bucket shared by the port and TLS probes of one scan, so repeated
//! attempts do not arrive at the target as a burst.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A rate limiter for connection attempts.
///
/// Cloning shares the underlying bucket.
#[derive(Clone)]
pub struct AttemptPacer {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl AttemptPacer {
    /// Create a pacer allowing `rate` attempts per second.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        Some(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Wait until another attempt is allowed.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for AttemptPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptPacer").finish_non_exhaustive()
    }
}
