use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caps how many transfer sessions may start per second. A rate of zero
/// disables the cap.
pub struct SessionRateLimiter {
    limiter: Option<Limiter>,
}

impl SessionRateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            limiter: NonZeroU32::new(max_per_second)
                .map(|rate| RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
