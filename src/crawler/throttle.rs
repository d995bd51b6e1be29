//! Adaptive politeness delay
//!
//! The delay between request starts follows the observed response latency:
//! it moves toward `latency / target_concurrency`, backs off sharply on
//! errors and when too many requests are in flight, and always stays within
//! the configured floor and ceiling.

use crate::config::ThrottleConfig;
use std::sync::Mutex;
use std::time::Duration;

/// Shared controller for the inter-request delay
#[derive(Debug)]
pub struct ThrottleController {
    delay: Mutex<Duration>,
    floor: Duration,
    ceiling: Duration,
    target_concurrency: f64,
    jitter: f64,
}

impl ThrottleController {
    pub fn new(config: &ThrottleConfig) -> Self {
        let floor = config.min_delay();
        Self {
            delay: Mutex::new(floor),
            floor,
            ceiling: config.max_delay().max(floor),
            target_concurrency: if config.target_concurrency > 0.0 {
                config.target_concurrency
            } else {
                1.0
            },
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }

    /// Current delay before jitter
    pub fn current_delay(&self) -> Duration {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adjusts the delay after a response (or failed attempt) and returns it
    pub fn observe(&self, latency: Duration, in_flight: usize, failed: bool) -> Duration {
        let mut delay = self.delay.lock().unwrap_or_else(|e| e.into_inner());
        let current = *delay;
        let target = latency.div_f64(self.target_concurrency);

        let next = if failed {
            (current * 2).max(target)
        } else if in_flight as f64 > self.target_concurrency {
            current.max((current + target) / 2).mul_f64(1.25)
        } else {
            (current + target) / 2
        };

        *delay = next.max(self.floor).min(self.ceiling);

        tracing::trace!(
            latency_ms = latency.as_millis() as u64,
            in_flight,
            failed,
            delay_ms = delay.as_millis() as u64,
            "Throttle adjusted"
        );

        *delay
    }

    /// Samples the pause before the next request start
    ///
    /// Uniform in `[delay * (1 - jitter), delay * (1 + jitter)]`.
    pub fn sample_delay(&self) -> Duration {
        let delay = self.current_delay();
        if self.jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 - self.jitter + 2.0 * self.jitter * fastrand::f64();
        delay.mul_f64(factor)
    }
}
