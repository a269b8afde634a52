//! Simulated processing latency.
//!
//! List and detail responses pause for a random interval so loading states
//! in the client can be exercised against a local server. The pause is a
//! [`ResponseDelay`] held in the server state: [`RandomDelay`] in normal
//! runs, [`NoDelay`] when disabled in config or in tests.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DelayConfig;

#[async_trait]
pub trait ResponseDelay: Send + Sync {
    async fn pause(&self);
}

/// Never waits.
pub struct NoDelay;

#[async_trait]
impl ResponseDelay for NoDelay {
    async fn pause(&self) {}
}

/// Waits a uniformly random number of milliseconds in `[min_ms, max_ms]`.
pub struct RandomDelay {
    min_ms: u64,
    max_ms: u64,
}

impl RandomDelay {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn sample(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

#[async_trait]
impl ResponseDelay for RandomDelay {
    async fn pause(&self) {
        let duration = self.sample();
        tracing::trace!(ms = duration.as_millis() as u64, "simulated delay");
        tokio::time::sleep(duration).await;
    }
}

/// Builds the configured delay.
pub fn from_config(config: &DelayConfig) -> Arc<dyn ResponseDelay> {
    if config.enabled {
        Arc::new(RandomDelay::new(config.min_ms, config.max_ms))
    } else {
        Arc::new(NoDelay)
    }
}
