//! Randomized delays between browser actions

use std::time::Duration;

use rand::Rng;

use crate::config::CrawlConfig;

/// Delay ranges applied while driving the search page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    settle_ms: (u64, u64),
    action_ms: (u64, u64),
}

impl Pacing {
    pub fn new(settle_ms: (u64, u64), action_ms: (u64, u64)) -> Self {
        Self {
            settle_ms: ordered(settle_ms),
            action_ms: ordered(action_ms),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            (config.settle_delay_min_ms, config.settle_delay_max_ms),
            (config.action_delay_min_ms, config.action_delay_max_ms),
        )
    }

    /// No delays at all
    pub fn none() -> Self {
        Self::new((0, 0), (0, 0))
    }

    /// Wait for the page to settle after navigation or scrolling
    pub async fn settle(&self) {
        sleep(sample(self.settle_ms)).await;
    }

    /// Short pause between UI actions
    pub async fn action(&self) {
        sleep(sample(self.action_ms)).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_config(&CrawlConfig::default())
    }
}

fn ordered((a, b): (u64, u64)) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn sample((min, max): (u64, u64)) -> Duration {
    if min == max {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
