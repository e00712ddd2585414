//! Transmit pacing policies.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Delay applied after each transmitted event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// No delay beyond a cooperative yield.
    Yield,
    /// A fixed delay every iteration.
    Fixed(Duration),
    /// A random delay up to the bound, for servers that rate-limit
    /// inbound connections.
    Random(Duration),
}

impl Pacing {
    pub async fn pause(&self) {
        match self {
            Pacing::Yield => tokio::task::yield_now().await,
            Pacing::Fixed(delay) => tokio::time::sleep(*delay).await,
            Pacing::Random(bound) => {
                let bound = bound.as_secs_f64();
                if bound <= 0.0 {
                    tokio::task::yield_now().await;
                    return;
                }
                let secs = rand::thread_rng().gen_range(0.0..bound);
                debug!(seconds = secs, "rate-limit pacing sleep");
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_pacing_sleeps_the_configured_delay() {
        let before = tokio::time::Instant::now();
        Pacing::Fixed(Duration::from_millis(250)).pause().await;
        assert_eq!(before.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn random_pacing_stays_under_the_bound() {
        let bound = Duration::from_secs(5);
        for _ in 0..8 {
            let before = tokio::time::Instant::now();
            Pacing::Random(bound).pause().await;
            assert!(before.elapsed() <= bound);
        }
    }

    #[tokio::test]
    async fn zero_bound_never_panics() {
        Pacing::Random(Duration::ZERO).pause().await;
        Pacing::Yield.pause().await;
    }
}
