//! Exponential backoff between reconnect and reload attempts.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bazaar_core::config::notifications::ReconnectConfig;

/// Calculate the next delay, clamped to `max`.
pub fn next_delay(current: Duration, multiplier: f64, max: Duration) -> Duration {
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms).min(max)
}

/// Growing delay sequence that restarts after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    /// Build from the reconnect settings.
    pub fn new(config: &ReconnectConfig) -> Self {
        let initial = Duration::from_millis(config.initial_delay_ms);
        Self {
            initial,
            max: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            multiplier: config.multiplier.max(1.0),
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns a longer one.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = next_delay(self.current, self.multiplier, self.max);
        delay
    }

    /// Start over from the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Sleep for the next delay. Returns `false` if cancelled first.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.next();
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let d = next_delay(Duration::from_millis(500), 2.0, Duration::from_secs(30));
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let d = next_delay(Duration::from_secs(20), 2.0, Duration::from_secs(30));
        assert_eq!(d, Duration::from_secs(30));
    }

    #[test]
    fn default_sequence() {
        let mut backoff = Backoff::new(&ReconnectConfig::default());
        let expected = [500, 1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000];
        for ms in expected {
            assert_eq!(backoff.next(), Duration::from_millis(ms));
        }

        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_millis(500));
    }

    #[test]
    fn multiplier_below_one_does_not_shrink() {
        let mut backoff = Backoff::new(&ReconnectConfig {
            multiplier: 0.5,
            ..Default::default()
        });
        backoff.next();
        assert_eq!(backoff.next(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn cancelled_wait_returns_false() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut backoff = Backoff::new(&ReconnectConfig {
            initial_delay_ms: 60_000,
            ..Default::default()
        });
        assert!(!backoff.wait(&cancel).await);
    }
}
