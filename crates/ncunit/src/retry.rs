use std::time::Duration;

use crate::config::ControllerSettings;

/// Bounded polling with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// The policy `Start` uses to wait for the application.
    pub fn for_start(settings: &ControllerSettings) -> Self {
        Self::fixed(settings.start_attempts, settings.start_retry_delay())
    }

    /// Calls `probe` with the 1-based attempt number until it returns true
    /// or the attempts are used up. Sleeps between attempts, not after the
    /// last one. Returns whether any attempt succeeded.
    pub fn poll<F>(&self, what: &str, mut probe: F) -> bool
    where
        F: FnMut(u32) -> bool,
    {
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                log::info!(
                    "Retrying {} (attempt {}/{}) after {:?}...",
                    what,
                    attempt,
                    self.attempts,
                    self.delay
                );
                std::thread::sleep(self.delay);
            }

            if probe(attempt) {
                return true;
            }
        }

        log::warn!("{} not ready after {} attempts", what, self.attempts);
        false
    }
}
