// src/timeline/budget.rs
use std::time::Duration;

use tokio::time::Instant;

/// Length of the platform's rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default timeline request budget per window (app bearer token).
pub const DEFAULT_WINDOW_BUDGET: u32 = 1500;

/// Fixed-window request budget. `acquire` waits for the next window once
/// the current one is spent.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    capacity: u32,
    window: Duration,
    window_start: Instant,
    used: u32,
}

impl RequestBudget {
    /// `capacity` of 0 is treated as 1.
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            window_start: Instant::now(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn remaining(&self) -> u32 {
        if self.window_start.elapsed() >= self.window {
            return self.capacity;
        }
        self.capacity.saturating_sub(self.used)
    }

    /// Reserve one request, sleeping until the window rolls over if needed.
    pub async fn acquire(&mut self) {
        self.roll_window();
        if self.used >= self.capacity {
            let wake = self.window_start + self.window;
            tracing::warn!(
                target: "budget",
                capacity = self.capacity,
                wait_ms = wake.saturating_duration_since(Instant::now()).as_millis() as u64,
                "request budget exhausted, waiting for next window"
            );
            tokio::time::sleep_until(wake).await;
            self.roll_window();
        }
        self.used += 1;
    }

    /// Shortest sweep interval that keeps `requests_per_sweep` inside the budget.
    pub fn min_sweep_interval(&self, requests_per_sweep: usize) -> Duration {
        let nanos =
            self.window.as_nanos() * requests_per_sweep as u128 / u128::from(self.capacity);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn roll_window(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.used = 0;
        }
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_BUDGET, RATE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn waits_for_next_window_when_spent() {
        let mut budget = RequestBudget::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        budget.acquire().await;
        budget.acquire().await;
        assert_eq!(budget.remaining(), 0);
        assert!(t0.elapsed() < Duration::from_secs(1));

        budget.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(60));
        assert_eq!(budget.remaining(), 1);
    }

    #[test]
    fn min_interval_scales_with_accounts() {
        let budget = RequestBudget::new(1500, RATE_WINDOW);
        // 900s / 1500 = 0.6s per request
        assert_eq!(budget.min_sweep_interval(100), Duration::from_secs(60));
        assert_eq!(budget.min_sweep_interval(0), Duration::ZERO);
    }
}
