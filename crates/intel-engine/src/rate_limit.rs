//! Minimum-interval limiter for outbound backend calls.
//!
//! A leaky bucket of one: no bursts, no per-caller keying. The wait is a
//! pure computation over a [`RateWindow`], so any scheduler can apply it;
//! [`RateLimiter::acquire`] applies it with a tokio timer.

use tokio::time::{Duration, Instant};

/// Timestamp of the last dispatched backend call within a session.
///
/// The stored instant never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindow {
    last_request: Option<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    /// Record a dispatch at `at`. Earlier instants than the stored one are ignored.
    pub fn mark(&mut self, at: Instant) {
        self.last_request = Some(match self.last_request {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// Enforces a minimum gap between consecutive backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// A limiter that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// How long a call attempted at `now` must wait.
    pub fn wait_time(&self, window: &RateWindow, now: Instant) -> Duration {
        match window.last_request {
            None => Duration::ZERO,
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Wait out the remaining interval, then mark the window as consumed.
    ///
    /// The window is marked before the caller dispatches, so a call that
    /// later fails still counts. Returns the time spent waiting.
    pub async fn acquire(&self, window: &mut RateWindow) -> Duration {
        let wait = self.wait_time(window, Instant::now());
        if !wait.is_zero() {
            tracing::info!(
                waited_ms = wait.as_millis() as u64,
                "Throttling backend call"
            );
            tokio::time::sleep(wait).await;
        }
        window.mark(Instant::now());
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(15);

    #[tokio::test(start_paused = true)]
    async fn test_first_call_never_waits() {
        let limiter = RateLimiter::new(INTERVAL);
        let window = RateWindow::new();
        assert_eq!(limiter.wait_time(&window, Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_interval_minus_elapsed() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut window = RateWindow::new();
        let t = Instant::now();
        window.mark(t);

        let delta = Duration::from_secs(4);
        assert_eq!(
            limiter.wait_time(&window, t + delta),
            INTERVAL - delta
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_at_or_after_interval() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut window = RateWindow::new();
        let t = Instant::now();
        window.mark(t);

        assert_eq!(limiter.wait_time(&window, t + INTERVAL), Duration::ZERO);
        assert_eq!(
            limiter.wait_time(&window, t + Duration::from_secs(3600)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sleeps_for_remaining_interval() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut window = RateWindow::new();
        window.mark(Instant::now());

        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        let waited = limiter.acquire(&mut window).await;
        assert_eq!(waited, Duration::from_secs(10));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
        assert_eq!(window.last_request(), Some(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_immediate_when_far_apart() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut window = RateWindow::new();
        window.mark(Instant::now());

        tokio::time::advance(Duration::from_secs(60)).await;

        let waited = limiter.acquire(&mut window).await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_marks_window_on_first_call() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut window = RateWindow::new();
        assert!(window.last_request().is_none());

        limiter.acquire(&mut window).await;
        assert!(window.last_request().is_some());
        assert_eq!(limiter.wait_time(&window, Instant::now()), INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_never_moves_backwards() {
        let mut window = RateWindow::new();
        let later = Instant::now() + Duration::from_secs(10);
        window.mark(later);
        window.mark(later - Duration::from_secs(5));
        assert_eq!(window.last_request(), Some(later));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_limiter_never_waits() {
        let limiter = RateLimiter::disabled();
        let mut window = RateWindow::new();
        limiter.acquire(&mut window).await;
        assert_eq!(limiter.wait_time(&window, Instant::now()), Duration::ZERO);
        assert_eq!(limiter.acquire(&mut window).await, Duration::ZERO);
    }
}
