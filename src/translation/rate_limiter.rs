use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_THRESHOLD: u32 = 60;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    request_count: u32,
}

/// Fixed-window limiter shared by every translation worker.
///
/// Each `acquire` runs inside one critical section: roll the window over if it
/// has elapsed, wait out the rest of the window when the threshold is reached,
/// then count the request. Bursts at window boundaries are allowed.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<WindowState>,
    threshold: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            state: Mutex::new(WindowState { window_start: Instant::now(), request_count: 0 }),
            threshold,
            window,
        }
    }

    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        if state.window_start.elapsed() >= self.window {
            state.window_start = Instant::now();
            state.request_count = 0;
        }
        if state.request_count >= self.threshold {
            let wait = self.window.saturating_sub(state.window_start.elapsed());
            tracing::info!(wait_ms = wait.as_millis() as u64, threshold = self.threshold, "Translation rate limit reached; waiting for window reset");
            // Holding the lock while sleeping queues every other worker behind this one
            tokio::time::sleep(wait).await;
            state.window_start = Instant::now();
            state.request_count = 0;
        }
        state.request_count += 1;
    }

    pub async fn request_count(&self) -> u32 {
        self.state.lock().await.request_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn threshold_requests_never_block() {
        let limiter = RateLimiter::new(60, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..60 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.request_count().await, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn request_over_threshold_waits_for_rollover() {
        let limiter = RateLimiter::new(60, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..61 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(limiter.request_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_window_resets_counter() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(11)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(limiter.request_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_window() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let start = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        // Ten requests against a threshold of five need exactly one rollover
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(120));
        assert_eq!(limiter.request_count().await, 5);
    }
}
