use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window admission control shared by all probe workers.
///
/// Capacity is advisory rather than a strict token reservation: a worker that
/// finds the window full sleeps until the oldest admission expires and then
/// re-checks, because another worker may have taken the freed slot in the
/// meantime. Worst-case overshoot is bounded by one request per worker.
pub struct RateLimiter {
    max_requests: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, period: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            period,
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Blocks cooperatively until a request slot is available, then records
    /// the admission.
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window
                    .front()
                    .map_or(false, |&t| now.duration_since(t) >= self.period)
                {
                    window.pop_front();
                }
                if window.len() < self.max_requests {
                    window.push_back(now);
                    return;
                }
                // Time until the oldest in-window admission expires.
                match window.front() {
                    Some(&oldest) => self.period.saturating_sub(now.duration_since(oldest)),
                    None => Duration::ZERO,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}
