use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Added to every computed wait so the retried slot is clearly outside the window.
const SLOT_SLACK: Duration = Duration::from_millis(50);

/// Request timestamps inside the current window, oldest first.
#[derive(Debug)]
struct Window {
    issued: VecDeque<Instant>,
    capacity: usize,
    span: Duration,
}

impl Window {
    /// Claim a slot at `now`, or return how long to wait before trying again.
    fn reserve(&mut self, now: Instant) -> Result<(), Duration> {
        while self
            .issued
            .front()
            .is_some_and(|&at| now.duration_since(at) >= self.span)
        {
            self.issued.pop_front();
        }

        match self.issued.front() {
            Some(&oldest) if self.issued.len() >= self.capacity => {
                Err((oldest + self.span).saturating_duration_since(now) + SLOT_SLACK)
            }
            _ => {
                self.issued.push_back(now);
                Ok(())
            }
        }
    }
}

/// Sliding-window limiter shared by clones of one client.
#[derive(Clone)]
pub struct RateLimiter {
    window: Arc<Mutex<Window>>,
}

impl RateLimiter {
    /// At most `capacity` requests per `span`; a zero capacity is raised to one.
    pub fn new(capacity: usize, span: Duration) -> Self {
        Self {
            window: Arc::new(Mutex::new(Window {
                issued: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                span,
            })),
        }
    }

    pub async fn capacity(&self) -> usize {
        self.window.lock().await.capacity
    }

    pub async fn acquire(&self) {
        loop {
            let wait = match self.window.lock().await.reserve(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!("Yahoo Finance rate limit reached, next slot in {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}
