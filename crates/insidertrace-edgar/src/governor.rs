//! Outbound request admission under a rolling-window budget.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// At most `max_requests` admissions in any `window`, with `margin` added to
/// every computed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub max_requests: usize,
    pub window: Duration,
    pub margin: Duration,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(1),
            margin: Duration::from_millis(100),
        }
    }
}

/// Gate every outbound request passes before it is sent.
#[async_trait]
pub trait Governor: Send + Sync {
    /// Wait until one more request fits the budget. Never rejects.
    async fn admit(&self);
}

/// Sliding-window governor shared by every worker that talks to the archive.
///
/// The admission log lives behind an async mutex that is held across the
/// wait, so callers are admitted one at a time in arrival order.
#[derive(Debug)]
pub struct RateGovernor {
    budget: RateBudget,
    admitted: Mutex<VecDeque<Instant>>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateBudget::default())
    }
}

impl RateGovernor {
    pub fn new(budget: RateBudget) -> Self {
        let budget = RateBudget {
            max_requests: budget.max_requests.max(1),
            ..budget
        };
        Self {
            budget,
            admitted: Mutex::new(VecDeque::with_capacity(budget.max_requests)),
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }
}

#[async_trait]
impl Governor for RateGovernor {
    async fn admit(&self) {
        let mut admitted = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            while admitted
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.budget.window)
            {
                admitted.pop_front();
            }

            if admitted.len() < self.budget.max_requests {
                admitted.push_back(now);
                return;
            }

            let age = admitted
                .front()
                .map(|t| now.duration_since(*t))
                .unwrap_or_default();
            let wait = self.budget.window.saturating_sub(age) + self.budget.margin;
            debug!(wait_ms = wait.as_millis() as u64, "rate budget saturated");
            sleep(wait).await;
        }
    }
}

/// Admits immediately. For tests and offline sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

#[async_trait]
impl Governor for Unthrottled {
    async fn admit(&self) {}
}
