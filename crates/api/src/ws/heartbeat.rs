use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Read deadline of one connection, pushed forward by every heartbeat.
#[derive(Debug)]
pub struct HeartbeatDeadline {
    timeout: Duration,
    deadline: Instant,
}

impl HeartbeatDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn reset(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Completes once the current deadline passes.
    pub async fn expired(&self) {
        sleep_until(self.deadline).await;
    }
}
