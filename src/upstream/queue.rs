use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes calls and keeps a minimum gap between the end of one call and
/// the start of the next.
///
/// Waiters are admitted in arrival order because `tokio::sync::Mutex` is
/// fair. The gap applies to every call regardless of key or outcome.
#[derive(Debug)]
pub struct RequestQueue {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RequestQueue {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Run `call` once the queue is free and the spacing has elapsed
    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut next_allowed = self.next_allowed.lock().await;
        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                log::debug!("upstream queue waiting {:?}", at - now);
                tokio::time::sleep_until(at).await;
            }
        }

        let result = call().await;
        *next_allowed = Some(Instant::now() + self.min_interval);
        result
    }
}
