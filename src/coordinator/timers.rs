//! Countdown Timers
//!
//! Owns the cancellable countdown handles of the readiness coordinator, keyed
//! by pool id. At most one countdown is active per pool: `start` refuses a
//! second one until the first is cancelled or claimed by its own expiry.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Generation id of a started countdown
pub type CountdownId = u64;

struct Countdown {
    id: CountdownId,
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct CountdownTimers {
    active: HashMap<String, Countdown>,
    next_id: CountdownId,
}

impl CountdownTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown for `pool_id` that runs `on_expire(id)` after `window`.
    ///
    /// Returns `None` (and drops `on_expire` unused) if the pool already has
    /// an active countdown. The expiry future should call [`Self::claim`] with
    /// its id before acting, so a countdown cancelled in the meantime stays inert.
    pub fn start<F, Fut>(&mut self, pool_id: &str, window: Duration, on_expire: F) -> Option<CountdownId>
    where
        F: FnOnce(CountdownId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.active.contains_key(pool_id) {
            return None;
        }

        self.next_id += 1;
        let id = self.next_id;
        let expiry = on_expire(id);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            expiry.await;
        });

        debug!("Countdown {} started for pool {} ({:?})", id, pool_id, window);
        self.active.insert(
            pool_id.to_string(),
            Countdown {
                id,
                deadline: Instant::now() + window,
                handle,
            },
        );
        Some(id)
    }

    /// Cancel the pool's countdown. Returns whether one was active.
    pub fn cancel(&mut self, pool_id: &str) -> bool {
        match self.active.remove(pool_id) {
            Some(countdown) => {
                countdown.handle.abort();
                debug!("Countdown {} cancelled for pool {}", countdown.id, pool_id);
                true
            }
            None => false,
        }
    }

    /// Called from an expiring countdown: clears the handle if `id` is still
    /// the pool's registered countdown. A stale id (cancelled, replaced)
    /// returns false and leaves the registry untouched.
    pub fn claim(&mut self, pool_id: &str, id: CountdownId) -> bool {
        match self.active.get(pool_id) {
            Some(countdown) if countdown.id == id => {
                self.active.remove(pool_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, pool_id: &str) -> bool {
        self.active.contains_key(pool_id)
    }

    /// Time left on the pool's countdown
    pub fn remaining(&self, pool_id: &str) -> Option<Duration> {
        self.active
            .get(pool_id)
            .map(|c| c.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, countdown) in self.active.drain() {
            countdown.handle.abort();
        }
    }
}

impl Drop for CountdownTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_countdown_per_pool() {
        let mut timers = CountdownTimers::new();
        let first = timers.start("pool", Duration::from_secs(30), |_| async {});
        let second = timers.start("pool", Duration::from_secs(30), |_| async {});
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(timers.active_count(), 1);

        // Other pools are independent
        assert!(timers.start("other", Duration::from_secs(30), |_| async {}).is_some());
        assert_eq!(timers.active_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timers = CountdownTimers::new();
        let counter = fired.clone();
        timers.start("pool", Duration::from_secs(30), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(timers.cancel("pool"));
        assert!(!timers.cancel("pool"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timers.is_active("pool"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_runs_after_window() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timers = CountdownTimers::new();
        let counter = fired.clone();
        timers.start("pool", Duration::from_secs(30), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.remaining("pool"), Some(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_rejects_stale_generation() {
        let mut timers = CountdownTimers::new();
        let first = timers
            .start("pool", Duration::from_secs(30), |_| async {})
            .unwrap();
        timers.cancel("pool");
        let second = timers
            .start("pool", Duration::from_secs(30), |_| async {})
            .unwrap();

        assert!(!timers.claim("pool", first));
        assert!(timers.is_active("pool"));
        assert!(timers.claim("pool", second));
        assert!(!timers.is_active("pool"));
    }
}
