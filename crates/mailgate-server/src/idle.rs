//! Idle auto-stop timer.
//!
//! In subscribe mode the host expects the process to exit once no request
//! has arrived for a while. At most one timeout task is pending at a time;
//! resetting aborts the previous one first.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Idle span after which the stop signal fires.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct IdleTimer {
    stop: Arc<Notify>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl IdleTimer {
    pub fn new(stop: Arc<Notify>) -> Self {
        Self {
            stop,
            pending: Mutex::new(None),
        }
    }

    /// Cancel any pending timeout, then arm a new one, but only in
    /// subscribe mode. Firing is best-effort.
    pub fn reset(&self, subscribe: bool) {
        self.cancel();
        if !subscribe {
            return;
        }

        let stop = Arc::clone(&self.stop);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(IDLE_TIMEOUT).await;
            stop.notify_one();
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(handle);
        }
    }

    /// Abort any pending timeout. Idempotent.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_timeout_in_subscribe_mode() {
        let stop = Arc::new(Notify::new());
        let timer = IdleTimer::new(Arc::clone(&stop));

        timer.reset(true);
        tokio::task::yield_now().await;
        advance(IDLE_TIMEOUT + Duration::from_millis(1)).await;

        timeout(Duration::from_secs(1), stop.notified())
            .await
            .expect("stop signal expected after the idle timeout");

        // Exactly once: no second permit shows up.
        advance(IDLE_TIMEOUT * 2).await;
        assert!(timeout(Duration::from_secs(1), stop.notified()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn never_fires_outside_subscribe_mode() {
        let stop = Arc::new(Notify::new());
        let timer = IdleTimer::new(Arc::clone(&stop));

        timer.reset(false);
        advance(IDLE_TIMEOUT * 3).await;

        assert!(timeout(Duration::from_secs(1), stop.notified()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_replaces_the_pending_timeout() {
        let stop = Arc::new(Notify::new());
        let timer = IdleTimer::new(Arc::clone(&stop));

        timer.reset(true);
        tokio::task::yield_now().await;
        advance(Duration::from_secs(20)).await;

        // Re-arm 20s in; the original deadline passes without firing.
        timer.reset(true);
        tokio::task::yield_now().await;
        advance(Duration::from_secs(15)).await;
        assert!(timeout(Duration::from_millis(10), stop.notified()).await.is_err());

        // The replacement deadline fires.
        advance(Duration::from_secs(16)).await;
        timeout(Duration::from_secs(1), stop.notified())
            .await
            .expect("stop signal expected from the re-armed timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let stop = Arc::new(Notify::new());
        let timer = IdleTimer::new(Arc::clone(&stop));

        timer.cancel();
        timer.reset(true);
        timer.cancel();
        timer.cancel();

        advance(IDLE_TIMEOUT * 2).await;
        assert!(timeout(Duration::from_secs(1), stop.notified()).await.is_err());
    }
}
