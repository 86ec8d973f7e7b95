//! Fire-and-forget background work.
//!
//! Tasks are tracked so shutdown can wait for them, but nothing submitted
//! here can fail the caller: errors and panics end up in the log.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::task::TaskTracker;

#[derive(Clone, Default)]
pub struct Background {
    tracker: TaskTracker,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` on its own tokio task. `name` identifies it in the log.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let inner = tokio::spawn(task);
        self.tracker.spawn(async move {
            match inner.await {
                Ok(Ok(())) => tracing::debug!(task = name, "background task finished"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "background task failed"),
                Err(e) if e.is_panic() => {
                    tracing::error!(task = name, error = %e, "background task panicked")
                }
                Err(e) => tracing::warn!(task = name, error = %e, "background task cancelled"),
            }
        });
    }

    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait up to `grace` for running tasks.
    /// Returns whether every task finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "waiting for background tasks");
        }
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_shutdown_waits_for_tasks() {
        let background = Background::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            background.spawn("count", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            });
        }

        assert!(background.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(background.active(), 0);
    }

    fn background_should_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_failures_do_not_escape() {
        let background = Background::new();
        background.spawn("fails", async { Err::<(), _>("smtp unreachable") });
        background.spawn("panics", async {
            if background_should_panic() {
                panic!("boom");
            }
            Ok::<(), String>(())
        });

        assert!(background.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let background = Background::new();
        background.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, String>(())
        });

        assert!(!background.shutdown(Duration::from_millis(20)).await);
    }
}
