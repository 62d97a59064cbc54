//! Bounded polling for conditions that appear with a delay

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `check` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The check always runs at least once, so a zero timeout still observes the
/// current state. Resolves to `None` when nothing was observed in time.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        let pause = interval.min(deadline - now);
        if pause.is_zero() {
            return None;
        }
        tokio::time::sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn check_runs_once_with_zero_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Option<()> = poll_until(Duration::ZERO, Duration::from_millis(10), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }
        })
        .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn observes_late_condition() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = poll_until(Duration::from_secs(1), Duration::from_millis(100), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                (n >= 3).then_some(n)
            }
        })
        .await;
        assert_eq!(result, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        let start = Instant::now();
        let result: Option<u8> =
            poll_until(Duration::from_millis(500), Duration::from_millis(100), || async {
                None
            })
            .await;
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(700));
    }
}
