// src/bot/poll.rs

//! The one wait primitive every loop in the crate goes through.
//!
//! Waiting always races the worker's [`CancellationToken`], so a stop
//! request interrupts any sleep or poll within one interval.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{BotError, Result};

const MIN_POLL_STEP: Duration = Duration::from_millis(10);

/// Sleep for `duration` unless the token fires first.
pub async fn sleep_or_stop(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(BotError::Stopped);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(BotError::Stopped),
    }
}

/// Call `probe` every `interval` until it returns `true` or `timeout` has
/// elapsed.
///
/// - The probe runs at least once, even with a zero timeout.
/// - `Ok(false)` means the timeout elapsed.
/// - A probe error or a stop request ends the wait with that error.
pub async fn poll_until<F, Fut>(
    cancel: &CancellationToken,
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(BotError::Stopped);
        }
        if probe().await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        let step = if interval.is_zero() { MIN_POLL_STEP } else { interval };
        sleep_or_stop(cancel, step.min(deadline - now)).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn returns_true_once_probe_succeeds() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let hit = poll_until(&cancel, Duration::from_secs(1), Duration::from_secs(10), || {
            let c = Arc::clone(&c);
            async move { Ok(c.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();

        assert!(hit);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_false() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let hit = poll_until(&cancel, Duration::from_secs(1), Duration::from_secs(5), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        })
        .await
        .unwrap();

        assert!(!hit);
        // t = 0,1,2,3,4,5
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn zero_timeout_probes_once() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let hit = poll_until(&cancel, Duration::ZERO, Duration::ZERO, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        })
        .await
        .unwrap();

        assert!(!hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let res = poll_until(&cancel, Duration::from_secs(1), Duration::from_secs(60), || async {
            Ok(false)
        })
        .await;

        assert!(matches!(res, Err(BotError::Stopped)));
    }

    #[tokio::test]
    async fn sleep_refuses_when_already_stopped() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = sleep_or_stop(&cancel, Duration::ZERO).await;
        assert!(matches!(res, Err(BotError::Stopped)));
    }
}
