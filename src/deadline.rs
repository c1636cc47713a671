use crate::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Point in time after which an operation is abandoned.
///
/// Passed down into upstream calls so the timeout travels with the request
/// instead of being raced against it. Futures run through [`Deadline::run`]
/// are dropped once the deadline passes, so nothing keeps running in the
/// background and no partial result is observed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub async fn run<F, T>(&self, operation: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        if self.is_expired() {
            return Err(FetchError::Timeout);
        }
        match tokio::time::timeout_at(self.at, operation).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert_eq!(deadline.remaining(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(deadline.remaining(), Duration::from_secs(3));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn run_completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, FetchError>(7)
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_slow_operation() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, FetchError>(())
            })
            .await;
        assert_eq!(result, Err(FetchError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_never_polls() {
        let deadline = Deadline::after(Duration::from_millis(10));
        tokio::time::advance(Duration::from_secs(1)).await;

        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = deadline
            .run(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, FetchError>(())
            })
            .await;
        assert_eq!(result, Err(FetchError::Timeout));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }
}
