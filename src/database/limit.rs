use super::DatabaseError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the sessions a handle has open at once. Callers over the cap wait
/// for a permit instead of failing.
#[derive(Clone, Debug)]
pub struct SessionLimit {
    permits: Arc<Semaphore>,
    max: usize,
}

impl SessionLimit {
    /// A limit of at least one session.
    #[must_use]
    pub fn new(max: u32) -> Self {
        let max = usize::try_from(max.max(1)).unwrap_or(1);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Wait for a free session slot. The slot is held until the permit is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the limit was closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, DatabaseError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| DatabaseError::Worker(format!("session limit closed: {e}")))
    }

    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_is_raised_to_one() {
        assert_eq!(SessionLimit::new(0).max(), 1);
        assert_eq!(SessionLimit::new(5).available(), 5);
    }

    #[tokio::test]
    async fn test_caller_over_limit_waits() -> anyhow::Result<()> {
        let limit = SessionLimit::new(2);
        let first = limit.acquire().await?;
        let _second = limit.acquire().await?;
        assert_eq!(limit.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(20), limit.acquire()).await;
        assert!(blocked.is_err());

        drop(first);
        let third = tokio::time::timeout(Duration::from_millis(20), limit.acquire()).await;
        assert!(matches!(third, Ok(Ok(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_clones_share_permits() -> anyhow::Result<()> {
        let limit = SessionLimit::new(1);
        let shared = limit.clone();
        let _held = limit.acquire().await?;
        assert_eq!(shared.available(), 0);
        Ok(())
    }
}
