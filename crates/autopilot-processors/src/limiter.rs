//! The global concurrency cap shared by the dispatcher and every processor
//! (§5 "Global concurrency cap"). `max_dispatch == 0` means unbounded, which
//! we model as "no semaphore" rather than an absurdly large one.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone)]
pub struct DispatchLimiter(Option<Arc<Semaphore>>);

impl DispatchLimiter {
    pub fn new(max_dispatch: usize) -> Self {
        Self((max_dispatch > 0).then(|| Arc::new(Semaphore::new(max_dispatch))))
    }

    pub fn unbounded() -> Self {
        Self(None)
    }

    /// Acquire a permit, held for as long as the returned guard lives.
    /// `None` when unbounded — nothing to hold.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.0 {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .expect("dispatch semaphore is never closed"),
            ),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_limiter_caps_concurrent_holders() {
        let limiter = DispatchLimiter::new(1);
        let first = limiter.acquire().await;
        assert!(first.is_some());

        let second = tokio::time::timeout(std::time::Duration::from_millis(20), limiter.acquire()).await;
        assert!(second.is_err(), "second acquire should block while the cap is held");
    }

    #[tokio::test]
    async fn unbounded_limiter_never_blocks() {
        let limiter = DispatchLimiter::unbounded();
        assert!(limiter.acquire().await.is_none());
        assert!(limiter.acquire().await.is_none());
    }
}
