//! Single-flight session renewal.
//!
//! # Design
//! When several requests observe an expired session at once, only one of
//! them may call the renewal endpoint. The coordinator keeps the in-flight
//! renewal as a `Shared` future: the first caller installs it, every later
//! caller clones and awaits the same future, and all of them observe the same
//! outcome. The renewal clears its own slot when it completes, so the next
//! expiry starts a fresh attempt.
//!
//! The coordinator is an owned value (one per client), never a global. The
//! slot lock is never held across an await.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::error::ApiError;

type Renewal = Shared<BoxFuture<'static, Result<(), ApiError>>>;

/// De-duplicates concurrent session renewals.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    in_flight: Arc<Mutex<Option<Renewal>>>,
    started: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the session to be renewed.
    ///
    /// Joins the renewal already in flight if there is one; otherwise calls
    /// `renew` to start exactly one. Every caller sharing a renewal gets the
    /// same result.
    pub async fn ensure_renewed<F, Fut>(&self, renew: F) -> Result<(), ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let renewal = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(existing) => {
                    debug!("joining in-flight session renewal");
                    existing.clone()
                }
                None => {
                    let attempt = self.started.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(attempt, "renewing session");
                    let renewal = Self::install(Arc::clone(&self.in_flight), attempt, renew());
                    *slot = Some(renewal.clone());
                    renewal
                }
            }
        };
        renewal.await
    }

    fn install<Fut>(slot: Arc<Mutex<Option<Renewal>>>, attempt: u64, renew: Fut) -> Renewal
    where
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        async move {
            let outcome = renew.await;
            lock(&slot).take();
            match &outcome {
                Ok(()) => info!(attempt, "session renewed"),
                Err(err) => warn!(attempt, status = err.status, error = %err, "session renewal failed"),
            }
            outcome
        }
        .boxed()
        .shared()
    }

    /// Whether a renewal is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Number of renewals started by this coordinator.
    pub fn renewals_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &self.is_in_flight())
            .field("renewals_started", &self.renewals_started())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn concurrent_callers_share_one_renewal() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let calls = Arc::clone(&calls);
            coordinator.ensure_renewed(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = gate.await;
                Ok(())
            })
        };
        let others = (0..4).map(|_| {
            let calls = Arc::clone(&calls);
            coordinator.ensure_renewed(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let joined = futures::future::join_all(std::iter::once(first.boxed()).chain(others.map(|f| f.boxed())));
        let (results, ()) = tokio::join!(joined, async {
            tokio::task::yield_now().await;
            let _ = release.send(());
        });

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.renewals_started(), 1);
        assert!(!coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn failure_is_shared_and_slot_is_cleared() {
        let coordinator = RefreshCoordinator::new();
        let (release, gate) = oneshot::channel::<()>();

        let first = coordinator.ensure_renewed(move || async move {
            let _ = gate.await;
            Err(ApiError::new("Unable to refresh session.", 401))
        });
        let second = coordinator.ensure_renewed(|| async { Ok(()) });

        let (a, b, ()) = tokio::join!(first, second, async {
            tokio::task::yield_now().await;
            let _ = release.send(());
        });

        assert_eq!(a.unwrap_err().message, "Unable to refresh session.");
        assert_eq!(b.unwrap_err().status, 401);
        assert!(!coordinator.is_in_flight());
        assert_eq!(coordinator.renewals_started(), 1);
    }

    #[tokio::test]
    async fn sequential_expiries_start_fresh_renewals() {
        let coordinator = RefreshCoordinator::new();
        coordinator.ensure_renewed(|| async { Ok(()) }).await.unwrap();
        let err = coordinator
            .ensure_renewed(|| async { Err(ApiError::network("refused")) })
            .await
            .unwrap_err();
        assert!(err.is_network());
        coordinator.ensure_renewed(|| async { Ok(()) }).await.unwrap();
        assert_eq!(coordinator.renewals_started(), 3);
    }

    #[tokio::test]
    async fn independent_coordinators_do_not_share_state() {
        let a = RefreshCoordinator::new();
        let b = RefreshCoordinator::new();
        a.ensure_renewed(|| async { Ok(()) }).await.unwrap();
        assert_eq!(a.renewals_started(), 1);
        assert_eq!(b.renewals_started(), 0);
    }
}
