use super::error::ClientError;
use crate::logger::*;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// What the coordinator needs from the caller's session: a way to refresh it,
/// and a way to drop it once refreshing is hopeless.
#[async_trait::async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), ClientError>;
    async fn clear_session(&self);
}

type RefreshOutcome = Result<(), Arc<ClientError>>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Replays requests that fail with 401 after a single shared refresh.
///
/// However many requests fail at once, at most one refresh runs; the others
/// wait on it. If it fails the local session is cleared once, inside the
/// shared future, and each waiter gets back its own original error.
pub struct RefreshCoordinator {
    refresher: Arc<dyn SessionRefresher>,
    in_flight: Arc<Mutex<Option<(u64, InFlight)>>>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn SessionRefresher>) -> Self {
        Self {
            refresher,
            in_flight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `request`, refreshing and replaying it once on a 401.
    pub async fn execute<T, F, Fut>(&self, mut request: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut retried = false;
        loop {
            match request().await {
                Err(err) if err.is_unauthorized() && !retried => {
                    retried = true;
                    if let Err(refresh_err) = self.refresh_once().await {
                        debug!(error = %refresh_err, "refresh failed, giving up on request");
                        return Err(err);
                    }
                    debug!("session refreshed, replaying request");
                }
                other => return other,
            }
        }
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<(u64, InFlight)>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the running refresh, or start one.
    fn refresh_once(&self) -> InFlight {
        let mut slot = self.slot();
        if let Some((_, running)) = slot.as_ref() {
            trace!("joining in-flight refresh");
            return running.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let refresher = self.refresher.clone();
        let in_flight = self.in_flight.clone();
        let refresh = async move {
            let outcome = refresher.refresh().await.map_err(Arc::new);
            if let Err(e) = &outcome {
                warn!(error = %e, "session refresh failed, clearing session");
                refresher.clear_session().await;
            }
            let mut slot = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(slot.as_ref(), Some((g, _)) if *g == generation) {
                *slot = None;
            }
            outcome
        }
        .boxed()
        .shared();

        *slot = Some((generation, refresh.clone()));
        refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    struct CountingRefresher {
        refreshes: AtomicUsize,
        clears: AtomicUsize,
        succeed: bool,
        authorized: Arc<AtomicBool>,
    }

    impl CountingRefresher {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                succeed,
                authorized: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    #[async_trait::async_trait]
    impl SessionRefresher for CountingRefresher {
        async fn refresh(&self) -> Result<(), ClientError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.succeed {
                self.authorized.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(unauthorized("RefreshMismatch"))
            }
        }

        async fn clear_session(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn unauthorized(code: &str) -> ClientError {
        ClientError::Status {
            status: StatusCode::UNAUTHORIZED,
            code: Some(code.to_string()),
        }
    }

    /// A protected call that succeeds only once the session is refreshed.
    async fn protected_call(
        authorized: &AtomicBool,
        attempts: &AtomicUsize,
        id: usize,
    ) -> Result<usize, ClientError> {
        attempts.fetch_add(1, Ordering::SeqCst);
        if authorized.load(Ordering::SeqCst) {
            Ok(id)
        } else {
            Err(unauthorized("ExpiredCredential"))
        }
    }

    #[tokio::test]
    async fn concurrent_failures_share_one_refresh() {
        let refresher = CountingRefresher::new(true);
        let coordinator = RefreshCoordinator::new(refresher.clone());
        let attempts = AtomicUsize::new(0);
        let authorized = refresher.authorized.clone();

        let (coordinator_ref, authorized_ref, attempts_ref) =
            (&coordinator, authorized.as_ref(), &attempts);

        let results = join_all((0..5).map(move |id| {
            coordinator_ref.execute(move || protected_call(authorized_ref, attempts_ref, id))
        }))
        .await;

        assert_eq!(refresher.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.clears.load(Ordering::SeqCst), 0);
        // 5 failures + 5 replays
        assert_eq!(attempts.load(Ordering::SeqCst), 10);
        let ids: Vec<usize> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(!coordinator.refresh_in_flight());
    }

    #[tokio::test]
    async fn failed_refresh_fails_every_waiter_and_clears_once() {
        let refresher = CountingRefresher::new(false);
        let coordinator = RefreshCoordinator::new(refresher.clone());
        let attempts = AtomicUsize::new(0);
        let authorized = refresher.authorized.clone();

        let (coordinator_ref, authorized_ref, attempts_ref) =
            (&coordinator, authorized.as_ref(), &attempts);

        let results = join_all((0..5).map(move |id| {
            coordinator_ref.execute(move || protected_call(authorized_ref, attempts_ref, id))
        }))
        .await;

        assert_eq!(refresher.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.clears.load(Ordering::SeqCst), 1);
        // nobody is replayed
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        for result in results {
            let err = result.unwrap_err();
            assert!(err.is_unauthorized());
            assert_eq!(err.code(), Some("ExpiredCredential"));
        }
        assert!(!coordinator.refresh_in_flight());
    }

    #[tokio::test]
    async fn retried_request_is_not_retried_again() {
        let refresher = CountingRefresher::new(true);
        let coordinator = RefreshCoordinator::new(refresher.clone());
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;

        let result: Result<(), ClientError> = coordinator
            .execute(move || async move {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                Err(unauthorized("UnknownIdentity"))
            })
            .await;

        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(refresher.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_failures_pass_through_untouched() {
        let refresher = CountingRefresher::new(true);
        let coordinator = RefreshCoordinator::new(refresher.clone());

        let result: Result<(), ClientError> = coordinator
            .execute(|| async {
                Err(ClientError::Status {
                    status: StatusCode::FORBIDDEN,
                    code: Some("Forbidden".to_string()),
                })
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(refresher.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn later_failure_starts_a_new_refresh() {
        let refresher = CountingRefresher::new(true);
        let coordinator = RefreshCoordinator::new(refresher.clone());
        let attempts = AtomicUsize::new(0);
        let authorized = refresher.authorized.clone();
        let (authorized_ref, attempts_ref) = (authorized.as_ref(), &attempts);

        coordinator
            .execute(move || protected_call(authorized_ref, attempts_ref, 0))
            .await
            .unwrap();
        // the new access credential expires too
        authorized.store(false, Ordering::SeqCst);
        coordinator
            .execute(move || protected_call(authorized_ref, attempts_ref, 1))
            .await
            .unwrap();

        assert_eq!(refresher.refreshes.load(Ordering::SeqCst), 2);
    }
}
