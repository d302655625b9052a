use super::token_storage::TokenStore;
use socialdash_api::endpoints::auth::RefreshPayload;
use socialdash_api::{ApiError, ApiRequest, Request, Transport};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Waiter = oneshot::Sender<Result<String, ApiError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Serialises credential refreshes. The first caller performs the refresh;
/// everyone arriving while it is in flight waits for the same outcome.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, store: TokenStore) -> Self {
        Self {
            transport,
            store,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        // Nothing panics while the lock is held; recover the state regardless.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Obtains a new access token, persisting it before anyone is told.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let queued = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = queued {
            debug!("Refresh already in flight, waiting for its outcome");
            return rx.await.unwrap_or(Err(ApiError::RefreshAborted));
        }

        let mut flight = InFlight {
            coordinator: self,
            settled: false,
        };
        let outcome = self.request_new_token().await;
        flight.settle(&outcome);
        outcome
    }

    async fn request_new_token(&self) -> Result<String, ApiError> {
        let user_id = self.store.user_id().ok_or(ApiError::MissingSubject)?;
        info!("Refreshing access token");

        // Sent without a bearer, straight to the transport
        let endpoint = Request::auth().refresh(user_id);
        let request = ApiRequest::from_endpoint(&endpoint)?;
        let response = self.transport.execute(&request, None).await?;

        if !response.is_success() {
            warn!("Refresh rejected with status {}", response.status);
            return Err(response.into_error(request.path));
        }

        let envelope = response.envelope::<RefreshPayload>()?;
        if !envelope.is_successful() {
            warn!("Refresh envelope reported failure");
            return Err(response.into_error(request.path));
        }

        let token = envelope
            .data
            .map(|payload| payload.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Decode("No access token in refresh response".to_string()))?;

        self.store.set_access_token(&token);
        info!("Access token refreshed");
        Ok(token)
    }

    fn release(&self, outcome: Result<String, ApiError>) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        if !waiters.is_empty() {
            debug!("Releasing {} queued request(s)", waiters.len());
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Clears the refreshing flag even if the refreshing future is dropped.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, outcome: &Result<String, ApiError>) {
        self.settled = true;
        self.coordinator.release(outcome.clone());
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.release(Err(ApiError::RefreshAborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::token_storage::USER_ID;
    use crate::testing::{refresh_ok, MockTransport};
    use socialdash_api::endpoints::paths;
    use socialdash_api::{HttpResponse, Method, StatusCode};
    use std::time::Duration;

    fn coordinator(transport: &Arc<MockTransport>) -> (Arc<RefreshCoordinator>, TokenStore) {
        let store = TokenStore::in_memory();
        store.set(USER_ID, "u1");
        let coordinator = Arc::new(RefreshCoordinator::new(transport.clone(), store.clone()));
        (coordinator, store)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::POST, paths::REFRESH, refresh_ok("new-token"));
        transport.delay(Method::POST, paths::REFRESH, Duration::from_millis(50));
        let (coordinator, store) = coordinator(&transport);

        let (a, b, c) = tokio::join!(
            coordinator.refresh(),
            coordinator.refresh(),
            coordinator.refresh()
        );

        assert_eq!(a.unwrap(), "new-token");
        assert_eq!(b.unwrap(), "new-token");
        assert_eq!(c.unwrap(), "new-token");
        assert_eq!(transport.count(paths::REFRESH), 1);
        assert_eq!(store.access_token().as_deref(), Some("new-token"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_shared_with_waiters() {
        let transport = Arc::new(MockTransport::new());
        transport.on(
            Method::POST,
            paths::REFRESH,
            HttpResponse::new(StatusCode::UNAUTHORIZED, r#"{"ERROR_CODE":"VTAPP-AUTH006"}"#),
        );
        transport.delay(Method::POST, paths::REFRESH, Duration::from_millis(50));
        let (coordinator, _) = coordinator(&transport);

        let (a, b) = tokio::join!(coordinator.refresh(), coordinator.refresh());
        assert_eq!(a.unwrap_err().status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(b.unwrap_err().status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(transport.count(paths::REFRESH), 1);
    }

    #[tokio::test]
    async fn refresh_sends_user_id_without_bearer() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::POST, paths::REFRESH, refresh_ok("t"));
        let (coordinator, _) = coordinator(&transport);

        coordinator.refresh().await.unwrap();
        let call = &transport.calls_to(paths::REFRESH)[0];
        assert_eq!(call.bearer, None);
        assert_eq!(
            call.request.body.as_ref().and_then(|b| b.get("user_id")).and_then(|v| v.as_str()),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn missing_user_id_fails_without_network() {
        let transport = Arc::new(MockTransport::new());
        let coordinator = RefreshCoordinator::new(transport.clone(), TokenStore::in_memory());

        assert_eq!(coordinator.refresh().await, Err(ApiError::MissingSubject));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_refresh_releases_waiters() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::POST, paths::REFRESH, refresh_ok("t"));
        transport.delay(Method::POST, paths::REFRESH, Duration::from_secs(60));
        let (coordinator, _) = coordinator(&transport);

        let leader = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        tokio::task::yield_now().await;
        assert!(coordinator.is_refreshing());

        let waiter = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        tokio::task::yield_now().await;

        leader.abort();
        assert_eq!(waiter.await.unwrap(), Err(ApiError::RefreshAborted));
        assert!(!coordinator.is_refreshing());
    }
}
