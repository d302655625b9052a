use super::classifier::AuthErrorClassifier;
use super::escalation::Escalation;
use super::outcome::{ActionError, Outcome};
use super::refresh::RefreshCoordinator;
use super::token_inspector::{is_live, TokenInspector};
use super::token_storage::TokenStore;
use serde::de::DeserializeOwned;
use socialdash_api::{
    ApiError, ApiRequest, Endpoint, Envelope, HttpResponse, StatusCode, Transport,
    ROTATED_TOKEN_HEADER,
};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Marks whether a request is already a replay. Replays never trigger
/// another refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryToken {
    Fresh,
    Retried,
}

/// Path fragments of the credential-submission endpoints. Their failures go
/// back to the caller untouched.
const CREDENTIAL_ROUTES: [&str; 4] = ["/auth/login", "/auth/register", "/login", "/register"];

fn is_credential_request(request: &ApiRequest) -> bool {
    CREDENTIAL_ROUTES
        .iter()
        .any(|fragment| request.targets(fragment))
}

/// Decoded answer from a 2xx response.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub envelope: Envelope<T>,
}

impl<T: DeserializeOwned> Reply<T> {
    fn from_response(response: &HttpResponse) -> Result<Self, ApiError> {
        Ok(Self {
            status: response.status,
            envelope: response.envelope()?,
        })
    }
}

impl<T> Reply<T> {
    /// The payload when the status is exactly `expected` and the envelope
    /// reports success; otherwise the server's description or `default`.
    pub fn accept(self, expected: StatusCode, default: &str) -> Outcome<T> {
        if self.status == expected && self.envelope.is_successful() {
            if let Some(data) = self.envelope.data {
                return Ok(data);
            }
        }
        Err(self.rejection(default))
    }

    /// Like [`Reply::accept`] for operations whose payload is irrelevant.
    pub fn accept_empty(self, expected: StatusCode, default: &str) -> Outcome<()> {
        if self.status == expected && self.envelope.is_successful() {
            return Ok(());
        }
        Err(self.rejection(default))
    }

    fn rejection(self, default: &str) -> ActionError {
        ActionError::rejected(
            self.envelope
                .error_description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| default.to_string()),
        )
    }
}

/// Every backend call goes through here.
///
/// Outbound, the current credential is attached. Inbound, a rotated
/// credential header is persisted, an expired credential triggers one shared
/// refresh and a replay, and unrecoverable auth failures end the session.
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    classifier: AuthErrorClassifier,
    refresher: Arc<RefreshCoordinator>,
    escalation: Arc<Escalation>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        refresher: Arc<RefreshCoordinator>,
        escalation: Arc<Escalation>,
    ) -> Self {
        let classifier = AuthErrorClassifier::new(TokenInspector::new(store.clone()));
        Self {
            transport,
            store,
            classifier,
            refresher,
            escalation,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn classifier(&self) -> &AuthErrorClassifier {
        &self.classifier
    }

    /// Sends a typed endpoint and decodes its envelope.
    pub async fn send<E: Endpoint>(&self, endpoint: &E) -> Result<Reply<E::Response>, ApiError> {
        let request = ApiRequest::from_endpoint(endpoint)?;
        let response = self.execute(&request).await?;
        Reply::from_response(&response)
    }

    /// Sends a raw request with full recovery. Resolves with the 2xx
    /// response or the error that ended the attempt.
    pub async fn execute(&self, request: &ApiRequest) -> Result<HttpResponse, ApiError> {
        let span = tracing::debug_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.dispatch(request, RetryToken::Fresh)
            .instrument(span)
            .await
    }

    /// Attaches the credential and persists rotations, nothing more: no
    /// refresh, no escalation.
    pub async fn send_best_effort<E: Endpoint>(&self, endpoint: &E) -> Result<HttpResponse, ApiError> {
        let request = ApiRequest::from_endpoint(endpoint)?;
        let bearer = self.store.access_token();
        let response = self.transport.execute(&request, bearer.as_deref()).await?;
        if response.is_success() {
            self.absorb_rotation(&response);
            Ok(response)
        } else {
            Err(response.into_error(request.path))
        }
    }

    async fn dispatch(&self, request: &ApiRequest, retry: RetryToken) -> Result<HttpResponse, ApiError> {
        let bearer = self.store.access_token();
        let response = self.attempt(request, bearer.as_deref()).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = response.into_error(request.path.clone());
        if is_credential_request(request) {
            return Err(error);
        }

        if retry == RetryToken::Fresh && error.status() == Some(StatusCode::UNAUTHORIZED) {
            if let Some(replacement) = self.recover(bearer.as_deref()).await? {
                return self.replay(request, &replacement).await;
            }
        }

        Err(self.settle(error))
    }

    /// Finds a credential to replay a 401 with. `Ok(None)` means the request
    /// isn't refresh-eligible; `Err` is a failed refresh.
    async fn recover(&self, sent_with: Option<&str>) -> Result<Option<String>, ApiError> {
        let Some(current) = self.store.access_token() else {
            return Ok(None);
        };

        if is_live(&current) {
            // Someone else refreshed while this request was in flight
            if sent_with != Some(current.as_str()) {
                debug!("Replaying with the credential stored since dispatch");
                return Ok(Some(current));
            }
            return Ok(None);
        }

        if self.store.user_id().is_none() {
            return Ok(None);
        }

        match self.refresher.refresh().await {
            Ok(token) => Ok(Some(token)),
            Err(refresh_error) => {
                warn!("Credential refresh failed: {}", refresh_error);
                if self.classifier.is_auth_error(&refresh_error) {
                    self.escalation.escalate(&refresh_error);
                }
                Err(refresh_error)
            }
        }
    }

    async fn replay(&self, request: &ApiRequest, bearer: &str) -> Result<HttpResponse, ApiError> {
        info!("Replaying request with refreshed credential");
        let response = self.attempt(request, Some(bearer)).await?;
        if response.is_success() {
            return Ok(response);
        }
        let error = response.into_error(request.path.clone());
        Err(self.settle(error))
    }

    async fn attempt(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<HttpResponse, ApiError> {
        debug!("{} {}", request.method, request.path);
        let response = self.transport.execute(request, bearer).await?;
        if response.is_success() {
            self.absorb_rotation(&response);
        }
        Ok(response)
    }

    /// Final classification of a failure that won't be retried.
    fn settle(&self, error: ApiError) -> ApiError {
        if self.classifier.is_auth_error(&error) {
            self.escalation.escalate(&error);
        }
        error
    }

    fn absorb_rotation(&self, response: &HttpResponse) {
        if let Some(token) = response.header(ROTATED_TOKEN_HEADER).filter(|t| !t.is_empty()) {
            debug!("Server rotated the access token");
            self.store.set_access_token(token);
        }
    }
}
