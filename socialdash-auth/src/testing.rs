//! Test doubles for code built on the request pipeline.

use crate::client::escalation::RouteTracker;
use crate::client::token_storage::TokenStore;
use crate::client::AuthContext;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use socialdash_api::endpoints::auth::UserProfile;
use socialdash_api::{ApiError, ApiRequest, Envelope, HttpResponse, Method, StatusCode, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds an unsigned token whose payload carries `user_id` and `exp`.
pub fn issue_token(user_id: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "user_id": user_id, "iat": exp - 3600, "exp": exp }).to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

pub fn live_token(user_id: &str) -> String {
    issue_token(user_id, Utc::now().timestamp() + 3600)
}

pub fn expired_token(user_id: &str) -> String {
    issue_token(user_id, Utc::now().timestamp() - 60)
}

pub fn sample_user() -> UserProfile {
    UserProfile {
        id: "u1".to_string(),
        email: "ana@example.com".to_string(),
        name: "Ana".to_string(),
        role: "user".to_string(),
    }
}

/// `{STATUS: SUCCESSFUL, DB_DATA: data}` with the given status code.
pub fn envelope_response<T: Serialize>(status: StatusCode, data: T) -> HttpResponse {
    HttpResponse::json(status, &Envelope::successful(data))
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    envelope_response(StatusCode::OK, data)
}

pub fn refresh_ok(token: &str) -> HttpResponse {
    ok(json!({ "access_token": token }))
}

/// A failed response carrying the backend's error fields.
pub fn failure(status: StatusCode, code: Option<&str>, description: Option<&str>) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({
            "STATUS": "FAILED",
            "ERROR_CODE": code,
            "ERROR_DESCRIPTION": description,
        }),
    )
}

pub fn unauthorized() -> HttpResponse {
    failure(StatusCode::UNAUTHORIZED, None, None)
}

type Responder = Arc<dyn Fn(&ApiRequest, Option<&str>) -> Result<HttpResponse, ApiError> + Send + Sync>;

#[derive(Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(ApiError),
    Dynamic(Responder),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: ApiRequest,
    pub bearer: Option<String>,
}

type Route = (Method, String);

/// Scripted [`Transport`]. Each route holds a queue of answers; the last one
/// repeats. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<Route, VecDeque<Scripted>>>,
    delays: Mutex<HashMap<Route, Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn on(&self, method: Method, path: &str, response: HttpResponse) -> &Self {
        self.push(method, path, Scripted::Respond(response))
    }

    pub fn fail(&self, method: Method, path: &str, error: ApiError) -> &Self {
        self.push(method, path, Scripted::Fail(error))
    }

    /// Answers computed from the request and the bearer it carried.
    pub fn respond_with<F>(&self, method: Method, path: &str, responder: F) -> &Self
    where
        F: Fn(&ApiRequest, Option<&str>) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
    {
        self.push(method, path, Scripted::Dynamic(Arc::new(responder)))
    }

    pub fn delay(&self, method: Method, path: &str, delay: Duration) -> &Self {
        self.delays
            .lock()
            .unwrap()
            .insert((method, path.to_string()), delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.request.path == path)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls_to(path).len()
    }

    fn next(&self, route: &Route) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(route)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            request: request.clone(),
            bearer: bearer.map(str::to_string),
        });

        let route = (request.method.clone(), request.path.clone());
        let delay = self.delays.lock().unwrap().get(&route).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next(&route) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Dynamic(responder)) => responder(request, bearer),
            None => Ok(failure(StatusCode::NOT_FOUND, None, Some("No route scripted"))),
        }
    }
}

/// Wires an [`AuthContext`] over in-memory storage, a [`RouteTracker`] at
/// `location`, and the default 1.5s redirect delay.
pub fn context(transport: Arc<MockTransport>, location: &str) -> (AuthContext, Arc<RouteTracker>) {
    let tracker = Arc::new(RouteTracker::new(location));
    let context = AuthContext::new(
        transport,
        TokenStore::in_memory(),
        tracker.clone(),
        Duration::from_millis(1500),
    );
    (context, tracker)
}

/// Stores a logged-in user with `token` as the credential.
pub fn seed_session(store: &TokenStore, token: &str) {
    store.persist_login(&sample_user(), token);
}
