use serde_json::json;
use socialdash_api::endpoints::paths;
use socialdash_api::{ApiError, HttpResponse, Method, Request, StatusCode};
use socialdash_auth::testing::{
    context, envelope_response, expired_token, failure, live_token, ok, refresh_ok,
    sample_user, seed_session, unauthorized, MockTransport,
};
use socialdash_auth::token_storage::{SESSION_KEYS, USER_DATA, USER_EMAIL, USER_ID, USER_ROLE};
use socialdash_auth::{FailureKind, Session, SessionStatus};
use std::sync::Arc;
use std::time::Duration;

fn auth_payload(token: &str) -> serde_json::Value {
    json!({
        "user": { "_id": "u1", "email": "ana@example.com", "name": "Ana", "role": "user" },
        "access_token": token,
    })
}

#[tokio::test]
async fn test_initialize_without_cache_is_unauthenticated() {
    let transport = Arc::new(MockTransport::new());
    let (ctx, _) = context(transport.clone(), "/");

    let status = ctx.manager.initialize().await;

    assert_eq!(status, SessionStatus::Unauthenticated);
    assert_eq!(ctx.session.snapshot(), Session::unauthenticated());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_initialize_restores_live_session() {
    let transport = Arc::new(MockTransport::new());
    let (ctx, _) = context(transport.clone(), "/");
    let token = live_token("u1");
    seed_session(&ctx.store, &token);

    let status = ctx.manager.initialize().await;

    assert_eq!(status, SessionStatus::Authenticated);
    let session = ctx.session.snapshot();
    assert_eq!(session.user, Some(sample_user()));
    assert_eq!(session.credential.map(|c| c.into_inner()), Some(token));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_initialize_refreshes_expired_session() {
    let transport = Arc::new(MockTransport::new());
    let fresh = live_token("u1");
    transport.on(Method::POST, paths::REFRESH, refresh_ok(&fresh));
    let (ctx, _) = context(transport.clone(), "/");
    seed_session(&ctx.store, &expired_token("u1"));

    let status = ctx.manager.initialize().await;

    assert_eq!(status, SessionStatus::Authenticated);
    assert_eq!(
        ctx.session.snapshot().credential.map(|c| c.into_inner()),
        Some(fresh.clone())
    );
    assert_eq!(ctx.store.access_token(), Some(fresh));
    assert_eq!(transport.count(paths::REFRESH), 1);
}

#[tokio::test]
async fn test_initialize_clears_storage_when_refresh_fails() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, paths::REFRESH, unauthorized());
    let (ctx, tracker) = context(transport.clone(), "/");
    seed_session(&ctx.store, &expired_token("u1"));

    let status = ctx.manager.initialize().await;

    assert_eq!(status, SessionStatus::Unauthenticated);
    for key in SESSION_KEYS {
        assert!(ctx.store.get(key).is_none(), "{} should be cleared", key);
    }
    // Restoration failures are silent
    assert!(tracker.notices().is_empty());
}

#[tokio::test]
async fn test_initialize_passes_through_authenticating() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, paths::REFRESH, refresh_ok(&live_token("u1")));
    transport.delay(Method::POST, paths::REFRESH, Duration::from_millis(20));
    let (ctx, _) = context(transport.clone(), "/");
    seed_session(&ctx.store, &expired_token("u1"));

    let mut updates = ctx.session.subscribe();
    let manager = ctx.manager.clone();
    let restore = tokio::spawn(async move { manager.initialize().await });

    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().status, SessionStatus::Authenticating);
    assert!(ctx.manager.shows_loading("/dashboard"));
    assert!(!ctx.manager.shows_loading("/login"));
    assert!(!ctx.manager.shows_loading("/register"));

    assert_eq!(restore.await.unwrap(), SessionStatus::Authenticated);
    assert!(!ctx.manager.shows_loading("/dashboard"));
}

#[tokio::test]
async fn test_login_success_persists_session() {
    let transport = Arc::new(MockTransport::new());
    let token = live_token("u1");
    transport.on(Method::POST, paths::LOGIN, ok(auth_payload(&token)));
    let (ctx, _) = context(transport.clone(), "/login");

    let user = ctx
        .manager
        .login(Request::auth().login("ana@example.com", "secret"))
        .await
        .unwrap();

    assert_eq!(user, sample_user());
    assert!(ctx.session.snapshot().is_authenticated());
    assert_eq!(ctx.store.access_token(), Some(token));
    assert_eq!(ctx.store.user_profile(), Some(sample_user()));
    assert_eq!(ctx.store.get_string(USER_ID).as_deref(), Some("u1"));
    assert_eq!(ctx.store.get_string(USER_EMAIL).as_deref(), Some("ana@example.com"));
    assert_eq!(ctx.store.get_string(USER_ROLE).as_deref(), Some("user"));
    assert!(ctx.store.get(USER_DATA).is_some());

    let body = transport.calls_to(paths::LOGIN)[0].request.body.clone().unwrap();
    assert_eq!(body["email"], "ana@example.com");
}

#[tokio::test]
async fn test_login_never_enters_authenticating() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, paths::LOGIN, ok(auth_payload(&live_token("u1"))));
    let (ctx, _) = context(transport.clone(), "/login");
    let mut updates = ctx.session.subscribe();

    ctx.manager
        .login(Request::auth().login("ana@example.com", "secret"))
        .await
        .unwrap();

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().status, SessionStatus::Authenticated);
    assert!(!updates.has_changed().unwrap());
}

#[tokio::test]
async fn test_failed_login_leaves_status_unchanged() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, paths::LOGIN, unauthorized());
    let (ctx, tracker) = context(transport.clone(), "/login");

    let err = ctx
        .manager
        .login(Request::auth().login("ana@example.com", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidCredentials);
    assert_eq!(err.message, "Invalid email or password");
    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);
    assert!(tracker.notices().is_empty());
}

#[tokio::test]
async fn test_login_rate_limited() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, paths::LOGIN, failure(StatusCode::TOO_MANY_REQUESTS, None, None));
    let (ctx, _) = context(transport.clone(), "/login");

    let err = ctx
        .manager
        .login(Request::auth().login("ana@example.com", "secret"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::RateLimited);
    assert_eq!(
        err.message,
        "Too many authentication attempts. Please try again later."
    );
}

#[tokio::test]
async fn test_login_unsuccessful_envelope_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        Method::POST,
        paths::LOGIN,
        HttpResponse::json(
            StatusCode::OK,
            &json!({ "STATUS": "FAILED", "ERROR_DESCRIPTION": "Email not verified" }),
        ),
    );
    let (ctx, _) = context(transport.clone(), "/login");

    let err = ctx
        .manager
        .login(Request::auth().login("ana@example.com", "secret"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Rejected);
    assert_eq!(err.message, "Email not verified");
    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_register_requires_created_and_successful() {
    let transport = Arc::new(MockTransport::new());
    transport
        .on(
            Method::POST,
            paths::REGISTER,
            envelope_response(StatusCode::OK, auth_payload(&live_token("u1"))),
        )
        .on(
            Method::POST,
            paths::REGISTER,
            HttpResponse::json(StatusCode::CREATED, &json!({ "STATUS": "FAILED" })),
        );
    let (ctx, _) = context(transport.clone(), "/register");

    // 200 instead of 201
    let err = ctx
        .manager
        .register(Request::auth().register("ana@example.com", "secret", "Ana"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Registration failed");
    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);

    // 201 without SUCCESSFUL
    let err = ctx
        .manager
        .register(Request::auth().register("ana@example.com", "secret", "Ana"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected);
    assert_eq!(err.message, "Registration failed");
    assert_eq!(transport.count(paths::REGISTER), 2);
}

#[tokio::test]
async fn test_register_failure_keeps_server_message_over_payload() {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        Method::POST,
        paths::REGISTER,
        HttpResponse::json(
            StatusCode::OK,
            &json!({
                "STATUS": "FAILED",
                "DB_DATA": {},
                "ERROR_DESCRIPTION": "Email already registered"
            }),
        ),
    );
    let (ctx, _) = context(transport.clone(), "/register");

    // DB_DATA does not fit the success payload; the description must survive
    let err = ctx
        .manager
        .register(Request::auth().register("ana@example.com", "secret", "Ana"))
        .await
        .unwrap_err();

    assert_eq!(err.message, "Email already registered");
    assert_eq!(err.kind, FailureKind::Rejected);
    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);
    assert_eq!(ctx.store.access_token(), None);
}

#[tokio::test]
async fn test_register_success() {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        Method::POST,
        paths::REGISTER,
        envelope_response(StatusCode::CREATED, auth_payload(&live_token("u1"))),
    );
    let (ctx, _) = context(transport.clone(), "/register");

    let user = ctx
        .manager
        .register(Request::auth().register("ana@example.com", "secret", "Ana"))
        .await
        .unwrap();

    assert_eq!(user.id, "u1");
    assert!(ctx.session.snapshot().is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_even_when_remote_fails() {
    let transport = Arc::new(MockTransport::new());
    transport.fail(Method::POST, paths::LOGOUT, ApiError::Network("connection reset".into()));
    let (ctx, tracker) = context(transport.clone(), "/dashboard");
    seed_session(&ctx.store, &live_token("u1"));
    ctx.manager.initialize().await;
    assert!(ctx.session.snapshot().is_authenticated());

    ctx.manager.logout().await;

    assert_eq!(transport.count(paths::LOGOUT), 1);
    for key in SESSION_KEYS {
        assert!(ctx.store.get(key).is_none(), "{} should be cleared", key);
    }
    assert_eq!(ctx.session.snapshot(), Session::unauthenticated());
    assert!(tracker.notices().is_empty());
}

#[tokio::test]
async fn test_refresh_without_user_id_fails_locally() {
    let transport = Arc::new(MockTransport::new());
    let (ctx, _) = context(transport.clone(), "/dashboard");

    let err = ctx.manager.refresh_access_token().await.unwrap_err();

    assert_eq!(err.message, "No user ID available");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_updates_authenticated_credential() {
    let transport = Arc::new(MockTransport::new());
    let fresh = live_token("u1-new");
    transport.on(Method::POST, paths::REFRESH, refresh_ok(&fresh));
    let (ctx, _) = context(transport.clone(), "/dashboard");
    seed_session(&ctx.store, &live_token("u1"));
    ctx.manager.initialize().await;

    let token = ctx.manager.refresh_access_token().await.unwrap();

    assert_eq!(token, fresh);
    assert_eq!(
        ctx.session.snapshot().credential.map(|c| c.into_inner()),
        Some(fresh)
    );
}

#[tokio::test]
async fn test_refresh_failure_logs_out() {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        Method::POST,
        paths::REFRESH,
        failure(StatusCode::UNAUTHORIZED, Some("VTAPP-AUTH006"), Some("Refresh token revoked")),
    );
    transport.on(Method::POST, paths::LOGOUT, ok(json!({})));
    let (ctx, _) = context(transport.clone(), "/dashboard");
    seed_session(&ctx.store, &live_token("u1"));
    ctx.manager.initialize().await;

    let err = ctx.manager.refresh_access_token().await.unwrap_err();

    assert_eq!(err.message, "Refresh token revoked");
    assert_eq!(transport.count(paths::LOGOUT), 1);
    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);
    assert_eq!(ctx.store.access_token(), None);
}
