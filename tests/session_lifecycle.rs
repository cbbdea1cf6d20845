mod common;

use std::sync::Arc;

use common::*;
use healthhub::api::ApiRequest;
use healthhub::models::{Credentials, Role, SessionStatus};
use healthhub::registration::RegistrationForm;
use healthhub::storage::{ACCESS_TOKEN_KEY, MemoryTokenStore, REFRESH_TOKEN_KEY, TokenStore};
use healthhub::{AuthError, SessionManager};
use reqwest::Method;
use serde_json::json;

fn creds(username: &str) -> Credentials {
    Credentials {
        username: username.into(),
        password: "password123".into(),
    }
}

fn doctor_form() -> RegistrationForm {
    RegistrationForm {
        username: "drsmith".into(),
        email: "drsmith@example.com".into(),
        password: "password123".into(),
        password_confirm: "password123".into(),
        first_name: "Ada".into(),
        last_name: "Smith".into(),
        specialist: "cardiologist".into(),
        location: "dhaka".into(),
        experience_years: "10".into(),
        consultation_fee: "500".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn fresh_start_without_tokens_is_anonymous() {
    let transport = FakeTransport::new();
    let store = Arc::new(MemoryTokenStore::new());
    let session = SessionManager::start(transport.clone(), store.clone()).await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(transport.requests().is_empty());
    assert_eq!(session.wait_resolved().await, SessionStatus::Anonymous);
}

#[tokio::test]
async fn login_persists_both_tokens_and_profile() {
    let transport = FakeTransport::new();
    transport.reply(200, auth_body("pat", Role::Patient, "acc-1"));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let signed_in = session.login(&creds("pat")).await.unwrap();

    assert_eq!(signed_in.role(), Some(Role::Patient));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc-1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("acc-1-refresh"));
    assert_eq!(session.status(), SessionStatus::Authenticated(Role::Patient));
    assert_eq!(session.profile().unwrap().user.username, "pat");
    assert_eq!(session.authorization_header().as_deref(), Some("Bearer acc-1"));

    let sent = transport.last_request();
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.path, "/api/auth/login/");
    assert_eq!(sent.body, Some(json!({ "username": "pat", "password": "password123" })));
}

#[tokio::test]
async fn failed_login_returns_payload_and_persists_nothing() {
    let payload = json!({ "non_field_errors": ["Invalid credentials"] });
    let transport = FakeTransport::new();
    transport.reply(400, payload.clone());
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let err = session.login(&creds("pat")).await.unwrap_err();

    assert!(matches!(err, AuthError::Credential(_)));
    assert_eq!(err.payload(), Some(&payload));
    assert!(store.is_empty());
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(session.authorization_header(), None);
}

#[tokio::test]
async fn login_failure_without_json_body_gets_default_detail() {
    let transport = FakeTransport::new();
    transport.reply_raw(401);
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let err = session.login(&creds("pat")).await.unwrap_err();
    assert_eq!(err.payload(), Some(&json!({ "detail": "Login failed" })));
}

#[tokio::test]
async fn network_and_server_errors_are_not_retried() {
    let transport = FakeTransport::new();
    transport.fail("connection refused").reply_raw(503);
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let first = session.login(&creds("pat")).await.unwrap_err();
    assert!(matches!(first, AuthError::Network(_)));
    assert_eq!(transport.requests().len(), 1);

    let second = session.login(&creds("pat")).await.unwrap_err();
    assert!(matches!(second, AuthError::Network(_)));
    assert_eq!(transport.requests().len(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn bearer_follows_session_state() {
    let transport = FakeTransport::new();
    transport
        .reply(200, auth_body("pat", Role::Patient, "acc-1"))
        .reply(200, json!([]))
        .reply(200, json!([]));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    session.login(&creds("pat")).await.unwrap();
    session
        .send_authorized(Method::GET, "/api/appointments/", None)
        .await
        .unwrap();
    assert_eq!(transport.last_request().bearer.as_deref(), Some("acc-1"));

    session.logout();
    session
        .send_authorized(Method::GET, "/api/appointments/", None)
        .await
        .unwrap();
    assert_eq!(transport.last_request().bearer, None);
}

#[tokio::test]
async fn logout_clears_everything_from_any_state() {
    // no prior session
    let transport = FakeTransport::new();
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);
    session.logout();
    session.logout();
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(store.is_empty());

    // unresolved stored token
    let store = stored("acc-old");
    let session = manager(&transport, &store);
    assert_eq!(session.status(), SessionStatus::Resolving);
    session.logout();
    assert!(store.is_empty());
    assert_eq!(session.authorization_header(), None);
    assert_eq!(session.status(), SessionStatus::Anonymous);

    // signed in
    transport.reply(200, auth_body("adm", Role::Admin, "acc-2"));
    session.login(&creds("adm")).await.unwrap();
    session.logout();
    assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY), None);
    assert_eq!(session.session(), None);
    assert_eq!(session.authorization_header(), None);
}

#[tokio::test]
async fn stored_token_is_verified_at_startup() {
    let transport = FakeTransport::new();
    transport.reply(200, profile_body("nina", Role::Nurse));
    let store = stored("acc-3");

    let session = SessionManager::start(transport.clone(), store.clone()).await;

    assert_eq!(session.status(), SessionStatus::Authenticated(Role::Nurse));
    let sent = transport.last_request();
    assert_eq!(sent, ApiRequest::get("/api/auth/profile/").bearer(Some("acc-3".into())));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc-3"));
}

#[tokio::test]
async fn unverifiable_token_at_startup_ends_logged_out() {
    let transport = FakeTransport::new();
    transport.reply(401, json!({ "detail": "Given token not valid for any token type" }));
    let store = stored("acc-expired");

    let session = SessionManager::start(transport.clone(), store.clone()).await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(store.is_empty());
    assert_eq!(session.session(), None);
}

#[tokio::test]
async fn unreachable_backend_at_startup_degrades_to_logged_out() {
    let transport = FakeTransport::new();
    transport.fail("dns error");
    let store = stored("acc-4");

    let session = SessionManager::start(transport.clone(), store.clone()).await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn stale_profile_failure_does_not_end_a_newer_session() {
    let transport = FakeTransport::new();
    let gate = transport.reply_gated(401, json!({ "detail": "expired" }));
    transport.reply(200, auth_body("pat", Role::Patient, "acc-new"));
    let store = stored("acc-old");
    let session = manager(&transport, &store);

    let refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh_profile().await }
    });
    until_requests(&transport, 1).await;

    session.logout();
    session.login(&creds("pat")).await.unwrap();

    gate.notify_one();
    refresh.await.unwrap();

    assert_eq!(session.status(), SessionStatus::Authenticated(Role::Patient));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc-new"));
}

#[tokio::test]
async fn stale_profile_success_is_not_applied_after_logout() {
    let transport = FakeTransport::new();
    let gate = transport.reply_gated(200, profile_body("adm", Role::Admin));
    let store = stored("acc-old");
    let session = manager(&transport, &store);

    let refresh = tokio::spawn({
        let session = session.clone();
        async move { session.refresh_profile().await }
    });
    until_requests(&transport, 1).await;
    session.logout();
    gate.notify_one();
    refresh.await.unwrap();

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(session.profile(), None);
}

#[tokio::test]
async fn rejected_token_on_any_request_forces_logout() {
    let transport = FakeTransport::new();
    transport
        .reply(200, auth_body("doc", Role::Doctor, "acc-5"))
        .reply(401, json!({ "detail": "Given token not valid for any token type" }));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);
    session.login(&creds("doc")).await.unwrap();

    let err = session
        .send_authorized(Method::PATCH, "/api/appointments/3/", Some(json!({ "status": "approved" })))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::SessionInvalid));
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(store.is_empty());
}

#[tokio::test]
async fn doctor_registration_without_specialist_never_reaches_backend() {
    let transport = FakeTransport::new();
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);
    let mut form = doctor_form();
    form.specialist.clear();

    let err = session.register(&form, Role::Doctor).await.unwrap_err();

    assert!(err.field("specialist").is_some_and(|m| !m.is_empty()));
    assert!(transport.requests().is_empty());
    assert!(store.is_empty());
    assert_eq!(session.session(), None);
}

#[tokio::test]
async fn registration_posts_to_role_endpoint() {
    let transport = FakeTransport::new();
    transport.reply(201, auth_body("drsmith", Role::Doctor, "acc-6"));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let created = session.register(&doctor_form(), Role::Doctor).await.unwrap();

    assert_eq!(created.role(), Some(Role::Doctor));
    let sent = transport.last_request();
    assert_eq!(sent.path, "/api/auth/register/doctor/");
    let body = sent.body.unwrap();
    assert_eq!(body["user"]["username"], "drsmith");
    assert_eq!(body["specialist"], "cardiologist");
    assert_eq!(body["consultation_fee"], 500.0);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc-6"));
}

#[tokio::test]
async fn backend_field_errors_come_back_keyed() {
    let payload = json!({ "user": { "username": ["A user with that username already exists."] } });
    let transport = FakeTransport::new();
    transport.reply(400, payload.clone());
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);

    let err = session.register(&doctor_form(), Role::Doctor).await.unwrap_err();

    assert_eq!(err.payload(), Some(&payload));
    assert_eq!(
        err.field("username").unwrap(),
        ["A user with that username already exists."]
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn status_changes_are_broadcast() {
    let transport = FakeTransport::new();
    transport.reply(200, auth_body("pat", Role::Patient, "acc-7"));
    let store = Arc::new(MemoryTokenStore::new());
    let session = manager(&transport, &store);
    let mut rx = session.subscribe();

    session.login(&creds("pat")).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), SessionStatus::Authenticated(Role::Patient));

    session.logout();
    assert_eq!(*rx.borrow_and_update(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn unwritable_store_fails_login_without_a_session() {
    let transport = FakeTransport::new();
    transport
        .reply(200, auth_body("pat", Role::Patient, "acc-1"))
        .reply(201, auth_body("drsmith", Role::Doctor, "acc-2"));
    let store = FailingTokenStore::read_only();
    let session = SessionManager::new(transport.clone(), store.clone());

    let err = session.login(&creds("pat")).await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    assert_eq!(session.session(), None);
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(session.authorization_header(), None);

    let err = session.register(&doctor_form(), Role::Doctor).await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    assert_eq!(session.session(), None);
    assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
}

#[tokio::test]
async fn storage_failure_keeps_the_previous_session() {
    let transport = FakeTransport::new();
    transport
        .reply(200, auth_body("pat", Role::Patient, "acc-1"))
        .reply(200, auth_body("adm", Role::Admin, "acc-2"));
    let store = FailingTokenStore::writable();
    let session = SessionManager::new(transport.clone(), store.clone());
    let before = session.login(&creds("pat")).await.unwrap();

    store.set_fail_save(true);
    let err = session.login(&creds("adm")).await.unwrap_err();

    assert!(matches!(err, AuthError::Storage(_)));
    assert_eq!(session.session(), Some(before));
    assert_eq!(session.status(), SessionStatus::Authenticated(Role::Patient));
    assert_eq!(session.authorization_header().as_deref(), Some("Bearer acc-1"));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc-1"));
}

#[tokio::test]
async fn unreadable_store_at_startup_is_cleared() {
    let transport = FakeTransport::new();
    let store = FailingTokenStore::unreadable();

    let session = SessionManager::start(transport.clone(), store.clone()).await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(store.clears(), 1);
    assert!(transport.requests().is_empty());
    assert_eq!(session.wait_resolved().await, SessionStatus::Anonymous);
}

#[tokio::test]
async fn stored_token_stays_resolving_until_checked() {
    let transport = FakeTransport::new();
    transport.reply(200, profile_body("doc", Role::Doctor));
    let store = stored("acc-4");
    let session = manager(&transport, &store);
    assert_eq!(session.status(), SessionStatus::Resolving);

    let waiting = tokio::spawn({
        let session = session.clone();
        async move { session.wait_resolved().await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!waiting.is_finished());
    assert!(transport.requests().is_empty());

    session.refresh_profile().await;
    assert_eq!(waiting.await.unwrap(), SessionStatus::Authenticated(Role::Doctor));
}
