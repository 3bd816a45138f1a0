use super::*;

use crate::{
    mock_backend::{harness, harness_with_store},
    token_store::MemoryTokenStore,
};

#[tokio::test]
async fn login_authenticates_and_persists_token() {
    let h = harness(View::Login).await;

    let user = h.session.login("alice", "secret").await.expect("login");
    assert_eq!(user.username, "alice");

    let snapshot = h.session.snapshot();
    assert!(snapshot.is_authenticated());
    assert!(!snapshot.loading);
    assert_eq!(snapshot.last_error, None);
    let token = snapshot.token.expect("token");
    assert_eq!(h.gateway.token().as_deref(), Some(token.as_str()));
    assert_eq!(h.store.current().await.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn blank_credentials_fail_without_a_request() {
    let h = harness(View::Login).await;

    let err = h.session.login("   ", "secret").await.expect_err("blank user");
    assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    let err = h.session.login("alice", "").await.expect_err("blank password");
    assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some(MISSING_CREDENTIALS_MESSAGE)
    );
    assert!(h.backend.requests().await.is_empty());
}

#[tokio::test]
async fn wrong_password_reports_failure_and_stays_on_login() {
    let h = harness(View::Login).await;

    let err = h
        .session
        .login("alice", "wrong")
        .await
        .expect_err("bad password");
    assert!(err.is_unauthorized());

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Failed);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.last_error.as_deref(), Some(LOGIN_FAILED_MESSAGE));
    assert_eq!(snapshot.token, None);
    assert!(h.navigator.history().is_empty());
    assert_eq!(h.store.current().await, None);
}

#[tokio::test]
async fn logout_clears_session_even_when_backend_fails() {
    let h = harness(View::Dashboard).await;
    h.session.login("bob", "hunter2").await.expect("login");
    h.backend.update(|state| state.fail_logout = true).await;

    h.session.logout().await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(snapshot.user, None);
    assert_eq!(h.gateway.token(), None);
    assert_eq!(h.store.current().await, None);
}

#[tokio::test]
async fn logout_notifies_backend_with_the_signed_out_token() {
    let h = harness(View::Dashboard).await;
    h.session.login("bob", "hunter2").await.expect("login");
    let token = h.session.snapshot().token.expect("token");

    h.session.logout().await;

    let logouts = h.backend.requests_to("POST", "/api/auth/logout").await;
    assert_eq!(logouts.len(), 1);
    assert_eq!(
        logouts[0].authorization.as_deref(),
        Some(format!("Bearer {token}").as_str())
    );
}

#[tokio::test]
async fn initialize_without_stored_token_makes_no_request() {
    let h = harness(View::Login).await;

    let snapshot = h.session.initialize().await;

    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert!(!snapshot.loading);
    assert!(h.backend.requests().await.is_empty());
}

#[tokio::test]
async fn initialize_recovers_session_from_stored_token() {
    let h = harness_with_store(View::Dashboard, MemoryTokenStore::default()).await;
    let token = h.backend.issue_token("alice").await;
    h.store.save(&token).await.expect("seed token");

    let snapshot = h.session.initialize().await;

    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.user.map(|user| user.username).as_deref(), Some("alice"));
    assert_eq!(snapshot.token.as_deref(), Some(token.as_str()));
    assert_eq!(h.gateway.token().as_deref(), Some(token.as_str()));
    let me = h.backend.requests_to("GET", "/api/auth/me").await;
    assert_eq!(me.len(), 1);
    assert_eq!(
        me[0].authorization.as_deref(),
        Some(format!("Bearer {token}").as_str())
    );
}

#[tokio::test]
async fn initialize_discards_rejected_token() {
    let h = harness_with_store(View::Login, MemoryTokenStore::with_token("expired")).await;

    let snapshot = h.session.initialize().await;

    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(h.gateway.token(), None);
    assert_eq!(h.store.current().await, None);
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn authorization_loss_clears_session_and_returns_to_login() {
    let h = harness(View::Dashboard).await;
    h.session.login("alice", "secret").await.expect("login");
    h.backend.revoke_all_sessions().await;

    h.catalog.refresh().await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(h.store.current().await, None);
    assert_eq!(h.navigator.history(), vec![View::Login]);
    assert_eq!(h.session.guard(View::Dashboard), View::Login);
}

#[tokio::test]
async fn authorization_loss_on_login_view_does_not_navigate() {
    let h = harness(View::Login).await;
    h.session.login("alice", "secret").await.expect("login");
    h.backend.revoke_all_sessions().await;

    let _ = h.gateway.current_user().await;

    assert_eq!(h.session.phase(), SessionPhase::Unauthenticated);
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn loss_reported_for_a_replaced_token_is_ignored() {
    let h = harness(View::Dashboard).await;
    h.session.login("alice", "secret").await.expect("login");
    let current = h.session.snapshot().token.expect("token");

    h.session
        .on_authorization_lost(AuthorizationLost {
            token: Some("older-token".to_string()),
            resource: "/api/artifacts".to_string(),
        })
        .await;

    assert!(h.session.is_authenticated());
    assert_eq!(h.gateway.token().as_deref(), Some(current.as_str()));
    assert_eq!(h.store.current().await.as_deref(), Some(current.as_str()));
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn login_response_arriving_after_logout_is_discarded() {
    let h = harness(View::Login).await;
    let gate = Arc::new(tokio::sync::Notify::new());
    let held = gate.clone();
    h.backend
        .update(move |state| state.login_gate = Some(held))
        .await;

    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.login("alice", "secret").await });
    h.backend.wait_for_request("POST", "/api/auth/login").await;

    h.session.logout().await;
    gate.notify_one();

    let result = pending.await.expect("login task");
    assert!(matches!(result, Err(ClientError::Superseded)));
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(h.gateway.token(), None);
    assert_eq!(h.store.current().await, None);
}

#[tokio::test]
async fn guard_only_admits_protected_views_with_a_session() {
    let h = harness(View::Login).await;
    assert_eq!(h.session.guard(View::Upload), View::Login);
    assert_eq!(h.session.guard(View::Login), View::Login);

    h.session.login("bob", "hunter2").await.expect("login");
    assert_eq!(h.session.guard(View::Upload), View::Upload);
    assert_eq!(h.session.guard(View::Login), View::Login);
}

#[tokio::test]
async fn refreshing_the_catalog_leaves_the_session_untouched() {
    let h = harness(View::Dashboard).await;
    h.session.login("alice", "secret").await.expect("login");
    let before = h.session.snapshot();

    h.catalog.refresh().await;
    h.catalog.refresh().await;

    assert_eq!(h.session.snapshot(), before);
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn recovery_does_not_authenticate_a_token_lost_while_in_flight() {
    let h = harness(View::Dashboard).await;
    let token = h.backend.issue_token("alice").await;
    h.store.save(&token).await.expect("seed token");
    let gate = Arc::new(tokio::sync::Notify::new());
    let held = gate.clone();
    h.backend.update(move |state| state.me_gate = Some(held)).await;

    let session = h.session.clone();
    let recovery = tokio::spawn(async move { session.initialize().await });
    h.backend.wait_for_request("GET", "/api/auth/me").await;

    h.session
        .on_authorization_lost(AuthorizationLost {
            token: Some(token.clone()),
            resource: "/api/artifacts".to_string(),
        })
        .await;
    gate.notify_one();

    let snapshot = recovery.await.expect("recovery task");
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(snapshot.user, None);
    assert_eq!(h.session.snapshot(), snapshot);
    assert_eq!(h.gateway.token(), None);
    assert_eq!(h.store.current().await, None);
    assert_eq!(h.session.guard(View::Dashboard), View::Login);
}

#[tokio::test]
async fn older_login_response_cannot_overwrite_a_newer_login() {
    let h = harness(View::Login).await;
    let gate = Arc::new(tokio::sync::Notify::new());
    let held = gate.clone();
    h.backend
        .update(move |state| state.login_gate = Some(held))
        .await;

    let session = h.session.clone();
    let older = tokio::spawn(async move { session.login("alice", "secret").await });
    h.backend.wait_for_request("POST", "/api/auth/login").await;
    h.backend.update(|state| state.login_gate = None).await;

    let newer = h.session.login("bob", "hunter2").await.expect("newer login");
    let newer_token = h.session.snapshot().token.expect("token");
    gate.notify_one();

    let result = older.await.expect("older login task");
    assert!(matches!(result, Err(ClientError::Superseded)));
    let snapshot = h.session.snapshot();
    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.user, Some(newer));
    assert_eq!(snapshot.token.as_deref(), Some(newer_token.as_str()));
    assert_eq!(h.gateway.token().as_deref(), Some(newer_token.as_str()));
    assert_eq!(h.store.current().await.as_deref(), Some(newer_token.as_str()));
    assert_eq!(h.backend.requests_to("POST", "/api/auth/login").await.len(), 2);
}
