//! HTTP-level integration tests for register, login, logout, presence and the
//! authentication of the live-connection endpoint.

mod common;

use agora_api::state::AppState;
use agora_api::ws::ConnectionHandle;
use agora_db::repositories::PresenceRepo;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use common::{body_json, get, get_with_header, post_auth, post_json, TEST_PASSWORD};
use serde_json::json;
use tokio_util::sync::CancellationToken;

async fn app_state() -> AppState {
    AppState::new(common::test_pool().await, common::test_config())
}

fn set_cookie(response: &Response) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("response should set a cookie")
        .to_str()
        .unwrap()
        .to_string()
}

async fn login(state: &AppState, identifier: &str) -> serde_json::Value {
    let app = common::build_test_app(state.clone());
    let body = json!({ "identifier": identifier, "password": TEST_PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_account_and_session() {
    let state = app_state().await;
    let app = common::build_test_app(state.clone());

    let body = json!({ "nickname": "xavier", "email": "x@forum.test", "password": TEST_PASSWORD });
    let response = post_json(app, "/api/v1/auth/register", body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let json = body_json(response).await;
    assert_eq!(json["user"]["nickname"], "xavier");
    assert_eq!(json["user"]["email"], "x@forum.test");
    assert!(json["user"].get("password_hash").is_none());

    let credential = json["credential"].as_str().unwrap();
    let user_id = json["user"]["id"].as_i64().unwrap();
    assert_eq!(state.sessions.validate_credential(credential).await.unwrap(), user_id);
}

#[tokio::test]
async fn register_duplicate_nickname_conflicts() {
    let state = app_state().await;
    common::create_user(&state.pool, "taken").await;

    let body = json!({ "nickname": "taken", "email": "new@forum.test", "password": TEST_PASSWORD });
    let response = post_json(common::build_test_app(state), "/api/v1/auth/register", body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn register_rejects_invalid_input() {
    let state = app_state().await;

    let bad_email = json!({ "nickname": "someone", "email": "nope", "password": TEST_PASSWORD });
    let response = post_json(common::build_test_app(state.clone()), "/api/v1/auth/register", bad_email).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let short_password = json!({ "nickname": "someone", "email": "s@forum.test", "password": "short" });
    let response = post_json(common::build_test_app(state), "/api/v1/auth/register", short_password).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_accepts_nickname_or_email() {
    let state = app_state().await;
    let user_id = common::create_user(&state.pool, "xavier").await;

    let by_nickname = login(&state, "xavier").await;
    assert_eq!(by_nickname["user"]["id"], user_id);

    let by_email = login(&state, "xavier@forum.test").await;
    assert_eq!(by_email["user"]["id"], user_id);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let state = app_state().await;
    common::create_user(&state.pool, "xavier").await;

    let body = json!({ "identifier": "xavier", "password": "wrong-password" });
    let response = post_json(common::build_test_app(state.clone()), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json!({ "identifier": "nobody", "password": TEST_PASSWORD });
    let response = post_json(common::build_test_app(state), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logging_in_again_revokes_previous_credential() {
    let state = app_state().await;
    common::create_user(&state.pool, "xavier").await;

    let c0 = login(&state, "xavier").await["credential"].as_str().unwrap().to_string();
    let c1 = login(&state, "xavier").await["credential"].as_str().unwrap().to_string();

    let stale = get_with_header(
        common::build_test_app(state.clone()),
        "/api/v1/presence/online",
        "authorization",
        &format!("Bearer {c0}"),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let fresh = get_with_header(
        common::build_test_app(state),
        "/api/v1/presence/online",
        "authorization",
        &format!("Bearer {c1}"),
    )
    .await;
    assert_eq!(fresh.status(), StatusCode::OK);
}

#[tokio::test]
async fn logging_in_again_closes_connections_of_previous_session() {
    let state = app_state().await;
    let user_id = common::create_user(&state.pool, "xavier").await;
    let other = common::create_user(&state.pool, "yolanda").await;
    let c0 = login(&state, "xavier").await["credential"].as_str().unwrap().to_string();

    let device_a = CancellationToken::new();
    let (handle, _rx) = ConnectionHandle::new(user_id, device_a.clone());
    state.registry.register(handle).await;
    let bystander = CancellationToken::new();
    let (handle, _other_rx) = ConnectionHandle::new(other, bystander.clone());
    state.registry.register(handle).await;

    login(&state, "xavier").await;

    assert!(state.sessions.validate_credential(&c0).await.is_err());
    assert!(device_a.is_cancelled());
    assert!(!bystander.is_cancelled());
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_deletes_session_and_clears_cookie() {
    let state = app_state().await;
    common::create_user(&state.pool, "xavier").await;
    let credential = login(&state, "xavier").await["credential"].as_str().unwrap().to_string();

    let response = post_auth(common::build_test_app(state.clone()), "/api/v1/auth/logout", &credential).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let again = post_auth(common::build_test_app(state), "/api/v1/auth/logout", &credential).await;
    assert_eq!(again.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_requires_authentication() {
    let state = app_state().await;
    let response = post_json(common::build_test_app(state), "/api/v1/auth/logout", json!({})).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Authentication sources
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_cookie_and_query_token_authenticate() {
    let state = app_state().await;
    let user_id = common::create_user(&state.pool, "xavier").await;
    let issued = state.sessions.create_session(user_id).await.unwrap();

    let by_cookie = get_with_header(
        common::build_test_app(state.clone()),
        "/api/v1/presence/online",
        "cookie",
        &format!("theme=dark; session_token={}", issued.token),
    )
    .await;
    assert_eq!(by_cookie.status(), StatusCode::OK);

    let by_query = get(
        common::build_test_app(state.clone()),
        &format!("/api/v1/presence/online?token={}", issued.credential),
    )
    .await;
    assert_eq!(by_query.status(), StatusCode::OK);

    let bad_cookie = get_with_header(
        common::build_test_app(state),
        "/api/v1/presence/online",
        "cookie",
        "session_token=forged",
    )
    .await;
    assert_eq!(bad_cookie.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_authorization_header_is_rejected() {
    let state = app_state().await;
    let response = get_with_header(
        common::build_test_app(state),
        "/api/v1/presence/online",
        "authorization",
        "Token abc",
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_upgrade_without_credentials_is_rejected_before_upgrade() {
    let state = app_state().await;
    let response = get(common::build_test_app(state), "/api/v1/ws").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Presence listing and health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_lists_only_online_users() {
    let state = app_state().await;
    let online = common::create_user(&state.pool, "online").await;
    let offline = common::create_user(&state.pool, "offline").await;
    PresenceRepo::upsert(&state.pool, online, true, Utc::now()).await.unwrap();
    PresenceRepo::upsert(&state.pool, offline, false, Utc::now()).await.unwrap();

    let credential = state.sessions.create_session(online).await.unwrap().credential;
    let response = get_with_header(
        common::build_test_app(state),
        "/api/v1/presence/online",
        "authorization",
        &format!("Bearer {credential}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["user_id"], online);
    assert_eq!(users[0]["is_online"], true);
}

#[tokio::test]
async fn health_reports_database_and_connections() {
    let state = app_state().await;
    let response = get(common::build_test_app(state), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["live_connections"], 0);
}
