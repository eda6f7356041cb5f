mod common;

use std::fs;

use axum::http::StatusCode;
use serde_json::json;

use common::{login, register, register_and_login, send_json, spawn_app};

#[tokio::test]
async fn register_login_me_flow() {
    let (app, db_path) = spawn_app("auth-flow").await;

    let body = register(&app, "alice@example.com", "s3cret-pw").await;
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["id"].is_string());
    assert!(
        body.get("password").is_none() && body.get("hashed_password").is_none(),
        "password material must not appear in responses: {body}"
    );

    let token = login(&app, "alice@example.com", "s3cret-pw").await;

    let (status, me) = send_json(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["id"], body["id"]);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (app, db_path) = spawn_app("auth-dup").await;

    register(&app, "bob@example.com", "pw-one").await;
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({"email": "bob@example.com", "password": "pw-two"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "EMAIL_TAKEN");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let (app, db_path) = spawn_app("auth-badcreds").await;

    register(&app, "carol@example.com", "right-pw").await;

    for form in [
        "username=carol%40example.com&password=wrong-pw",
        "username=nobody%40example.com&password=right-pw",
    ] {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(form))
            .expect("failed to build request");
        let response = tower::ServiceExt::oneshot(app.clone(), request)
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn missing_or_garbage_token_is_unauthorized() {
    let (app, db_path) = spawn_app("auth-notoken").await;

    let (status, _) = send_json(&app, "GET", "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        send_json(&app, "GET", "/api/v1/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn delete_me_removes_user_and_owned_data() {
    let (app, db_path) = spawn_app("auth-delete").await;

    let token = register_and_login(&app, "dave@example.com", "pw").await;

    let (status, account) = send_json(
        &app,
        "POST",
        "/api/v1/bank-accounts",
        Some(&token),
        Some(json!({"account_type": "monzo", "access_token": "tok"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let account_id = account["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/v1/transactions",
        Some(&token),
        Some(json!({"bank_account_id": account_id, "amount": "-5.00", "description": "coffee"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send_json(&app, "DELETE", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The token still decodes but the subject is gone.
    let (status, _) = send_json(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Email is free again for registration.
    register(&app, "dave@example.com", "pw").await;

    let _ = fs::remove_file(&db_path);
}
