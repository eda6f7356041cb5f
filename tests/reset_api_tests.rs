mod common;

use std::fs;

use axum::http::StatusCode;
use serde_json::json;

use common::{login, register_and_login, send_json, spawn_app, spawn_app_with, test_config};

#[tokio::test]
async fn reset_clears_data_but_preserves_users() {
    let (app, db_path) = spawn_app("reset-basic").await;
    let token = register_and_login(&app, "keeper@example.com", "pw").await;

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
        Some(json!({"bank_account_id": account_id, "amount": "10.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        send_json(&app, "POST", "/api/v1/admin/reset-database", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Database reset successful");

    // The user row survived; both login and the old token still work.
    login(&app, "keeper@example.com", "pw").await;
    let (status, listed) = send_json(
        &app,
        "GET",
        "/api/v1/bank-accounts?include_inactive=true",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 0);

    let (status, listed) =
        send_json(&app, "GET", "/api/v1/transactions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 0);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn reset_is_idempotent() {
    let (app, db_path) = spawn_app("reset-idem").await;

    for _ in 0..2 {
        let (status, body) =
            send_json(&app, "POST", "/api/v1/admin/reset-database", None, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn reset_is_refused_in_production() {
    let mut cfg = test_config();
    cfg.environment = tally::config::Environment::Production;
    let (app, db_path) = spawn_app_with("reset-prod", cfg).await;
    let token = register_and_login(&app, "prod@example.com", "pw").await;

    let (status, account) = send_json(
        &app,
        "POST",
        "/api/v1/bank-accounts",
        Some(&token),
        Some(json!({"account_type": "monzo", "access_token": "tok"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        send_json(&app, "POST", "/api/v1/admin/reset-database", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Nothing was touched.
    let id = account["id"].as_str().unwrap();
    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/api/v1/bank-accounts/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn unsupported_database_scheme_is_a_configuration_error() {
    let err = tally::db::connect("mysql://root@localhost/tally")
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, tally::TallyError::Configuration(_)), "{err:?}");
}
