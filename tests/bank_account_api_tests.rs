mod common;

use std::fs;

use axum::http::StatusCode;
use serde_json::json;

use common::{register_and_login, send_json, spawn_app};

#[tokio::test]
async fn create_and_fetch_account() {
    let (app, db_path) = spawn_app("acct-create").await;
    let token = register_and_login(&app, "owner@example.com", "pw").await;

    let (status, created) = send_json(
        &app,
        "POST",
        "/api/v1/bank-accounts",
        Some(&token),
        Some(json!({
            "account_type": "monzo",
            "account_name": "Joint Account",
            "account_identifier": "acc_00009abc",
            "institution_name": "Monzo",
            "access_token": "tok-access",
            "refresh_token": "tok-refresh",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["account_type"], "monzo");
    assert_eq!(created["account_name"], "Joint Account");
    assert_eq!(created["is_active"], true);
    assert!(
        created.get("access_token").is_none() && created.get("refresh_token").is_none(),
        "bank tokens must never appear in responses: {created}"
    );

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send_json(
        &app,
        "GET",
        &format!("/api/v1/bank-accounts/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["account_identifier"], "acc_00009abc");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn list_hides_inactive_unless_asked() {
    let (app, db_path) = spawn_app("acct-list").await;
    let token = register_and_login(&app, "owner@example.com", "pw").await;

    let mut ids = Vec::new();
    for name in ["First", "Second"] {
        let (status, acct) = send_json(
            &app,
            "POST",
            "/api/v1/bank-accounts",
            Some(&token),
            Some(json!({"account_type": "monzo", "account_name": name, "access_token": "tok"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(acct["id"].as_str().unwrap().to_string());
    }

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/api/v1/bank-accounts/{}", ids[0]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, listed) =
        send_json(&app, "GET", "/api/v1/bank-accounts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["account_name"], "Second");

    let (status, listed) = send_json(
        &app,
        "GET",
        "/api/v1/bank-accounts?include_inactive=true",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 2);

    // Soft delete keeps the row reachable by id.
    let (status, deactivated) = send_json(
        &app,
        "GET",
        &format!("/api/v1/bank-accounts/{}", ids[0]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["is_active"], false);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn update_patches_only_provided_fields() {
    let (app, db_path) = spawn_app("acct-update").await;
    let token = register_and_login(&app, "owner@example.com", "pw").await;

    let (_, created) = send_json(
        &app,
        "POST",
        "/api/v1/bank-accounts",
        Some(&token),
        Some(json!({
            "account_type": "monzo",
            "account_name": "Before",
            "institution_name": "Monzo",
            "access_token": "tok",
        })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = send_json(
        &app,
        "PUT",
        &format!("/api/v1/bank-accounts/{id}"),
        Some(&token),
        Some(json!({"account_name": "After"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["account_name"], "After");
    assert_eq!(updated["institution_name"], "Monzo");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn accounts_are_scoped_to_their_owner() {
    let (app, db_path) = spawn_app("acct-scope").await;
    let owner = register_and_login(&app, "owner@example.com", "pw").await;
    let other = register_and_login(&app, "other@example.com", "pw").await;

    let (_, created) = send_json(
        &app,
        "POST",
        "/api/v1/bank-accounts",
        Some(&owner),
        Some(json!({"account_type": "monzo", "access_token": "tok"})),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    for method in ["GET", "DELETE"] {
        let (status, body) = send_json(
            &app,
            method,
            &format!("/api/v1/bank-accounts/{id}"),
            Some(&other),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method}: {body}");
    }

    let (status, listed) =
        send_json(&app, "GET", "/api/v1/bank-accounts", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 0);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn pagination_limits_are_validated() {
    let (app, db_path) = spawn_app("acct-page").await;
    let token = register_and_login(&app, "owner@example.com", "pw").await;

    for uri in [
        "/api/v1/bank-accounts?limit=0",
        "/api/v1/bank-accounts?limit=101",
        "/api/v1/bank-accounts?skip=-1",
    ] {
        let (status, body) = send_json(&app, "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["error"]["code"], "VALIDATION");
    }

    let _ = fs::remove_file(&db_path);
}
