mod common;

use chrono::{TimeZone, Utc};

use common::{MonzoMock, spawn_monzo_mock, test_config};
use tally::TallyError;
use tally::bank::{BankApi, get_bank_api};

async fn client_for(mock: MonzoMock) -> Box<dyn BankApi> {
    let mut cfg = test_config();
    cfg.monzo.api_base = spawn_monzo_mock(mock).await;
    get_bank_api("monzo", &cfg.monzo).expect("factory failed")
}

#[tokio::test]
async fn code_exchange_returns_grant() {
    let mock = MonzoMock::new();
    let client = client_for(mock.clone()).await;

    let before = Utc::now();
    let grant = client.exchange_code("auth-code").await.expect("exchange failed");
    assert_eq!(grant.access_token, "acc-tok-1");
    assert_eq!(grant.refresh_token.as_deref(), Some("ref-tok-1"));
    assert!(grant.expires_at > before + chrono::Duration::minutes(30));
    assert_eq!(mock.token_calls(), 1);
}

#[tokio::test]
async fn token_endpoint_failure_maps_to_token_refresh_error() {
    let mock = MonzoMock::new();
    mock.set_token_status(400);
    let client = client_for(mock).await;

    let err = client.exchange_code("bad-code").await.unwrap_err();
    match err {
        TallyError::TokenRefresh(msg) => {
            assert!(msg.contains("code exchange failed"), "{msg}");
            assert!(msg.contains("invalid_grant"), "{msg}");
        }
        other => panic!("expected TokenRefresh, got {other:?}"),
    }

    let mock = MonzoMock::new();
    mock.set_token_status(400);
    let client = client_for(mock).await;
    let err = client.refresh_token("stale").await.unwrap_err();
    assert!(matches!(err, TallyError::TokenRefresh(msg) if msg.contains("token refresh failed")));
}

#[tokio::test]
async fn expired_access_token_maps_to_token_refresh_error() {
    let mock = MonzoMock::new();
    mock.set_resource_status(401);
    let client = client_for(mock).await;

    let err = client.get_accounts("expired").await.unwrap_err();
    assert!(matches!(err, TallyError::TokenRefresh(msg) if msg.contains("access token expired")));
}

#[tokio::test]
async fn provider_error_passes_status_through() {
    let mock = MonzoMock::new();
    mock.set_resource_status(500);
    let client = client_for(mock).await;

    let err = client.get_accounts("tok").await.unwrap_err();
    match err {
        TallyError::Upstream { status, detail } => {
            assert_eq!(status.as_u16(), 500);
            assert!(detail.contains("provider error"), "{detail}");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_provider_maps_to_bank_unavailable() {
    // Bind an ephemeral port and release it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut cfg = test_config();
    cfg.monzo.api_base = url::Url::parse(&format!("http://{addr}")).unwrap();
    let client = get_bank_api("monzo", &cfg.monzo).expect("factory failed");

    let err = client.get_accounts("tok").await.unwrap_err();
    assert!(matches!(err, TallyError::BankUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn transactions_query_carries_account_since_and_limit() {
    let mock = MonzoMock::new();
    mock.push_transaction("tx_1", -500, "2024-03-01T09:00:00Z", "coffee");
    let client = client_for(mock.clone()).await;

    let since = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let fetched = client
        .get_transactions("tok", "acc_00009abc", Some(since), 100)
        .await
        .expect("fetch failed");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].amount, -500);

    let query = mock
        .last_transactions_query
        .lock()
        .unwrap()
        .clone()
        .expect("no query recorded");
    assert_eq!(query.get("account_id").map(String::as_str), Some("acc_00009abc"));
    assert_eq!(query.get("limit").map(String::as_str), Some("100"));
    assert_eq!(
        query.get("since").map(String::as_str),
        Some("2024-02-01T00:00:00Z")
    );
}

#[tokio::test]
async fn since_is_omitted_on_first_fetch() {
    let mock = MonzoMock::new();
    let client = client_for(mock.clone()).await;

    client
        .get_transactions("tok", "acc_00009abc", None, 100)
        .await
        .expect("fetch failed");
    let query = mock
        .last_transactions_query
        .lock()
        .unwrap()
        .clone()
        .expect("no query recorded");
    assert!(!query.contains_key("since"));
}
