use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::json;
use sessiongate::{AuthError, Error, Gateway, GatewayOptions, SessionCookies};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_with_iat(iat: u64) -> String {
    let body = URL_SAFE_NO_PAD.encode(json!({ "iat": iat }).to_string());
    format!("header.{}.signature", body)
}

fn epoch_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn live_session() -> SessionCookies {
    SessionCookies {
        access_token: Some(token_with_iat(epoch_now() - 60)),
        refresh_token: Some("old_refresh".to_string()),
        company_id: Some("42".to_string()),
        refreshed_once: false,
    }
}

fn gateway(server: &MockServer) -> Gateway {
    Gateway::new(GatewayOptions::new(&server.uri()))
}

#[tokio::test]
async fn successful_call_carries_the_bearer_token() {
    let server = MockServer::start().await;
    let session = live_session();
    let bearer = format!("Bearer {}", session.access_token.as_deref().unwrap());

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway(&server).get("/employees", &session).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn expired_session_fails_before_any_network_call() {
    let server = MockServer::start().await;
    // Any request reaching the server would be a failure.
    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = SessionCookies {
        access_token: Some(token_with_iat(epoch_now() - 8 * 3600 - 10)),
        ..live_session()
    };

    let err = gateway(&server).get("/employees", &session).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::SessionExpired)));
}

#[tokio::test]
async fn a_401_triggers_one_refresh_and_one_retry() {
    let server = MockServer::start().await;
    let session = live_session();
    let old_bearer = format!("Bearer {}", session.access_token.as_deref().unwrap());

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", old_bearer.as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({
            "refresh_token": "old_refresh",
            "company_id": "42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new_access",
            "refresh_token": "new_refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway(&server).get("/employees", &session).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn missing_refresh_material_makes_a_401_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = SessionCookies {
        company_id: None,
        ..live_session()
    };

    let err = gateway(&server).get("/employees", &session).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
}

#[tokio::test]
async fn spent_refresh_budget_rejects_without_a_refresh_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = SessionCookies {
        refreshed_once: true,
        ..live_session()
    };

    let err = gateway(&server).get("/employees", &session).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::RefreshBudgetExhausted)
    ));
}

#[tokio::test]
async fn failed_refresh_surfaces_the_original_401_without_a_retry() {
    let server = MockServer::start().await;
    let session = live_session();

    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server).get("/employees", &session).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
}

#[tokio::test]
async fn refresh_body_missing_a_token_counts_as_failure() {
    let server = MockServer::start().await;
    let session = live_session();

    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "only_half" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server).get("/employees", &session).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
}

#[tokio::test]
async fn business_errors_carry_status_message_and_details() {
    let server = MockServer::start().await;
    let session = live_session();

    Mock::given(method("POST"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "validation failed",
            "errors": { "email": ["is already taken"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server)
        .post("/employees", &session, &json!({ "email": "a@b.c" }))
        .await
        .unwrap_err();

    match err {
        Error::Api {
            status,
            message,
            details,
        } => {
            assert_eq!(status, 422);
            assert_eq!(message, "validation failed");
            let details = details.unwrap();
            assert_eq!(details["email"], vec!["is already taken".to_string()]);
        }
        other => panic!("expected Error::Api, got {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() {
    let server = MockServer::start().await;
    let session = live_session();
    let old_bearer = format!("Bearer {}", session.access_token.as_deref().unwrap());

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", old_bearer.as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(8)
        .mount(&server)
        .await;

    // The delay keeps the refresh pending while every caller reaches the
    // refresh step, so all of them must attach to the same handle.
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(json!({
                    "access_token": "new_access",
                    "refresh_token": "new_refresh"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(8)
        .mount(&server)
        .await;

    let gateway = Arc::new(gateway(&server));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = Arc::clone(&gateway);
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            gateway.get("/employees", &session).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh_failure() {
    let server = MockServer::start().await;
    let session = live_session();

    Mock::given(method("GET"))
        .and(path("/employees"))
        .respond_with(ResponseTemplate::new(401))
        .expect(4)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Arc::new(gateway(&server));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let gateway = Arc::clone(&gateway);
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            gateway.get("/employees", &session).await
        }));
    }

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
    }
}

#[tokio::test]
async fn a_settled_refresh_does_not_serve_the_next_401() {
    let server = MockServer::start().await;

    // First call refreshes successfully; the backend then marks the session
    // as refreshed-once, so a later 401 in the same window must be terminal.
    let session = live_session();
    let old_bearer = format!("Bearer {}", session.access_token.as_deref().unwrap());

    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", old_bearer.as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new_access",
            "refresh_token": "new_refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/employees"))
        .and(header("Authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    gateway.get("/employees", &session).await.unwrap();

    let renewed = SessionCookies {
        refreshed_once: true,
        ..session
    };
    let err = gateway.get("/employees", &renewed).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::RefreshBudgetExhausted)
    ));
}
