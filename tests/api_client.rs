//! Integration tests for the HTTP API client against a mock backend.


use fixtures::{SESSION_COOKIE, login_response, member_json, unauthorized};
use memberlink::api::{ApiError, HttpApiClient, LoginCredentials, MemberApi};
use memberlink::config::ApiConfig;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpApiClient {
    HttpApiClient::new(&ApiConfig {
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn credentials() -> LoginCredentials {
    LoginCredentials {
        id_number: "123456789".to_string(),
        phone: "0501234567".to_string(),
    }
}

#[tokio::test]
async fn test_login_cookie_is_carried_by_later_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/member/login"))
        .and(body_json(json!({ "idNumber": "123456789", "phone": "0501234567" })))
        .respond_with(login_response(42))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/member/me"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(member_json(42)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/member/me"))
        .respond_with(unauthorized())
        .with_priority(10)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.fetch_current_member().await, Err(ApiError::Unauthorized));

    let response = client.login(&credentials()).await.unwrap();
    assert!(response.success);
    assert_eq!(response.member_id, Some(42));

    let member = client.fetch_current_member().await.unwrap();
    assert_eq!(member.id, 42);
    assert_eq!(member.display_name(), "Dana Levi");
    assert_eq!(client.session_cookies().as_deref(), Some(SESSION_COOKIE));
}

#[tokio::test]
async fn test_rejected_login_is_a_validation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/member/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Member not found" })),
        )
        .mount(&server)
        .await;

    let result = client_for(&server).login(&credentials()).await;

    assert_eq!(result, Err(ApiError::Validation("Member not found".to_string())));
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/member/subscriptions"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/member/me"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Invalid email" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/member/payments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/offers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert_eq!(client.subscriptions().await, Err(ApiError::Unauthorized));
    assert_eq!(
        client.update_member(&Default::default()).await,
        Err(ApiError::Validation("Invalid email".to_string()))
    );
    assert_eq!(
        client.payments().await,
        Err(ApiError::Status {
            status: 503,
            message: "maintenance".to_string(),
        })
    );
    assert!(matches!(client.offers().await, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn test_push_token_request_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/member/push-token"))
        .and(body_json(json!({ "token": "ExponentPushToken[abc]", "memberId": 42 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .send_push_token(42, "ExponentPushToken[abc]")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invoice_pdf_is_returned_raw() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.4 invoice".to_vec();

    Mock::given(method("GET"))
        .and(path("/api/member/invoices/7/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf.clone()),
        )
        .mount(&server)
        .await;

    assert_eq!(client_for(&server).download_invoice(7).await.unwrap(), pdf);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    assert!(matches!(
        client.fetch_current_member().await,
        Err(ApiError::Transport(_))
    ));
}
