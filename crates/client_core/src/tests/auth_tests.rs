use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

use super::*;

async fn validate(headers: HeaderMap) -> Response {
    match headers.get("access-token").and_then(|v| v.to_str().ok()) {
        Some("good-token") => StatusCode::OK.into_response(),
        Some("flaky-token") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "errors": ["Invalid login credentials"] })),
        )
            .into_response(),
    }
}

async fn spawn_auth_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/auth/validate_token", get(validate));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn auth_with_token(url: &str, token: &str) -> DeviseTokenAuth {
    DeviseTokenAuth::new(
        url,
        Some(CredentialHeaders::from_tokens(token, "client", "me@example.com")),
        Duration::from_secs(5),
    )
    .expect("auth")
}

#[test]
fn retrieve_data_only_answers_auth_headers_key() {
    let auth = auth_with_token("http://localhost", "good-token");
    let headers = auth.retrieve_data(AUTH_HEADERS_KEY).expect("headers");
    assert_eq!(headers.get("access-token"), Some("good-token"));
    assert!(auth.retrieve_data("somethingElse").is_none());
}

#[tokio::test]
async fn valid_token_resolves() {
    let url = spawn_auth_server().await;
    auth_with_token(&url, "good-token")
        .validate_token()
        .await
        .expect("valid");
}

#[tokio::test]
async fn refused_token_is_invalid_credentials() {
    let url = spawn_auth_server().await;
    let err = auth_with_token(&url, "stale-token")
        .validate_token()
        .await
        .expect_err("must fail");
    assert!(err.is_invalid_credentials(), "unexpected: {err:?}");
    match err {
        AuthError::InvalidCredentials(message) => {
            assert_eq!(message, "Invalid login credentials")
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn server_failure_is_a_generic_login_error() {
    let url = spawn_auth_server().await;
    let err = auth_with_token(&url, "flaky-token")
        .validate_token()
        .await
        .expect_err("must fail");
    assert!(!err.is_invalid_credentials());
    assert!(matches!(err, AuthError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn missing_credentials_never_hit_the_network() {
    let auth = DeviseTokenAuth::new("http://127.0.0.1:9", None, Duration::from_secs(1))
        .expect("auth");
    let err = auth.validate_token().await.expect_err("must fail");
    assert!(matches!(err, AuthError::MissingCredentials));
}
