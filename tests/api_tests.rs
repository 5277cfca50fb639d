use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use echo_voice::{routes, ServerConfig, state::AppState};

fn test_config(api_base: String, api_key: Option<String>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 3002,
        realtime_api_base: api_base,
        realtime_api_key: api_key,
        realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
        realtime_voice: "shimmer".to_string(),
        assistant_instructions: "You are Samantha.".to_string(),
        context_service_url: None,
        upstream_timeout_seconds: 2,
    }
}

#[tokio::test]
async fn test_health_check() {
    let config = test_config("http://localhost:9/v1/realtime".to_string(), None);
    let app_state = AppState::new(config);
    let app = routes::api::create_api_router().with_state(app_state);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "OK");
}

#[tokio::test]
async fn test_token_endpoint_missing_api_key() {
    let config = test_config("http://localhost:9/v1/realtime".to_string(), None);
    let app_state = AppState::new(config);
    let app = routes::api::create_api_router().with_state(app_state);

    let request = Request::builder()
        .uri("/v1/realtime/token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "config_error");
}

#[tokio::test]
async fn test_token_endpoint_mints_session() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess_e2e",
            "model": "gpt-4o-realtime-preview-2024-12-17",
            "client_secret": { "value": "ek_e2e" }
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let config = test_config(
        format!("{}/v1/realtime", upstream.uri()),
        Some("sk-test".to_string()),
    );
    let app_state = AppState::new(config);
    let app = routes::api::create_api_router().with_state(app_state);

    let request = Request::builder()
        .uri("/v1/realtime/token?patient_id=3")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["client_secret"]["value"], "ek_e2e");
}

#[tokio::test]
async fn test_token_endpoint_surfaces_upstream_rejection() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&upstream)
        .await;

    let config = test_config(
        format!("{}/v1/realtime", upstream.uri()),
        Some("sk-wrong".to_string()),
    );
    let app_state = AppState::new(config);
    let app = routes::api::create_api_router().with_state(app_state);

    let request = Request::builder()
        .uri("/v1/realtime/token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "upstream_error");
}
