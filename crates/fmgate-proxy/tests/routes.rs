//! Integration tests for routing, CORS preflight and the auxiliary endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use fmgate_proxy::models::ModelsResponse;

use common::{default_router, post_json, send};

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn options_preflight_is_empty_200_with_cors() {
    let (response, body) = send(
        default_router(),
        request(Method::OPTIONS, "/v1/chat/completions"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body.is_empty());

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_uppercase();
    assert!(methods.contains("POST"), "methods: {methods}");
    assert!(methods.contains("OPTIONS"), "methods: {methods}");
    let allowed_headers = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed_headers.contains("content-type"));
    assert!(allowed_headers.contains("authorization"));
}

#[tokio::test]
async fn browser_preflight_is_answered() {
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(default_router(), preflight).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let bad = serde_json::json!({"model": "x", "messages": []});
    let (response, _) = send(default_router(), post_json("/v1/chat/completions", &bad)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (response, _) = send(default_router(), request(Method::GET, "/v1/embeddings")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn wrong_method_on_known_path_is_404() {
    for (method, uri) in [
        (Method::GET, "/v1/chat/completions"),
        (Method::DELETE, "/health"),
        (Method::POST, "/v1/models"),
    ] {
        let (response, _) = send(default_router(), request(method.clone(), uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let (response, body) = send(default_router(), request(Method::GET, "/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");
}

#[tokio::test]
async fn models_endpoint_lists_backend_model() {
    let (response, body) = send(default_router(), request(Method::GET, "/v1/models")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let models: ModelsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(models.object, "list");
    assert_eq!(models.data.len(), 1);
    assert_eq!(models.data[0].id, "stub-model");
    assert_eq!(models.data[0].object, "model");
}
