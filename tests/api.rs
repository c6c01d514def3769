//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use finance_chat_cascade::adapters::{AdapterRequest, AdapterSet, ProviderAdapter};
use finance_chat_cascade::api::create_router;
use finance_chat_cascade::config::CascadePolicy;
use finance_chat_cascade::error::ProviderError;
use finance_chat_cascade::providers::Provider;
use finance_chat_cascade::{
    AvailabilityTracker, CascadeOrchestrator, ProviderRegistry, Settings, StaticCredentials,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Fixed(Result<String, ProviderError>);

#[async_trait]
impl ProviderAdapter for Fixed {
    async fn complete(&self, _provider: &Provider, _request: &AdapterRequest) -> Result<String, ProviderError> {
        self.0.clone()
    }
}

fn app() -> (Router, Arc<CascadeOrchestrator>) {
    let creds = StaticCredentials::new()
        .with("GEMINI_API_KEY", "g-secret")
        .with("GROQ_API_KEY", "gsk-secret");
    let settings = Settings {
        policy: CascadePolicy {
            retry_delay: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    };

    let registry = Arc::new(ProviderRegistry::with_defaults(Arc::new(creds)));
    let tracker = AvailabilityTracker::new(registry, &settings.policy);
    let adapters = AdapterSet::new()
        .with_provider("gemini", Arc::new(Fixed(Err(ProviderError::Auth { status: 401 }))))
        .with_provider(
            "groq",
            Arc::new(Fixed(Ok("I suggest you set a savings goal for this year.".into()))),
        );

    let cascade = Arc::new(CascadeOrchestrator::new(tracker, adapters, &settings));
    (create_router(cascade.clone()), cascade)
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(json) => request.body(Body::from(json.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = app();
    let (status, body) = call(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn chat_returns_normalized_response() {
    let (app, _) = app();
    let (status, body) = call(
        app,
        "POST",
        "/api/chat",
        Some(json!({
            "message": "How do I save for a trip?",
            "persona": "sprout",
            "history": [{ "role": "user", "content": "hi" }],
            "context": { "balance": 1200.0, "data_sharing_consent": false }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["provider_label"], "Groq");
    assert_eq!(data["metadata"]["provider"], "groq");
    assert_eq!(data["action_hint"]["type"], "set_goal");
    assert!(data["message"].as_str().unwrap().contains("do your own research"));
}

#[tokio::test]
async fn oversized_message_is_bad_request() {
    let (app, _) = app();
    let (status, body) = call(app, "POST", "/api/chat", Some(json!({ "message": "x".repeat(5001) }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_persona_is_bad_request() {
    let (app, _) = app();
    let (status, _) = call(app, "POST", "/api/chat", Some(json!({ "message": "hi", "persona": "ghost" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn providers_listing_hides_secrets_and_shows_windows() {
    let (app, cascade) = app();
    // gemini answers 401 and is disabled until reset
    call(app.clone(), "POST", "/api/chat", Some(json!({ "message": "hello" }))).await;

    let (status, body) = call(app, "GET", "/api/providers", None).await;
    assert_eq!(status, StatusCode::OK);

    let raw = body.to_string();
    assert!(!raw.contains("g-secret"));
    assert!(!raw.contains("gsk-secret"));

    let providers = body["data"]["providers"].as_array().unwrap();
    let gemini = providers.iter().find(|p| p["key"] == "gemini").unwrap();
    assert_eq!(gemini["available"], false);
    assert_eq!(gemini["credential_present"], true);
    assert_eq!(gemini["window"]["reason"], "auth_failure");
    assert_eq!(gemini["credential_fingerprint"].as_str().unwrap().len(), 12);
    assert_eq!(body["data"]["preferred"], "groq");

    assert!(!cascade.tracker().is_available("gemini").await);
}

#[tokio::test]
async fn reset_reenables_auth_disabled_provider() {
    let (app, cascade) = app();
    call(app.clone(), "POST", "/api/chat", Some(json!({ "message": "hello" }))).await;
    assert!(!cascade.tracker().is_available("gemini").await);

    let (status, body) = call(
        app.clone(),
        "POST",
        "/api/providers/reset",
        Some(json!({ "provider": "gemini" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], true);
    assert!(cascade.tracker().is_available("gemini").await);

    let (status, _) = call(app.clone(), "POST", "/api/providers/reset", Some(json!({ "provider": "nope" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(app, "POST", "/api/providers/reset", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], 0);
}
