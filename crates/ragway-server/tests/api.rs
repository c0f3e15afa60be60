//! Router tests — drive the axum app in-process with `oneshot` and check
//! status codes and response shapes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ragway_chat::{Completion, LLMConfig, Provider, ProviderClient, ProviderError, ProviderRegistry};
use ragway_core::{ChatMessage, GatewayConfig};
use ragway_runtime::{Dispatcher, Gateway};
use ragway_server::{build_router, AppState};
use ragway_store::{MetricsCollector, ResponseCache, SqliteStore, StoredCacheEntry};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct FixedClient {
    provider: Provider,
    reply: Result<String, ProviderError>,
    calls: AtomicUsize,
}

#[async_trait]
impl ProviderClient for FixedClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map(Completion::new)
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    clients: Vec<Arc<FixedClient>>,
    _dir: TempDir,
}

impl TestApp {
    fn new(replies: Vec<(Provider, Result<&str, ProviderError>)>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::from_lookup(dir.path(), |_| None).unwrap();
        let store = Arc::new(SqliteStore::open(&config.data_paths.db_dir).unwrap());

        let clients: Vec<Arc<FixedClient>> = replies
            .into_iter()
            .map(|(provider, reply)| {
                Arc::new(FixedClient {
                    provider,
                    reply: reply.map(str::to_string),
                    calls: AtomicUsize::new(0),
                })
            })
            .collect();
        let credentialed: Vec<Provider> = clients.iter().map(|c| c.provider).collect();
        let map: HashMap<Provider, Arc<dyn ProviderClient>> = clients
            .iter()
            .map(|c| (c.provider, c.clone() as Arc<dyn ProviderClient>))
            .collect();

        let gateway = Gateway::new(
            Arc::new(ProviderRegistry::with_credentials(&credentialed)),
            Dispatcher::new(map, Duration::from_secs(2)),
            Arc::new(ResponseCache::in_memory()),
            Arc::new(MetricsCollector::open(store, 64).unwrap()),
            config.cache_max_age(),
        );
        let state = Arc::new(AppState::with_gateway(config, gateway));

        Self {
            router: build_router(state.clone()),
            state,
            clients,
            _dir: dir,
        }
    }

    fn calls(&self) -> usize {
        self.clients.iter().map(|c| c.calls.load(Ordering::SeqCst)).sum()
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post_raw(&self, uri: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn test_single_query_then_cache_hit() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("Thirty days."))]);
    let body = json!({
        "agentContext": {
            "systemPrompt": "You are the HR agent.",
            "passages": [{"text": "Vacation is 30 days.", "source": "policy.pdf"}]
        },
        "question": "How much vacation?",
        "mode": "single",
        "providers": [{"provider": "openai", "model": "gpt-4o"}]
    });

    let (status, first) = app.post("/api/query", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["mode"], "single");
    assert_eq!(first["provider"], "openai");
    assert_eq!(first["model"], "gpt-4o");
    assert_eq!(first["response"], "Thirty days.");
    assert_eq!(first["cached"], false);
    assert!(first["latencyMs"].is_number());

    let (status, second) = app.post("/api/query", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["latencyMs"], 0.0);
    assert_eq!(app.calls(), 1);
}

#[tokio::test]
async fn test_model_not_allowed_is_bad_request() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("unused"))]);
    let (status, body) = app
        .post(
            "/api/query",
            json!({
                "question": "hi",
                "providers": [{"provider": "openai", "model": "gemini-pro"}]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "model_not_allowed");
    assert!(body["error"].as_str().unwrap().contains("gemini-pro"));
    assert!(body["allowedModels"]
        .as_array()
        .unwrap()
        .contains(&json!("gpt-4o")));
    assert_eq!(app.calls(), 0);
}

#[tokio::test]
async fn test_unknown_provider_and_empty_question() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("unused"))]);

    let (status, body) = app
        .post(
            "/api/query",
            json!({"question": "hi", "providers": [{"provider": "anthropic"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "unknown_provider");

    let (status, body) = app.post("/api/query", json!({"question": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert_eq!(app.calls(), 0);
}

#[tokio::test]
async fn test_provider_errors_map_to_gateway_statuses() {
    for (error, expected) in [
        (ProviderError::Timeout, StatusCode::GATEWAY_TIMEOUT),
        (ProviderError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        (ProviderError::Unauthorized, StatusCode::BAD_GATEWAY),
        (
            ProviderError::Unknown {
                code: Some(500),
                message: "boom".into(),
            },
            StatusCode::BAD_GATEWAY,
        ),
    ] {
        let kind = error.kind();
        let app = TestApp::new(vec![(Provider::DeepSeek, Err(error))]);
        let (status, body) = app
            .post(
                "/api/query",
                json!({"question": "hi", "providers": [{"provider": "deepseek"}]}),
            )
            .await;
        assert_eq!(status, expected);
        assert_eq!(body["kind"], kind);
        assert_eq!(body["provider"], "deepseek");
        assert_eq!(body["model"], "deepseek-chat");
    }
}

#[tokio::test]
async fn test_fan_out_response_shape() {
    let app = TestApp::new(vec![
        (Provider::OpenAI, Ok("same")),
        (Provider::OpenRouter, Ok("same")),
        (Provider::Gemini, Err(ProviderError::RateLimited)),
    ]);
    let (status, body) = app
        .post(
            "/api/query",
            json!({
                "question": "Compare",
                "mode": "fanOut",
                "providers": [
                    {"provider": "openrouter"},
                    {"provider": "gemini", "model": "gemini-1.5-pro"},
                    {"provider": "openai", "model": "gpt-4"}
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "fanOut");
    assert_eq!(body["responses"].as_array().unwrap().len(), 2);
    assert_eq!(body["responses"][0]["provider"], "openrouter");
    assert_eq!(body["errors"][0]["provider"], "gemini");
    assert_eq!(body["errors"][0]["kind"], "rate_limited");
    assert_eq!(body["comparison"]["hasDuplicates"], true);
    assert_eq!(body["comparison"]["uniqueResponses"], 1);
    assert_eq!(body["comparison"]["longest"], "openrouter");
    assert_eq!(body["comparison"]["responseTimes"].as_array().unwrap().len(), 2);
    assert_eq!(body["comparison"]["responseTimes"][0]["provider"], "openrouter");
    assert!(body["comparison"]["responseTimes"][0]["latencyMs"].is_number());
    assert_eq!(app.calls(), 3);
}

#[tokio::test]
async fn test_stats_reflect_recorded_calls() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("ok"))]);
    for question in ["one", "two", "one"] {
        let (status, _) = app
            .post(
                "/api/query",
                json!({"question": question, "providers": [{"provider": "openai"}]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    app.state.gateway.flush().await;

    let (status, body) = app.get("/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["windowHours"], 24);
    let openai = &body["providers"]["openai"];
    assert_eq!(openai["requestCount"], 3);
    assert_eq!(openai["successRate"], 1.0);
    assert_eq!(openai["cacheHits"], 1);

    let (_, body) = app.get("/api/stats?hours=1").await;
    assert_eq!(body["windowHours"], 1);
}

#[tokio::test]
async fn test_health_lists_credentialed_providers() {
    let app = TestApp::new(vec![
        (Provider::Gemini, Ok("x")),
        (Provider::OpenRouter, Ok("y")),
    ]);
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["reachableProviders"], json!(["openrouter", "gemini"]));

    let empty = TestApp::new(vec![]);
    let (_, body) = empty.get("/api/health").await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_provider_and_model_listing() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("x"))]);

    let (status, body) = app.get("/api/llm/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"].as_array().unwrap().len(), 4);
    assert_eq!(body["providers"][1]["provider"], "openai");
    assert_eq!(body["providers"][1]["hasCredentials"], true);
    assert_eq!(body["providers"][1]["defaultModel"], "gpt-3.5-turbo");
    assert!(body.to_string().find("apiKey").is_none());

    let (status, body) = app.get("/api/llm/models?provider=gemini").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"].as_array().unwrap().len(), 4);
    assert_eq!(body["models"][0]["name"], "gemini-1.5-flash");
    assert!(body["models"][0]["contextLength"].is_number());

    let (status, body) = app.get("/api/llm/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"].as_array().unwrap().len(), 18);

    let (status, _) = app.get("/api/llm/models?provider=claude").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let app = TestApp::new(vec![(Provider::OpenAI, Ok("x"))]);

    let (status, body) = app
        .post_raw("/api/query", "application/json", "{\"question\": ")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["error"].is_string());

    let (status, body) = app
        .post_raw("/api/query", "application/json", r#"{"providers": []}"#)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_request");

    let (status, body) = app.post_raw("/api/query", "text/plain", "hello").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["kind"], "invalid_request");
    assert_eq!(app.calls(), 0);
}

#[tokio::test]
async fn test_task_recommendation() {
    let app = TestApp::new(vec![
        (Provider::Gemini, Ok("x")),
        (Provider::OpenRouter, Ok("y")),
    ]);

    let (status, body) = app.get("/api/llm/recommend?task=coding").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"], "coding");
    assert_eq!(body["provider"], "openrouter");
    assert_eq!(body["model"], "openai/gpt-4o-mini");

    let (status, body) = app.get("/api/llm/recommend").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"], "general");
    assert_eq!(body["provider"], "openrouter");

    let (_, body) = app.get("/api/llm/recommend?task=creative").await;
    assert_eq!(body["provider"], "gemini");

    let (status, body) = app.get("/api/llm/recommend?task=poetry").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "unknown_task");

    let empty = TestApp::new(vec![]);
    let (status, body) = empty.get("/api/llm/recommend?task=legal").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "no_provider_configured");
}

#[tokio::test]
async fn test_startup_drops_stale_cache_rows() {
    let dir = TempDir::new().unwrap();
    let config = GatewayConfig::from_lookup(dir.path(), |_| None).unwrap();
    {
        let store = SqliteStore::open(&config.data_paths.db_dir).unwrap();
        for i in 0..50 {
            store
                .upsert_cache_entry(&StoredCacheEntry {
                    cache_key: format!("old-{}", i),
                    response: "expired".into(),
                    provider: "openai".into(),
                    model: "gpt-4o".into(),
                    created_at: 0,
                })
                .unwrap();
        }
    }

    let state = AppState::new(config, &LLMConfig::default());
    assert!(state.gateway.cache().is_persistent());
    assert_eq!(state.gateway.cache().len(), 0);
}
