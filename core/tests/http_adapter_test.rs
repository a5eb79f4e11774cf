use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use switchboard_core::llm::{
    AnthropicWire, ClientRegistry, GeminiWire, HttpAdapter, OllamaWire, OpenAiWire, WireFormat,
};
use switchboard_core::tools::native::ClockTool;
use switchboard_core::{
    ChatConfig, ChatMessage, ChatOptions, ChatOrchestrator, ConversationContext, ProviderAdapter,
    ProviderConfig, ProviderError, ProviderSettings, ToolRegistry,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, key: Option<&str>) -> ProviderSettings {
    ProviderSettings {
        api_key: key.map(str::to_string),
        endpoint: Some(server.uri()),
        ..Default::default()
    }
}

fn http_adapter<W: WireFormat>(wire: W, settings: ProviderSettings, tools: ToolRegistry) -> HttpAdapter<W> {
    HttpAdapter::new(wire, settings, Arc::new(ClientRegistry::new()), tools)
}

fn openai_reply(text: &str) -> Value {
    json!({
        "model": "gpt-4o-mini",
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 9, "completion_tokens": 3}
    })
}

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are terse."),
        ChatMessage::user("hi"),
        ChatMessage::assistant(""),
    ]
}

#[tokio::test]
async fn openai_reply_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("hello there")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new());
    let response = adapter
        .call("gpt-4o-mini", &conversation(), &ProviderConfig::default())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.provider, "openai");
    assert_eq!(response.text, "hello there");
    assert_eq!(response.tokens_in, Some(9));
    assert_eq!(response.tokens_out, Some(3));
    assert_eq!(response.meta.finish_reason.as_deref(), Some("stop"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    // System prompt hoisted, empty assistant turn dropped
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "hi");
}

#[tokio::test]
async fn tools_are_advertised_only_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("ok")))
        .mount(&server)
        .await;

    let tools = ToolRegistry::new();
    tools.register(Arc::new(ClockTool));
    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), tools);

    adapter
        .call("gpt-4o-mini", &conversation(), &ProviderConfig::default())
        .await
        .unwrap();
    let disabled = ProviderConfig {
        tool_calls_enabled: false,
        ..Default::default()
    };
    adapter.call("gpt-4o-mini", &conversation(), &disabled).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let with_tools: Value = requests[0].body_json().unwrap();
    let without_tools: Value = requests[1].body_json().unwrap();
    assert_eq!(with_tools["tools"][0]["function"]["name"], "clock.now");
    assert!(without_tools.get("tools").is_none());
}

#[tokio::test]
async fn empty_reply_text_becomes_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        })))
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new());
    let response = adapter
        .call("gpt-4o-mini", &conversation(), &ProviderConfig::default())
        .await
        .unwrap();

    assert_eq!(response.text, "(no response)");
    assert!(response.meta.usage.is_none());
    assert!(response.meta.finish_reason.is_none());
    assert!(response.tokens_in.is_none());
}

#[tokio::test]
async fn slow_backend_loses_the_timeout_race() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_reply("too late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new());
    let config = ProviderConfig {
        timeout_ms: 100,
        ..Default::default()
    };

    let started = Instant::now();
    let err = adapter
        .call("gpt-4o-mini", &conversation(), &config)
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{err}");
    assert!(started.elapsed() < Duration::from_millis(1_500));
}

#[tokio::test]
async fn http_errors_fold_into_failed_response_when_asked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new());

    let err = adapter
        .call("gpt-4o-mini", &conversation(), &ProviderConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Backend { .. }));
    assert!(err.to_string().contains("HTTP 500"));

    let lenient = ProviderConfig {
        fallback_on_error: true,
        ..Default::default()
    };
    let response = adapter.call("gpt-4o-mini", &conversation(), &lenient).await.unwrap();
    assert!(!response.success);
    assert!(response.is_consistent());
    assert!(response.errors[0].contains("upstream exploded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_build_one_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_reply("ok"))
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    let adapter = Arc::new(http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new()));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            adapter
                .call("gpt-4o-mini", &[ChatMessage::user("hi")], &ProviderConfig::default())
                .await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().unwrap().success);
    }

    assert_eq!(adapter.client_init_attempts(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 16);
}

#[tokio::test]
async fn anthropic_sends_key_and_version_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-5-haiku-latest",
            "content": [{"type": "text", "text": "hello"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 4, "output_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = http_adapter(AnthropicWire, settings(&server, Some("sk-ant")), ToolRegistry::new());
    let response = adapter
        .call("claude-3-5-haiku-latest", &conversation(), &ProviderConfig::default())
        .await
        .unwrap();

    assert_eq!(response.text, "hello");
    assert_eq!(response.meta.finish_reason.as_deref(), Some("end_turn"));

    let body: Value = server.received_requests().await.unwrap()[0].body_json().unwrap();
    assert_eq!(body["system"], "You are terse.");
}

#[tokio::test]
async fn ollama_needs_no_key_and_probes_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let adapter = http_adapter(OllamaWire, settings(&server, None), ToolRegistry::new());
    assert!(adapter.health_check().await);

    let down = MockServer::start().await;
    let unhealthy = http_adapter(OllamaWire, settings(&down, None), ToolRegistry::new());
    assert!(!unhealthy.health_check().await);
}

#[tokio::test]
async fn orchestrator_falls_back_when_backend_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = ChatConfig::default();
    config.providers.openai = settings(&server, Some("sk-test"));
    let orch = ChatOrchestrator::new(config, ToolRegistry::new());
    let mut ctx = ConversationContext::new();

    let response = orch
        .handle_chat_request(
            "gpt-4o-mini",
            &[ChatMessage::user("hello")],
            &ChatOptions::default(),
            &mut ctx,
        )
        .await;

    assert!(response.success);
    assert!(response.meta.fallback_used);
    assert_eq!(response.meta.original_provider.as_deref(), Some("openai"));
    assert!(response.meta.errors[0].contains("HTTP 503"));
    assert_eq!(ctx.turn_count, 1);
}

#[tokio::test]
async fn rejected_credentials_rebuild_the_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-stale")), ToolRegistry::new());
    for _ in 0..2 {
        let err = adapter
            .call("gpt-4o-mini", &[ChatMessage::user("hi")], &ProviderConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
    }
    assert_eq!(adapter.client_init_attempts(), 2);
}

#[tokio::test]
async fn server_errors_keep_the_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = http_adapter(OpenAiWire, settings(&server, Some("sk-test")), ToolRegistry::new());
    for _ in 0..2 {
        assert!(adapter
            .call("gpt-4o-mini", &[ChatMessage::user("hi")], &ProviderConfig::default())
            .await
            .is_err());
    }
    assert_eq!(adapter.client_init_attempts(), 1);
}

#[tokio::test]
async fn gemini_model_cannot_rewrite_the_request_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "hi"}]}, "finishReason": "STOP"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = http_adapter(GeminiWire, settings(&server, Some("g-test")), ToolRegistry::new());
    let response = adapter
        .call("gemini-x/../../v1/files", &conversation(), &ProviderConfig::default())
        .await
        .unwrap();
    assert_eq!(response.text, "hi");
    assert_eq!(response.model, "gemini-1.5-flash");
}
