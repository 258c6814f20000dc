//! Fallback behaviour against a mock Gemini REST server.
//!
//! Each test stands up a `wiremock` server, points the Gemini backend at it
//! via `base_url`, and scripts one response per model id.

use edgequake_qpgen::{
    generate_paper_sync, generate_paper_to_file, AttemptError, FallbackInvoker, GeminiBackend,
    GenerationConfig, QpGenError, TextSource,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` shows attempts.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn model_path(model: &str) -> String {
    format!("/v1beta/models/{model}:generateContent")
}

fn text_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
    })
}

fn error_body(code: u16, status: &str, message: &str) -> Value {
    json!({"error": {"code": code, "message": message, "status": status}})
}

async fn mount(server: &MockServer, model: &str, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path(model_path(model)))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

fn invoker(server: &MockServer, models: &[&str]) -> FallbackInvoker {
    init_tracing();
    let config = GenerationConfig::builder()
        .api_key("test-key")
        .base_url(server.uri())
        .backends(models.iter().copied())
        .build()
        .unwrap();
    let backend = GeminiBackend::from_config(&config).unwrap();
    FallbackInvoker::new(Arc::new(backend), config.backends.clone())
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limited_primary_falls_back() {
    let server = MockServer::start().await;
    mount(
        &server,
        "gemini-2.0-flash",
        ResponseTemplate::new(429).set_body_json(error_body(429, "RESOURCE_EXHAUSTED", "slow down")),
        1,
    )
    .await;
    mount(
        &server,
        "gemini-2.0-flash-lite",
        ResponseTemplate::new(200).set_body_json(text_body("Section A\n1. Define osmosis.")),
        1,
    )
    .await;
    mount(
        &server,
        "gemini-1.5-flash",
        ResponseTemplate::new(200).set_body_json(text_body("unused")),
        0,
    )
    .await;

    let generation = invoker(
        &server,
        &["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-flash"],
    )
    .generate("prompt")
    .await
    .unwrap();

    assert_eq!(generation.text, "Section A\n1. Define osmosis.");
    assert_eq!(generation.backend, "gemini-2.0-flash-lite");
    assert_eq!(generation.source, TextSource::Primary);
    assert_eq!(generation.failures.len(), 1);
    assert!(generation.failures[0].is_expected());
}

#[tokio::test]
async fn resource_exhausted_without_429_is_quota() {
    let server = MockServer::start().await;
    mount(
        &server,
        "a",
        ResponseTemplate::new(403).set_body_json(error_body(403, "RESOURCE_EXHAUSTED", "Quota exceeded")),
        1,
    )
    .await;
    mount(&server, "b", ResponseTemplate::new(200).set_body_json(text_body("OK")), 1).await;

    let generation = invoker(&server, &["a", "b"]).generate("p").await.unwrap();
    assert_eq!(generation.text, "OK");
    assert_eq!(
        generation.failures,
        vec![AttemptError::quota("a", "HTTP 403: Quota exceeded")]
    );
}

#[tokio::test]
async fn quota_then_server_error_then_success() {
    let server = MockServer::start().await;
    mount(&server, "A", ResponseTemplate::new(429), 1).await;
    mount(
        &server,
        "B",
        ResponseTemplate::new(500).set_body_json(error_body(500, "INTERNAL", "backend exploded")),
        1,
    )
    .await;
    mount(&server, "C", ResponseTemplate::new(200).set_body_json(text_body("OK")), 1).await;

    let generation = invoker(&server, &["A", "B", "C"]).generate("p").await.unwrap();
    assert_eq!(generation.text, "OK");
    let last = generation.failures.last().unwrap();
    assert!(!last.is_expected());
    assert_eq!(last.backend(), "B");
    assert!(last.to_string().contains("backend exploded"));
}

#[tokio::test]
async fn multiple_candidates_use_nested_path() {
    let server = MockServer::start().await;
    let body = json!({
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": "first "}, {"text": "candidate"}]}, "finishReason": "STOP"},
            {"content": {"role": "model", "parts": [{"text": "second"}]}, "finishReason": "STOP"}
        ]
    });
    mount(&server, "m", ResponseTemplate::new(200).set_body_json(body), 1).await;

    let generation = invoker(&server, &["m"]).generate("p").await.unwrap();
    assert_eq!(generation.text, "first candidate");
    assert_eq!(generation.source, TextSource::Nested);
    assert!(generation.failures.is_empty());
}

#[tokio::test]
async fn blocked_and_malformed_responses_advance() {
    let server = MockServer::start().await;
    let blocked = json!({
        "candidates": [{"finishReason": "SAFETY"}],
        "promptFeedback": {"blockReason": "SAFETY"}
    });
    mount(&server, "blocked", ResponseTemplate::new(200).set_body_json(blocked), 1).await;
    mount(
        &server,
        "garbled",
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
        1,
    )
    .await;
    mount(&server, "ok", ResponseTemplate::new(200).set_body_json(text_body("paper")), 1).await;

    let generation = invoker(&server, &["blocked", "garbled", "ok"])
        .generate("p")
        .await
        .unwrap();
    assert_eq!(generation.backend, "ok");
    assert_eq!(
        generation.failures[0],
        AttemptError::backend_error("blocked", "response contained no text")
    );
    assert!(generation.failures[1]
        .to_string()
        .contains("malformed response"));
}

#[tokio::test]
async fn all_backends_failing_reports_last_cause() {
    let server = MockServer::start().await;
    mount(&server, "a", ResponseTemplate::new(429), 1).await;
    mount(
        &server,
        "b",
        ResponseTemplate::new(404).set_body_json(error_body(404, "NOT_FOUND", "model not found")),
        1,
    )
    .await;

    let err = invoker(&server, &["a", "b"]).generate("p").await.unwrap_err();
    match err {
        QpGenError::AllBackendsFailed {
            attempted,
            last_error,
        } => {
            assert_eq!(attempted, 2);
            assert_eq!(
                last_error,
                Some(AttemptError::backend_error("b", "HTTP 404: model not found"))
            );
        }
        other => panic!("expected AllBackendsFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn request_carries_prompt_and_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(model_path("m")))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "the prompt"}]}],
            "generationConfig": {"maxOutputTokens": 4096}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_body("OK")))
        .expect(1)
        .mount(&server)
        .await;

    let generation = invoker(&server, &["m"]).generate("the prompt").await.unwrap();
    assert_eq!(generation.text, "OK");
}

// ── End to end through the config-selected backend ───────────────────────────

fn gemini_config(server: &MockServer, models: &[&str]) -> GenerationConfig {
    init_tracing();
    GenerationConfig::builder()
        .api_key("test-key")
        .base_url(server.uri())
        .backends(models.iter().copied())
        .build()
        .unwrap()
}

fn write_notes(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("osmosis.txt");
    std::fs::write(
        &path,
        "Osmosis is the movement of water across a semi-permeable membrane.\n\n\
         Diffusion moves solutes from high to low concentration.",
    )
    .unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn paper_written_to_file_after_quota_fallback() {
    let server = MockServer::start().await;
    mount(
        &server,
        "gemini-2.0-flash",
        ResponseTemplate::new(429).set_body_json(error_body(429, "RESOURCE_EXHAUSTED", "quota")),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(model_path("gemini-1.5-flash")))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("semi-permeable membrane"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_body("```text\nSection A\n1. Define osmosis.   \n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_notes(&dir);
    let out = dir.path().join("papers/osmosis-paper.txt");
    let config = gemini_config(&server, &["gemini-2.0-flash", "gemini-1.5-flash"]);

    let stats = generate_paper_to_file(&input, &out, &config).await.unwrap();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.quota_failures, 1);
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "Section A\n1. Define osmosis.\n"
    );
    assert!(!dir.path().join("papers/osmosis-paper.txt.tmp").exists());
}

#[tokio::test]
async fn failed_generation_leaves_no_output_file() {
    let server = MockServer::start().await;
    mount(&server, "a", ResponseTemplate::new(500), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_notes(&dir);
    let out = dir.path().join("paper.txt");
    let config = gemini_config(&server, &["a"]);

    let err = generate_paper_to_file(&input, &out, &config).await.unwrap_err();
    assert!(matches!(err, QpGenError::AllBackendsFailed { attempted: 1, .. }));
    assert!(!out.exists());
    assert!(!dir.path().join("paper.txt.tmp").exists());
}

#[test]
fn sync_generation_against_mock_server() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        mount(
            &server,
            "gemini-2.0-flash",
            ResponseTemplate::new(200).set_body_json(text_body("Section B\n2. Explain diffusion.")),
            1,
        )
        .await;
        server
    });

    let dir = tempfile::tempdir().unwrap();
    let input = write_notes(&dir);
    let config = gemini_config(&server, &["gemini-2.0-flash"]);

    let output = generate_paper_sync(&input, &config).unwrap();
    assert_eq!(output.text, "Section B\n2. Explain diffusion.\n");
    assert_eq!(output.generation.backend, "gemini-2.0-flash");
    assert_eq!(output.document.name, "osmosis.txt");
    assert_eq!(output.stats.attempts, 1);

    rt.block_on(server.verify());
}
