//! Context collection and analysis against mocked Datadog and Gemini APIs.

use std::sync::Arc;
use std::time::Duration;

use responder::context::{ContextCollector, ContextOutcome};
use responder::llm::{GeminiClient, GeminiConfig};
use responder::orchestrator::AnalysisOrchestrator;
use responder::store::{IncidentStore, MemoryIncidentStore};
use responder::telemetry::{
    DatadogClient, DatadogConfig, StaticDeploymentTracker, TelemetrySource, TimeWindow,
};
use responder::{AlertRequest, Confidence, TelemetryError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn datadog(server: &MockServer) -> DatadogClient {
    DatadogClient::new(DatadogConfig {
        api_key: Some("dd-api".to_string()),
        app_key: Some("dd-app".to_string()),
        base_url: server.uri(),
        timeout_secs: 5,
    })
    .unwrap()
}

async fn mount_logs(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/logs/events/search"))
        .and(header("DD-API-KEY", "dd-api"))
        .and(header("DD-APPLICATION-KEY", "dd-app"))
        .and(body_partial_json(json!({
            "filter": { "query": "service:checkout" },
            "sort": "-timestamp"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "1", "attributes": { "message": "pool exhausted", "status": "error", "timestamp": "2026-01-01T00:00:00Z" } },
                { "id": "2", "attributes": { "message": "request ok", "status": "info" } },
                { "id": "3", "attributes": { "message": "retrying", "status": "warn" } },
                { "id": "4", "attributes": { "message": "timeout", "status": "error" } }
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_spans(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/spans/events/search"))
        .and(body_partial_json(json!({ "data": { "type": "search_request" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "attributes": { "operation_name": "GET /cart", "duration": 120.0, "status": "ok" } },
                { "attributes": { "operation_name": "POST /pay", "duration": 900.0, "status": "error" } }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_logs_sends_credentials_and_decodes_events() {
    let server = MockServer::start().await;
    mount_logs(&server).await;

    let window = TimeWindow::last_minutes(15).unwrap();
    let logs = datadog(&server).fetch_logs("checkout", &window).await.unwrap();

    assert_eq!(logs.len(), 4);
    assert_eq!(logs[0].message.as_deref(), Some("pool exhausted"));
    assert!(logs[0].is_error());
}

#[tokio::test]
async fn test_fetch_metrics_queries_p95() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param(
            "query",
            "avg:http.request.duration{service:checkout}.rollup(p95)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "series": [{ "pointlist": [[1.0, 210.0], [2.0, 480.5]] }]
        })))
        .mount(&server)
        .await;

    let window = TimeWindow::last_minutes(15).unwrap();
    let metrics = datadog(&server)
        .fetch_metrics("checkout", &window)
        .await
        .unwrap();

    assert_eq!(metrics["status"], "ok");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let window = TimeWindow::last_minutes(15).unwrap();
    let err = datadog(&server)
        .fetch_logs("checkout", &window)
        .await
        .unwrap_err();

    assert!(matches!(err, TelemetryError::Status { status: 403, .. }));
}

#[tokio::test]
async fn test_live_context_derives_statistics() {
    let server = MockServer::start().await;
    mount_logs(&server).await;
    mount_spans(&server).await;
    // Metrics endpoint left unmounted: the 404 degrades to an empty map.

    let collector = ContextCollector::new(
        Arc::new(datadog(&server)),
        Arc::new(StaticDeploymentTracker::default()),
        Duration::from_secs(5),
    );

    let outcome = collector.collect("checkout", "High Error Rate", 15).await;
    assert!(!outcome.is_synthetic());

    let context = outcome.into_context();
    assert_eq!(context.logs.len(), 4);
    assert_eq!(context.traces.len(), 2);
    assert!(context.metrics.is_empty());
    assert_eq!(context.error_rate, Some(50.0));
    assert_eq!(context.latency_p95, Some(900.0));
    assert_eq!(context.recent_deployments.len(), 1);
}

#[tokio::test]
async fn test_failing_telemetry_still_yields_live_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let collector = ContextCollector::new(
        Arc::new(datadog(&server)),
        Arc::new(StaticDeploymentTracker::default()),
        Duration::from_secs(5),
    );

    match collector.collect("checkout", "High Error Rate", 15).await {
        ContextOutcome::Live(context) => {
            assert!(context.logs.is_empty());
            assert!(context.traces.is_empty());
            assert_eq!(context.error_rate, None);
            assert_eq!(context.latency_p95, None);
        }
        ContextOutcome::Synthetic { reason, .. } => panic!("unexpected synthetic context: {reason}"),
    }
}

#[tokio::test]
async fn test_full_pipeline_with_live_services() {
    let datadog_server = MockServer::start().await;
    mount_logs(&datadog_server).await;
    mount_spans(&datadog_server).await;

    let gemini_server = MockServer::start().await;
    let answer = "```json\n{\"summary\":\"Checkout pool exhausted\",\"root_cause\":\"Connection leak\",\"recent_changes\":\"v1.4.2\",\"recommended_actions\":[\"Roll back v1.4.2\",\"Raise pool size\"],\"confidence\":\"high\",\"severity\":\"critical\"}\n```";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "gm-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": answer }] } }]
        })))
        .expect(1)
        .mount(&gemini_server)
        .await;

    let gemini = GeminiClient::new(GeminiConfig {
        api_key: Some("gm-key".to_string()),
        base_url: gemini_server.uri(),
        timeout_secs: 5,
        ..GeminiConfig::default()
    })
    .unwrap();

    let collector = ContextCollector::new(
        Arc::new(datadog(&datadog_server)),
        Arc::new(StaticDeploymentTracker::default()),
        Duration::from_secs(5),
    );
    let store = Arc::new(MemoryIncidentStore::new());
    let orchestrator = AnalysisOrchestrator::new(
        collector,
        Arc::new(gemini),
        store.clone(),
        Arc::new(notify::Notifier::disabled()),
    );

    let alert = AlertRequest {
        alert_title: "High Error Rate".to_string(),
        alert_message: "5xx above 5%".to_string(),
        service_name: "checkout".to_string(),
        alert_tags: vec![],
        raw_payload: None,
    };
    let analysis = orchestrator.process(&alert).await;

    assert_eq!(analysis.summary, "Checkout pool exhausted");
    assert_eq!(analysis.confidence, Confidence::High);
    assert_eq!(analysis.recommended_actions.len(), 2);
    assert_eq!(analysis.raw_analysis.as_deref(), Some(answer));

    let requests = gemini_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("- pool exhausted [2026-01-01T00:00:00Z]"));
    assert!(prompt.contains("- POST /pay: 900ms [error]"));
    assert!(prompt.contains("- **Error Rate**: 50% (if available)"));

    let stored = store
        .find(&Default::default(), 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}
