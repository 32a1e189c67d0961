//! Sends sample alerts to a running responder and prints the analyses.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{json, Value};

/// Sample triggered Datadog monitor webhook.
pub fn sample_webhook() -> Value {
    json!({
        "title": "High Error Rate Detected",
        "text": "Error rate for api-service exceeded 5% threshold. Current error rate: 15.5%",
        "alert_status": "triggered",
        "tags": [
            "service:api-service",
            "env:production",
            "team:backend",
            "severity:high"
        ],
        "alert_type": "error_tracking",
        "date": chrono::Utc::now().to_rfc3339(),
        "org": { "id": "12345", "name": "Demo Org" },
        "id": "test-alert-123"
    })
}

/// Sample direct analysis request.
pub fn sample_analyze_request() -> Value {
    json!({
        "alert_title": "Database Connection Pool Exhausted",
        "alert_message": "Connection pool size exceeded maximum capacity",
        "service_name": "payment-service",
        "alert_tags": ["service:payment-service", "env:production"]
    })
}

/// Post both samples to the responder at `base_url`.
pub async fn send_test_alerts(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let base_url = base_url.trim_end_matches('/');

    let webhook_url = format!("{base_url}/webhook/datadog");
    println!("{} {}", "Sending test webhook to".bold(), webhook_url.cyan());
    let response = post(&client, &webhook_url, &sample_webhook()).await?;
    print_analysis(&response);

    let analyze_url = format!("{base_url}/api/analyze");
    println!();
    println!("{} {}", "Sending analyze request to".bold(), analyze_url.cyan());
    let response = post(&client, &analyze_url, &sample_analyze_request()).await?;
    print_analysis(&response);

    Ok(())
}

async fn post(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Could not connect to {url}; is the responder running?"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{url} returned {status}: {body}");
    }

    response
        .json()
        .await
        .with_context(|| format!("{url} returned a non-JSON body"))
}

fn print_analysis(response: &Value) {
    let Some(analysis) = response.get("analysis") else {
        println!("{} {response}", "Response:".yellow());
        return;
    };

    let field = |name| text_field(analysis, name);

    println!("{}", "=".repeat(50));
    println!("{}", "INCIDENT ANALYSIS".green().bold());
    println!("{}", "=".repeat(50));
    println!("Incident ID: {}", field("incident_id"));
    println!("Service: {}", field("service_name"));
    println!("Severity: {}", field("severity"));
    println!("Confidence: {}", field("confidence"));
    println!("\nSummary: {}", field("summary"));
    println!("\nRoot Cause: {}", field("root_cause"));
    println!("\nRecent Changes: {}", field("recent_changes"));
    println!("\nRecommended Actions:");

    let actions = analysis
        .get("recommended_actions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (i, action) in actions.iter().enumerate() {
        println!("  {}. {}", i + 1, action.as_str().unwrap_or_default());
    }
}

fn text_field<'a>(analysis: &'a Value, name: &str) -> &'a str {
    analysis.get(name).and_then(Value::as_str).unwrap_or("N/A")
}
