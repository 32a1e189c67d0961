//! Datadog API client for logs, spans and metrics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{TelemetrySource, TimeWindow};
use crate::error::TelemetryError;
use crate::models::{LogEntry, TraceSpan, MAX_LOGS, MAX_TRACES};

/// Default Datadog site.
pub const DEFAULT_SITE: &str = "datadoghq.com";

/// Configuration for the Datadog client.
#[derive(Debug, Clone)]
pub struct DatadogConfig {
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    /// Base URL for the API, e.g. `https://api.datadoghq.com`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl DatadogConfig {
    /// Configuration for the API of a Datadog site such as `datadoghq.eu`.
    pub fn for_site(api_key: Option<String>, app_key: Option<String>, site: &str) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            app_key: app_key.filter(|key| !key.trim().is_empty()),
            base_url: format!("https://api.{site}"),
            timeout_secs: 10,
        }
    }
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self::for_site(None, None, DEFAULT_SITE)
    }
}

#[derive(Debug, Serialize)]
struct SearchQuery {
    filter: SearchFilter,
    page: SearchPage,
    sort: &'static str,
}

#[derive(Debug, Serialize)]
struct SearchFilter {
    query: String,
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct SearchPage {
    limit: usize,
}

/// Span search wraps its query in a JSON:API envelope.
#[derive(Debug, Serialize)]
struct SpanSearchRequest {
    data: SpanSearchData,
}

#[derive(Debug, Serialize)]
struct SpanSearchData {
    #[serde(rename = "type")]
    kind: &'static str,
    attributes: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

impl SearchQuery {
    fn new(service: &str, window: &TimeWindow, limit: usize) -> Self {
        Self {
            filter: SearchFilter {
                query: format!("service:{service}"),
                from: window.start.to_rfc3339(),
                to: window.end.to_rfc3339(),
            },
            page: SearchPage { limit },
            sort: "-timestamp",
        }
    }
}

/// Datadog client.
#[derive(Debug, Clone)]
pub struct DatadogClient {
    config: DatadogConfig,
    client: reqwest::Client,
}

impl DatadogClient {
    pub fn new(config: DatadogConfig) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, TelemetryError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(TelemetryError::NotConfigured("DATADOG_API_KEY"))?;
        let app_key = self
            .config
            .app_key
            .as_deref()
            .ok_or(TelemetryError::NotConfigured("DATADOG_APP_KEY"))?;

        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));

        Ok(self
            .client
            .request(method, url)
            .header("DD-API-KEY", api_key)
            .header("DD-APPLICATION-KEY", app_key))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, TelemetryError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| TelemetryError::Decode(e.to_string()))
    }
}

/// Decode search events, reading fields from `attributes` when present.
fn decode_events<T: DeserializeOwned>(events: Vec<Value>) -> Vec<T> {
    events
        .into_iter()
        .filter_map(|event| {
            let body = match event {
                Value::Object(mut map) => match map.remove("attributes") {
                    Some(attributes @ Value::Object(_)) => attributes,
                    _ => Value::Object(map),
                },
                other => other,
            };

            serde_json::from_value(body)
                .map_err(|e| debug!(error = %e, "Skipping undecodable telemetry event"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl TelemetrySource for DatadogClient {
    fn name(&self) -> &'static str {
        "datadog"
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some() && self.config.app_key.is_some()
    }

    async fn fetch_logs(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LogEntry>, TelemetryError> {
        debug!(service, "Fetching logs from Datadog");

        let request = self
            .request(Method::POST, "/api/v2/logs/events/search")?
            .json(&SearchQuery::new(service, window, MAX_LOGS));
        let response: SearchResponse = Self::send(request).await?;

        Ok(decode_events(response.data))
    }

    async fn fetch_traces(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TraceSpan>, TelemetryError> {
        debug!(service, "Fetching spans from Datadog");

        let body = SpanSearchRequest {
            data: SpanSearchData {
                kind: "search_request",
                attributes: SearchQuery::new(service, window, MAX_TRACES),
            },
        };
        let request = self
            .request(Method::POST, "/api/v2/spans/events/search")?
            .json(&body);
        let response: SearchResponse = Self::send(request).await?;

        Ok(decode_events(response.data))
    }

    async fn fetch_metrics(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Map<String, Value>, TelemetryError> {
        let query = format!("avg:http.request.duration{{service:{service}}}.rollup(p95)");
        debug!(service, query = %query, "Querying Datadog metrics");

        let request = self.request(Method::GET, "/api/v1/query")?.query(&[
            ("query", query),
            ("from", window.start.timestamp().to_string()),
            ("to", window.end.timestamp().to_string()),
        ]);

        match Self::send::<Value>(request).await? {
            Value::Object(metrics) => Ok(metrics),
            other => Err(TelemetryError::Decode(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_site_base_url() {
        let config = DatadogConfig::for_site(Some("a".into()), Some("b".into()), "datadoghq.eu");
        assert_eq!(config.base_url, "https://api.datadoghq.eu");
    }

    #[test]
    fn test_blank_keys_are_unconfigured() {
        let config = DatadogConfig::for_site(Some(String::new()), Some("b".into()), DEFAULT_SITE);
        let client = DatadogClient::new(config).unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn test_decode_events_reads_attributes_or_top_level() {
        let logs: Vec<LogEntry> = decode_events(vec![
            json!({
                "id": "AAA",
                "type": "log",
                "attributes": { "message": "boom", "status": "error", "service": "api" }
            }),
            json!({ "message": "flat", "status": "info" }),
        ]);

        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message.as_deref(), Some("boom"));
        assert!(logs[0].is_error());
        assert_eq!(logs[1].message.as_deref(), Some("flat"));
    }

    #[test]
    fn test_decode_events_skips_malformed() {
        let spans: Vec<TraceSpan> =
            decode_events(vec![json!("not an object"), json!({ "duration": 12.5 })]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration, Some(12.5));
    }
}
