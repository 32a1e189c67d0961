//! Incident context collection.
//!
//! Gathers logs, traces, metrics and deployments for a service around an
//! alert. The four fetches run concurrently, each under its own timeout; a
//! failed fetch degrades to an empty value without affecting its siblings.
//! When the telemetry source is unconfigured, or the window cannot be built,
//! the whole context degrades to a fixed synthetic scenario.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::TelemetryError;
use crate::models::{Deployment, IncidentContext, LogEntry, TraceSpan, MAX_LOGS, MAX_TRACES};
use crate::telemetry::{DeploymentTracker, TelemetrySource, TimeWindow};

/// Number of deployments requested from the tracker.
const DEPLOYMENT_LIMIT: usize = 5;

/// Result of context collection.
#[derive(Debug, Clone)]
pub enum ContextOutcome {
    /// Collected from the telemetry source
    Live(IncidentContext),
    /// Fixed demo context, with the reason live collection was not used
    Synthetic {
        context: IncidentContext,
        reason: String,
    },
}

impl ContextOutcome {
    pub fn context(&self) -> &IncidentContext {
        match self {
            Self::Live(context) | Self::Synthetic { context, .. } => context,
        }
    }

    pub fn into_context(self) -> IncidentContext {
        match self {
            Self::Live(context) | Self::Synthetic { context, .. } => context,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic { .. })
    }
}

/// Gathers telemetry for incidents.
pub struct ContextCollector {
    source: Arc<dyn TelemetrySource>,
    deployments: Arc<dyn DeploymentTracker>,
    fetch_timeout: Duration,
}

impl ContextCollector {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        deployments: Arc<dyn DeploymentTracker>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            deployments,
            fetch_timeout,
        }
    }

    /// Collect context for `service_name` over the last `window_minutes`.
    pub async fn collect(
        &self,
        service_name: &str,
        alert_title: &str,
        window_minutes: u32,
    ) -> ContextOutcome {
        if !self.source.is_configured() {
            info!(
                source = self.source.name(),
                "Telemetry source not configured, using synthetic context"
            );
            return ContextOutcome::Synthetic {
                context: synthetic_context(service_name),
                reason: format!("{} not configured", self.source.name()),
            };
        }

        let window = match TimeWindow::last_minutes(window_minutes) {
            Ok(window) => window,
            Err(e) => {
                warn!(error = %e, "Cannot collect context, using synthetic context");
                return ContextOutcome::Synthetic {
                    context: synthetic_context(service_name),
                    reason: e.to_string(),
                };
            }
        };

        info!(
            service = service_name,
            alert = alert_title,
            window_minutes,
            "Collecting incident context"
        );

        let (logs, traces, metrics, recent_deployments) = tokio::join!(
            self.bounded("logs", self.source.fetch_logs(service_name, &window)),
            self.bounded("traces", self.source.fetch_traces(service_name, &window)),
            self.bounded("metrics", self.source.fetch_metrics(service_name, &window)),
            self.bounded(
                "deployments",
                self.deployments
                    .recent_deployments(service_name, DEPLOYMENT_LIMIT)
            ),
        );

        ContextOutcome::Live(build_context(logs, traces, metrics, recent_deployments))
    }

    /// Run one fetch under the timeout, degrading failures to the default value.
    async fn bounded<T, F>(&self, what: &'static str, fetch: F) -> T
    where
        T: Default,
        F: Future<Output = Result<T, TelemetryError>>,
    {
        let result = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .unwrap_or_else(|_| Err(TelemetryError::Timeout(self.fetch_timeout.as_secs())));

        match result {
            Ok(value) => {
                debug!(what, "Fetched telemetry");
                value
            }
            Err(e) => {
                warn!(what, error = %e, "Telemetry fetch failed, continuing without it");
                T::default()
            }
        }
    }
}

/// Assemble a context from fetched parts, bounding sizes and deriving statistics.
pub fn build_context(
    mut logs: Vec<LogEntry>,
    mut traces: Vec<TraceSpan>,
    metrics: Map<String, Value>,
    recent_deployments: Vec<Deployment>,
) -> IncidentContext {
    logs.truncate(MAX_LOGS);
    traces.truncate(MAX_TRACES);

    let error_rate = error_rate(&logs);
    let latency_p95 = latency_p95(&traces, &metrics);

    IncidentContext {
        logs,
        traces,
        metrics,
        recent_deployments,
        error_rate,
        latency_p95,
    }
}

/// Percentage of log entries with status `error`; `None` without logs.
pub fn error_rate(logs: &[LogEntry]) -> Option<f64> {
    if logs.is_empty() {
        return None;
    }

    let errors = logs.iter().filter(|log| log.is_error()).count();
    Some(errors as f64 / logs.len() as f64 * 100.0)
}

/// p95 latency in milliseconds.
///
/// Prefers the last point of the first metric series; otherwise derives it
/// from trace durations.
pub fn latency_p95(traces: &[TraceSpan], metrics: &Map<String, Value>) -> Option<f64> {
    series_latest_value(metrics).or_else(|| {
        let durations: Vec<f64> = traces.iter().filter_map(|span| span.duration).collect();
        percentile_95(durations)
    })
}

fn series_latest_value(metrics: &Map<String, Value>) -> Option<f64> {
    metrics
        .get("series")?
        .as_array()?
        .first()?
        .get("pointlist")?
        .as_array()?
        .last()?
        .get(1)?
        .as_f64()
}

/// Element at index `floor(0.95 * n)` of the sorted values, clamped to `n - 1`.
pub fn percentile_95(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let index = (values.len() * 95 / 100).min(values.len() - 1);
    Some(values[index])
}

/// Demo context describing a database connection pool exhaustion.
pub fn synthetic_context(service_name: &str) -> IncidentContext {
    let now = Utc::now();
    let log = |minutes_ago: i64, message: String| LogEntry {
        message: Some(message),
        timestamp: Some((now - ChronoDuration::minutes(minutes_ago)).to_rfc3339()),
        status: Some("error".to_string()),
        service: Some(service_name.to_string()),
    };

    let mut metrics = Map::new();
    metrics.insert("error_rate".to_string(), json!(15.5));
    metrics.insert("latency_p95".to_string(), json!(2500));

    IncidentContext {
        logs: vec![
            log(
                5,
                format!("[ERROR] Database connection pool exhausted in {service_name}"),
            ),
            log(
                4,
                format!("[ERROR] Timeout waiting for connection in {service_name}"),
            ),
        ],
        traces: vec![TraceSpan {
            operation: Some("database.query".to_string()),
            duration: Some(5000.0),
            status: Some("error".to_string()),
            service: Some(service_name.to_string()),
        }],
        metrics,
        recent_deployments: vec![Deployment {
            version: "v1.4.2".to_string(),
            timestamp: now - ChronoDuration::minutes(30),
            service: service_name.to_string(),
        }],
        error_rate: Some(15.5),
        latency_p95: Some(2500.0),
    }
}
