//! Data model for alerts, telemetry context and incident analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use notify::Severity;

/// Service name used when an alert does not identify one.
pub const UNKNOWN_SERVICE: &str = "unknown_service";

/// Maximum number of log entries kept in a context.
pub const MAX_LOGS: usize = 50;

/// Maximum number of trace spans kept in a context.
pub const MAX_TRACES: usize = 20;

/// An alert to analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRequest {
    pub alert_title: String,
    pub alert_message: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub alert_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
}

impl AlertRequest {
    /// Service name, falling back to [`UNKNOWN_SERVICE`] when blank.
    pub fn service(&self) -> &str {
        let name = self.service_name.trim();
        if name.is_empty() {
            UNKNOWN_SERVICE
        } else {
            name
        }
    }
}

/// Datadog monitor webhook body.
///
/// Only the fields the responder reads are typed; the full body is kept as
/// the alert's raw payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DatadogWebhook {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_alert_status")]
    pub alert_status: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_title() -> String {
    "Unknown Alert".to_string()
}

fn default_alert_status() -> String {
    "triggered".to_string()
}

impl DatadogWebhook {
    /// Whether the monitor fired (as opposed to recovering or warning).
    pub fn is_triggered(&self) -> bool {
        self.alert_status == "triggered"
    }

    /// Service named by the first `service:` tag.
    pub fn service_from_tags(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.starts_with("service:"))
            .and_then(|tag| tag.split(':').nth(1))
            .filter(|service| !service.is_empty())
    }

    /// Convert into an [`AlertRequest`], keeping `raw` as the payload.
    pub fn into_alert(self, raw: Value) -> AlertRequest {
        let service_name = self
            .service_from_tags()
            .unwrap_or(UNKNOWN_SERVICE)
            .to_string();

        AlertRequest {
            alert_title: self.title,
            alert_message: self.text,
            service_name,
            alert_tags: self.tags,
            raw_payload: Some(raw),
        }
    }
}

/// A log line from the telemetry backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

impl LogEntry {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// A trace span; `duration` is in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    #[serde(default, alias = "operation_name")]
    pub operation: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// A deployment of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
}

/// Telemetry gathered around an alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentContext {
    /// Most recent first, at most [`MAX_LOGS`].
    pub logs: Vec<LogEntry>,
    /// At most [`MAX_TRACES`].
    pub traces: Vec<TraceSpan>,
    pub metrics: Map<String, Value>,
    pub recent_deployments: Vec<Deployment>,
    /// Percentage of error-status log entries.
    pub error_rate: Option<f64>,
    /// Milliseconds.
    pub latency_p95: Option<f64>,
}

/// How sure the analysis is of itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Parse a label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The analysis of record for one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentAnalysis {
    #[serde(default)]
    pub incident_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub service_name: String,
    pub summary: String,
    pub root_cause: String,
    pub recent_changes: String,
    pub recommended_actions: Vec<String>,
    pub confidence: Confidence,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub raw_analysis: Option<String>,
}
