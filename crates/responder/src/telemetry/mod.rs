//! Telemetry sources: logs, traces, metrics and deployment history.

pub mod datadog;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{Map, Value};

use crate::error::TelemetryError;
use crate::models::{Deployment, LogEntry, TraceSpan};

pub use datadog::{DatadogClient, DatadogConfig};

/// The half-open interval `[start, end)` a context is collected over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `minutes` leading up to `end`.
    pub fn ending_at(end: DateTime<Utc>, minutes: u32) -> Result<Self, TelemetryError> {
        if minutes == 0 {
            return Err(TelemetryError::InvalidWindow(minutes));
        }

        let start = end
            .checked_sub_signed(ChronoDuration::minutes(i64::from(minutes)))
            .ok_or(TelemetryError::InvalidWindow(minutes))?;

        Ok(Self { start, end })
    }

    /// The `minutes` leading up to now.
    pub fn last_minutes(minutes: u32) -> Result<Self, TelemetryError> {
        Self::ending_at(Utc::now(), minutes)
    }
}

/// A backend that serves logs, traces and metrics for a service.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether credentials are present. Unconfigured sources are never called.
    fn is_configured(&self) -> bool;

    /// Recent log entries, most recent first.
    async fn fetch_logs(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LogEntry>, TelemetryError>;

    async fn fetch_traces(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TraceSpan>, TelemetryError>;

    /// Raw metric query response.
    async fn fetch_metrics(
        &self,
        service: &str,
        window: &TimeWindow,
    ) -> Result<Map<String, Value>, TelemetryError>;
}

/// Source of deployment history.
#[async_trait]
pub trait DeploymentTracker: Send + Sync {
    /// Up to `limit` most recent deployments of `service`.
    async fn recent_deployments(
        &self,
        service: &str,
        limit: usize,
    ) -> Result<Vec<Deployment>, TelemetryError>;
}

/// Stand-in tracker reporting a single fixed deployment.
#[derive(Debug, Clone)]
pub struct StaticDeploymentTracker {
    version: String,
    age: ChronoDuration,
}

impl StaticDeploymentTracker {
    pub fn new(version: impl Into<String>, age: ChronoDuration) -> Self {
        Self {
            version: version.into(),
            age,
        }
    }
}

impl Default for StaticDeploymentTracker {
    fn default() -> Self {
        Self::new("v1.4.2", ChronoDuration::minutes(30))
    }
}

#[async_trait]
impl DeploymentTracker for StaticDeploymentTracker {
    async fn recent_deployments(
        &self,
        service: &str,
        limit: usize,
    ) -> Result<Vec<Deployment>, TelemetryError> {
        let deployment = Deployment {
            version: self.version.clone(),
            timestamp: Utc::now() - self.age,
            service: service.to_string(),
        };

        Ok(std::iter::once(deployment).take(limit).collect())
    }
}
