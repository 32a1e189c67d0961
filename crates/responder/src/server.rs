//! HTTP server for the incident responder.
//!
//! Provides REST API endpoints for:
//! - Health checks
//! - Receiving Datadog monitor webhooks
//! - Analyzing alerts submitted directly
//! - Listing stored incidents

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ResponderError;
use crate::models::{AlertRequest, DatadogWebhook, IncidentAnalysis, Severity};
use crate::orchestrator::AnalysisOrchestrator;
use crate::store::{IncidentFilter, StoredIncident, DEFAULT_LIST_LIMIT};

/// Name reported by the root endpoint.
pub const SERVICE_NAME: &str = "AI Incident Responder";

/// Server state shared across handlers.
pub struct ServerState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

impl ServerState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the router with all endpoints.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/webhook/datadog", post(datadog_webhook_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/incidents", get(list_incidents_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until it is stopped.
pub async fn run_server(state: Arc<ServerState>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Incident responder listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ServiceInfo {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Response status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Analysis produced
    Success,
    /// Alert ignored
    Skipped,
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    status: ResponseStatus,
    incident_id: Option<String>,
    analysis: IncidentAnalysis,
}

#[derive(Debug, Serialize)]
struct SkippedResponse {
    status: ResponseStatus,
    reason: String,
}

#[derive(Debug, Serialize)]
struct IncidentsResponse {
    status: ResponseStatus,
    incidents: Vec<StoredIncident>,
}

/// Query parameters for `GET /api/incidents`.
#[derive(Debug, Default, Deserialize)]
pub struct IncidentQuery {
    pub service: Option<String>,
    pub severity: Option<String>,
    /// Full-text search terms
    pub q: Option<String>,
    pub limit: Option<usize>,
}

impl IncidentQuery {
    fn into_filter(self) -> Result<(IncidentFilter, usize), ResponderError> {
        let severity = self
            .severity
            .as_deref()
            .map(|label| {
                Severity::from_label(label)
                    .ok_or_else(|| ResponderError::InvalidPayload(format!("unknown severity: {label}")))
            })
            .transpose()?;

        let limit = self
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(DEFAULT_LIST_LIMIT);

        let filter = IncidentFilter {
            service: self.service.filter(|s| !s.trim().is_empty()),
            severity,
            text: self.q.filter(|q| !q.trim().is_empty()),
        };

        Ok((filter, limit))
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

/// Datadog monitor webhook. Only triggered alerts are analyzed.
async fn datadog_webhook_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<Value>,
) -> Result<axum::response::Response, ResponderError> {
    let webhook: DatadogWebhook = serde_json::from_value(payload.clone())
        .map_err(|e| ResponderError::InvalidPayload(e.to_string()))?;

    info!(title = %webhook.title, "Received Datadog webhook");

    if !webhook.is_triggered() {
        info!(alert_status = %webhook.alert_status, "Alert not triggered, skipping analysis");
        return Ok(Json(SkippedResponse {
            status: ResponseStatus::Skipped,
            reason: format!("Alert status: {}", webhook.alert_status),
        })
        .into_response());
    }

    let analysis = run_pipeline(&state, webhook.into_alert(payload)).await?;
    Ok(analysis_response(analysis).into_response())
}

/// Analyze an alert submitted directly.
async fn analyze_handler(
    State(state): State<Arc<ServerState>>,
    Json(alert): Json<AlertRequest>,
) -> Result<impl IntoResponse, ResponderError> {
    let analysis = run_pipeline(&state, alert).await?;
    Ok(analysis_response(analysis))
}

async fn list_incidents_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<IncidentQuery>,
) -> Result<impl IntoResponse, ResponderError> {
    let (filter, limit) = query.into_filter()?;
    let store = state.orchestrator.store();

    let incidents = store.find(&filter, limit).await.unwrap_or_else(|e| {
        error!(store = store.name(), error = %e, "Failed to fetch incidents");
        vec![]
    });

    Ok(Json(IncidentsResponse {
        status: ResponseStatus::Success,
        incidents,
    }))
}

/// Run the pipeline on its own task so that a panic surfaces as a 500.
async fn run_pipeline(
    state: &ServerState,
    alert: AlertRequest,
) -> Result<IncidentAnalysis, ResponderError> {
    let orchestrator = Arc::clone(&state.orchestrator);

    tokio::spawn(async move { orchestrator.process(&alert).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Incident pipeline failed");
            ResponderError::Unexpected(format!("Error processing incident: {e}"))
        })
}

fn analysis_response(analysis: IncidentAnalysis) -> Json<AnalysisResponse> {
    Json(AnalysisResponse {
        status: ResponseStatus::Success,
        incident_id: analysis.incident_id.clone(),
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_limit_is_capped() {
        let query = IncidentQuery {
            limit: Some(500),
            ..IncidentQuery::default()
        };
        let (filter, limit) = query.into_filter().unwrap();
        assert_eq!(limit, DEFAULT_LIST_LIMIT);
        assert_eq!(filter, IncidentFilter::default());
    }

    #[test]
    fn test_query_parses_severity() {
        let query = IncidentQuery {
            severity: Some("Critical".to_string()),
            q: Some("  ".to_string()),
            ..IncidentQuery::default()
        };
        let (filter, _) = query.into_filter().unwrap();
        assert_eq!(filter.severity, Some(Severity::Critical));
        assert_eq!(filter.text, None);
    }

    #[test]
    fn test_query_rejects_unknown_severity() {
        let query = IncidentQuery {
            severity: Some("sev1".to_string()),
            ..IncidentQuery::default()
        };
        assert!(matches!(
            query.into_filter(),
            Err(ResponderError::InvalidPayload(_))
        ));
    }
}
