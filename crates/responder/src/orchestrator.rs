//! The incident analysis pipeline.
//!
//! collect context → render prompt → call the model → parse → stamp →
//! persist → notify. Every stage has a degraded outcome, so [`process`]
//! always returns an analysis.
//!
//! [`process`]: AnalysisOrchestrator::process

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::context::{ContextCollector, ContextOutcome};
use crate::error::ModelError;
use crate::llm::LanguageModel;
use crate::models::{AlertRequest, Confidence, IncidentAnalysis, IncidentContext, Severity};
use crate::notifier::IncidentNotifier;
use crate::parser::{AnalysisParser, ParsePath};
use crate::prompt::PromptBuilder;
use crate::store::IncidentStore;

/// Minutes of telemetry collected before an alert.
pub const DEFAULT_WINDOW_MINUTES: u32 = 15;

/// Default time budget for the model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of the analysis stage.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// Parsed from model output
    Model {
        analysis: IncidentAnalysis,
        path: ParsePath,
    },
    /// Fixed demo analysis, with the reason the model was not used
    Mock {
        analysis: IncidentAnalysis,
        reason: String,
    },
}

impl AnalysisOutcome {
    pub fn into_analysis(self) -> IncidentAnalysis {
        match self {
            Self::Model { analysis, .. } | Self::Mock { analysis, .. } => analysis,
        }
    }
}

/// Runs alerts through the analysis pipeline.
pub struct AnalysisOrchestrator {
    collector: ContextCollector,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn IncidentStore>,
    notifier: Arc<dyn IncidentNotifier>,
    window_minutes: u32,
    model_timeout: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(
        collector: ContextCollector,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn IncidentStore>,
        notifier: Arc<dyn IncidentNotifier>,
    ) -> Self {
        Self {
            collector,
            model,
            store,
            notifier,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_window_minutes(mut self, minutes: u32) -> Self {
        self.window_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.store
    }

    /// Analyze an alert. Never fails: degraded stages fall back to synthetic
    /// context or a mock analysis.
    pub async fn process(&self, alert: &AlertRequest) -> IncidentAnalysis {
        let service = alert.service();
        info!(service, alert = %alert.alert_title, "Processing incident");

        let context = self
            .collector
            .collect(service, &alert.alert_title, self.window_minutes)
            .await;
        if let ContextOutcome::Synthetic { reason, .. } = &context {
            info!(service, reason = %reason, "Analyzing with synthetic context");
        }

        let mut analysis = match self.analyze(alert, service, context.context()).await {
            AnalysisOutcome::Model { analysis, path } => {
                debug!(service, ?path, "Model analysis parsed");
                analysis
            }
            AnalysisOutcome::Mock { analysis, reason } => {
                warn!(service, reason = %reason, "Using mock analysis");
                analysis
            }
        };

        stamp(&mut analysis, service, Utc::now());
        self.persist(&analysis).await;
        self.notify(&analysis).await;

        info!(
            incident_id = analysis.incident_id.as_deref().unwrap_or_default(),
            service,
            "Incident analysis complete"
        );
        analysis
    }

    /// Render the prompt, call the model and parse its answer.
    pub async fn analyze(
        &self,
        alert: &AlertRequest,
        service: &str,
        context: &IncidentContext,
    ) -> AnalysisOutcome {
        let prompt =
            PromptBuilder::build(&alert.alert_title, &alert.alert_message, service, context);

        if !self.model.is_configured() {
            return AnalysisOutcome::Mock {
                analysis: mock_analysis(service, "language model not configured"),
                reason: "language model not configured".to_string(),
            };
        }

        info!(model = self.model.name(), "Requesting analysis");
        let response = tokio::time::timeout(self.model_timeout, self.model.generate(&prompt))
            .await
            .unwrap_or_else(|_| Err(ModelError::Timeout(self.model_timeout.as_secs())));

        match response {
            Ok(text) => {
                let (analysis, path) = AnalysisParser::parse_detailed(&text, service);
                AnalysisOutcome::Model { analysis, path }
            }
            Err(e) => {
                error!(model = self.model.name(), error = %e, "Language model call failed");
                let reason = format!("language model call failed: {e}");
                AnalysisOutcome::Mock {
                    analysis: mock_analysis(service, &reason),
                    reason,
                }
            }
        }
    }

    async fn persist(&self, analysis: &IncidentAnalysis) {
        if let Err(e) = self.store.upsert(analysis).await {
            error!(
                store = self.store.name(),
                incident_id = analysis.incident_id.as_deref().unwrap_or_default(),
                error = %e,
                "Failed to save incident"
            );
        }
    }

    async fn notify(&self, analysis: &IncidentAnalysis) {
        if !self.notifier.is_configured() {
            debug!("Notifications not configured, skipping");
            return;
        }

        if !self.notifier.notify(analysis).await {
            warn!(
                incident_id = analysis.incident_id.as_deref().unwrap_or_default(),
                "Incident notification was not delivered"
            );
        }
    }
}

/// Incident identifier for an analysis stamped at `now`.
///
/// Second resolution: two incidents stamped within the same second share an
/// identifier, and the later one replaces the earlier in the store.
pub fn incident_id_at(now: DateTime<Utc>) -> String {
    format!("inc_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Assign identity, time and service to a parsed analysis.
pub fn stamp(analysis: &mut IncidentAnalysis, service: &str, now: DateTime<Utc>) {
    analysis.incident_id = Some(incident_id_at(now));
    analysis.timestamp = Some(now);
    analysis.service_name = service.to_string();
    analysis.severity.get_or_insert(Severity::Medium);
}

/// Demo analysis of a database connection pool exhaustion.
pub fn mock_analysis(service: &str, reason: &str) -> IncidentAnalysis {
    IncidentAnalysis {
        incident_id: None,
        timestamp: None,
        service_name: service.to_string(),
        summary: format!(
            "High error rate detected in {service}. Database connection pool appears to be \
             exhausted, causing timeouts and failed requests."
        ),
        root_cause: "Database connection pool exhaustion likely caused by deployment v1.4.2 \
                     which introduced a connection leak. The pool size may be insufficient \
                     for current load."
            .to_string(),
        recent_changes: "Deployment v1.4.2 was deployed 30 minutes ago. This deployment \
                         included changes to database connection handling."
            .to_string(),
        recommended_actions: vec![
            "1. Check database connection pool metrics and current pool usage".to_string(),
            "2. Review deployment v1.4.2 changes related to database connections".to_string(),
            "3. Consider temporarily increasing connection pool size".to_string(),
            "4. Look for connection leaks in the recent code changes".to_string(),
            "5. Monitor error rate after applying fixes".to_string(),
        ],
        confidence: Confidence::High,
        severity: Some(Severity::High),
        raw_analysis: Some(format!("Mock analysis - {reason}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use mockall::{mock, predicate};

    use crate::error::StoreError;
    use crate::store::{IncidentFilter, StoredIncident};
    use crate::telemetry::{DatadogClient, DatadogConfig, StaticDeploymentTracker};

    mock! {
        Store {}

        #[async_trait]
        impl IncidentStore for Store {
            fn name(&self) -> &'static str;
            async fn upsert(&self, analysis: &IncidentAnalysis) -> Result<(), StoreError>;
            async fn find(
                &self,
                filter: &IncidentFilter,
                limit: usize,
            ) -> Result<Vec<StoredIncident>, StoreError>;
        }
    }

    mock! {
        Notify {}

        #[async_trait]
        impl IncidentNotifier for Notify {
            fn is_configured(&self) -> bool;
            async fn notify(&self, analysis: &IncidentAnalysis) -> bool;
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl LanguageModel for Unconfigured {
        fn name(&self) -> &str {
            "unconfigured"
        }

        fn is_configured(&self) -> bool {
            false
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Err(ModelError::NotConfigured("GEMINI_API_KEY"))
        }
    }

    fn orchestrator(store: MockStore, notifier: MockNotify) -> AnalysisOrchestrator {
        let collector = ContextCollector::new(
            Arc::new(DatadogClient::new(DatadogConfig::default()).unwrap()),
            Arc::new(StaticDeploymentTracker::default()),
            Duration::from_secs(1),
        );
        AnalysisOrchestrator::new(
            collector,
            Arc::new(Unconfigured),
            Arc::new(store),
            Arc::new(notifier),
        )
    }

    fn alert() -> AlertRequest {
        AlertRequest {
            alert_title: "High Error Rate".to_string(),
            alert_message: "5xx above 5%".to_string(),
            service_name: "api-service".to_string(),
            alert_tags: vec![],
            raw_payload: None,
        }
    }

    #[tokio::test]
    async fn test_store_failure_still_notifies() {
        let mut store = MockStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_upsert()
            .times(1)
            .returning(|_| Err(StoreError::LockPoisoned));

        let mut notifier = MockNotify::new();
        notifier.expect_is_configured().return_const(true);
        notifier
            .expect_notify()
            .with(predicate::function(|a: &IncidentAnalysis| {
                a.service_name == "api-service" && a.incident_id.is_some()
            }))
            .times(1)
            .return_const(true);

        let analysis = orchestrator(store, notifier).process(&alert()).await;
        assert_eq!(analysis.service_name, "api-service");
    }

    #[tokio::test]
    async fn test_unconfigured_notifier_is_not_called() {
        let mut store = MockStore::new();
        store.expect_upsert().times(1).returning(|_| Ok(()));

        let mut notifier = MockNotify::new();
        notifier.expect_is_configured().return_const(false);
        notifier.expect_notify().never();

        orchestrator(store, notifier).process(&alert()).await;
    }

    #[test]
    fn test_incident_id_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(incident_id_at(now), "inc_20250304_050607");
    }

    #[test]
    fn test_stamp_fills_metadata() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut analysis = mock_analysis("placeholder", "test");
        analysis.severity = None;

        stamp(&mut analysis, "api-service", now);

        assert_eq!(analysis.incident_id.as_deref(), Some("inc_20250101_000000"));
        assert_eq!(analysis.timestamp, Some(now));
        assert_eq!(analysis.service_name, "api-service");
        assert_eq!(analysis.severity, Some(Severity::Medium));
    }

    #[test]
    fn test_mock_analysis() {
        let analysis = mock_analysis("api-service", "language model not configured");

        assert!(analysis.summary.contains("api-service"));
        assert_eq!(analysis.recommended_actions.len(), 5);
        assert_eq!(analysis.confidence, Confidence::High);
        assert_eq!(analysis.severity, Some(Severity::High));
        assert_eq!(
            analysis.raw_analysis.as_deref(),
            Some("Mock analysis - language model not configured")
        );
    }
}
