//! Delivery of finished analyses to people.

use async_trait::async_trait;
use chrono::Utc;
use notify::{IncidentEvent, Notifier};

use crate::models::IncidentAnalysis;

/// Best-effort delivery of analyses.
#[async_trait]
pub trait IncidentNotifier: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Deliver `analysis`; `true` iff it was accepted. Never fails the caller.
    async fn notify(&self, analysis: &IncidentAnalysis) -> bool;
}

/// Flatten an analysis into the event shape the channels render.
pub fn to_event(analysis: &IncidentAnalysis) -> IncidentEvent {
    IncidentEvent {
        incident_id: analysis.incident_id.clone().unwrap_or_default(),
        service_name: analysis.service_name.clone(),
        severity: analysis.severity,
        confidence: analysis.confidence.as_str().to_string(),
        summary: analysis.summary.clone(),
        root_cause: analysis.root_cause.clone(),
        recent_changes: analysis.recent_changes.clone(),
        recommended_actions: analysis.recommended_actions.clone(),
        timestamp: analysis.timestamp.unwrap_or_else(Utc::now),
    }
}

#[async_trait]
impl IncidentNotifier for Notifier {
    fn is_configured(&self) -> bool {
        Notifier::is_configured(self)
    }

    async fn notify(&self, analysis: &IncidentAnalysis) -> bool {
        Notifier::notify(self, &to_event(analysis)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Severity};

    #[test]
    fn test_to_event() {
        let analysis = IncidentAnalysis {
            incident_id: Some("inc_20250101_120000".to_string()),
            timestamp: None,
            service_name: "api".to_string(),
            summary: "s".to_string(),
            root_cause: "r".to_string(),
            recent_changes: "c".to_string(),
            recommended_actions: vec!["a".to_string()],
            confidence: Confidence::High,
            severity: Some(Severity::Critical),
            raw_analysis: Some("raw".to_string()),
        };

        let event = to_event(&analysis);
        assert_eq!(event.incident_id, "inc_20250101_120000");
        assert_eq!(event.confidence, "high");
        assert_eq!(event.severity, Some(Severity::Critical));
        assert_eq!(event.recommended_actions, vec!["a"]);
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_unconfigured() {
        let notifier = Notifier::disabled();
        assert!(!IncidentNotifier::is_configured(&notifier));
    }
}
