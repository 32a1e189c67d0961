//! Notification event types for incident analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels carried by an incident notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Get the attachment color for this severity.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Critical => "#FF0000", // Red
            Self::High => "#FF9900",     // Orange
            Self::Medium => "#FFCC00",   // Yellow
            Self::Low => "#36A64F",      // Green
        }
    }

    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse a label such as `"High"` or `" critical "`, ignoring case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A completed incident analysis, flattened for delivery to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub incident_id: String,
    pub service_name: String,
    pub severity: Option<Severity>,
    pub confidence: String,
    pub summary: String,
    pub root_cause: String,
    pub recent_changes: String,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl IncidentEvent {
    /// Get a short title for this event.
    #[must_use]
    pub fn title(&self) -> String {
        format!("🚨 Incident: {}", self.service_name)
    }

    /// Severity used for coloring; unknown severities render as medium.
    #[must_use]
    pub fn effective_severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Medium)
    }

    /// Recommended actions rendered as a bulleted list.
    #[must_use]
    pub fn actions_text(&self) -> String {
        self.recommended_actions
            .iter()
            .map(|action| format!("• {action}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_label() {
        assert_eq!(Severity::from_label(" Critical "), Some(Severity::Critical));
        assert_eq!(Severity::from_label("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_label("sev1"), None);
    }

    #[test]
    fn test_actions_text() {
        let event = IncidentEvent {
            incident_id: "inc_1".to_string(),
            service_name: "svc".to_string(),
            severity: None,
            confidence: "low".to_string(),
            summary: String::new(),
            root_cause: String::new(),
            recent_changes: String::new(),
            recommended_actions: vec!["a".to_string(), "b".to_string()],
            timestamp: Utc::now(),
        };
        assert_eq!(event.actions_text(), "• a\n• b");
        assert_eq!(event.effective_severity(), Severity::Medium);
    }
}
