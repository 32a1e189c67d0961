//! Language model output parsing.
//!
//! Model text is first decoded as the JSON object the prompt asks for, after
//! stripping Markdown code fences. Text that does not decode goes through a
//! line-oriented scanner that picks sections out of prose. Both tiers fill
//! missing fields from the same defaults, and neither can fail.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{Confidence, IncidentAnalysis, Severity};

pub const DEFAULT_SUMMARY: &str = "Analysis unavailable";
pub const DEFAULT_ROOT_CAUSE: &str = "Root cause unknown";
pub const DEFAULT_RECENT_CHANGES: &str = "No recent changes identified";
pub const DEFAULT_ACTION: &str = "Review logs and metrics for more details";

/// Which tier produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    /// Decoded as JSON
    Strict,
    /// Scanned line by line
    Heuristic,
}

/// The JSON object requested from the model. Every field is optional.
#[derive(Debug, Default)]
struct RawAnalysis {
    summary: Option<String>,
    root_cause: Option<String>,
    recent_changes: Option<String>,
    recommended_actions: Option<Vec<String>>,
    confidence: Option<String>,
    severity: Option<String>,
}

impl RawAnalysis {
    /// Read the requested fields from a decoded object. A value of the wrong
    /// type counts as missing; a lone string stands for a one-item action list.
    fn from_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

        let recommended_actions = match object.get("recommended_actions") {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(Value::String(action)) => Some(vec![action.clone()]),
            _ => None,
        };

        Self {
            summary: text("summary"),
            root_cause: text("root_cause"),
            recent_changes: text("recent_changes"),
            recommended_actions,
            confidence: text("confidence"),
            severity: text("severity"),
        }
    }

    /// Fill defaults and produce an analysis carrying the untouched model text.
    fn finish(self, raw_text: &str, service_name: &str) -> IncidentAnalysis {
        let text_or = |value: Option<String>, default: &str| {
            value
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let mut recommended_actions: Vec<String> = self
            .recommended_actions
            .unwrap_or_default()
            .into_iter()
            .map(|action| action.trim().to_string())
            .filter(|action| !action.is_empty())
            .collect();
        if recommended_actions.is_empty() {
            recommended_actions.push(DEFAULT_ACTION.to_string());
        }

        IncidentAnalysis {
            incident_id: None,
            timestamp: None,
            service_name: service_name.to_string(),
            summary: text_or(self.summary, DEFAULT_SUMMARY),
            root_cause: text_or(self.root_cause, DEFAULT_ROOT_CAUSE),
            recent_changes: text_or(self.recent_changes, DEFAULT_RECENT_CHANGES),
            recommended_actions,
            confidence: self
                .confidence
                .as_deref()
                .and_then(Confidence::from_label)
                .unwrap_or_default(),
            severity: Some(
                self.severity
                    .as_deref()
                    .and_then(Severity::from_label)
                    .unwrap_or(Severity::Medium),
            ),
            raw_analysis: Some(raw_text.to_string()),
        }
    }
}

/// Converts model output into an [`IncidentAnalysis`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisParser;

impl AnalysisParser {
    pub fn parse(raw_text: &str, service_name: &str) -> IncidentAnalysis {
        Self::parse_detailed(raw_text, service_name).0
    }

    /// Parse and report which tier succeeded.
    pub fn parse_detailed(raw_text: &str, service_name: &str) -> (IncidentAnalysis, ParsePath) {
        match serde_json::from_str::<Value>(strip_code_fences(raw_text)) {
            Ok(Value::Object(object)) => {
                debug!("Parsed model output as JSON");
                (
                    RawAnalysis::from_object(&object).finish(raw_text, service_name),
                    ParsePath::Strict,
                )
            }
            Ok(_) => {
                warn!("Model output is JSON but not an object, scanning text");
                Self::scan(raw_text, service_name)
            }
            Err(e) => {
                warn!(error = %e, "Model output is not valid JSON, scanning text");
                Self::scan(raw_text, service_name)
            }
        }
    }

    fn scan(raw_text: &str, service_name: &str) -> (IncidentAnalysis, ParsePath) {
        (
            scan_sections(raw_text).finish(raw_text, service_name),
            ParsePath::Heuristic,
        )
    }
}

/// Trim and remove a leading ```` ```json ```` or ```` ``` ```` fence and a trailing ```` ``` ````.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    RootCause,
    RecentChanges,
    Actions,
}

/// Line scanner for prose responses.
///
/// A line containing a cue word selects the section that following lines
/// belong to and is itself consumed. Confidence and severity cues take their
/// value from the same line.
fn scan_sections(text: &str) -> RawAnalysis {
    let mut section = None;
    let mut summary = Vec::new();
    let mut root_cause = Vec::new();
    let mut recent_changes = Vec::new();
    let mut actions = Vec::new();
    let mut confidence = "medium";
    let mut severity = "medium";

    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        if lower.contains("summary") {
            section = Some(Section::Summary);
        } else if lower.contains("root cause") {
            section = Some(Section::RootCause);
        } else if lower.contains("recent changes") || lower.contains("what changed") {
            section = Some(Section::RecentChanges);
        } else if lower.contains("action") || lower.contains("recommend") {
            section = Some(Section::Actions);
        } else if lower.contains("confidence") {
            if lower.contains("low") {
                confidence = "low";
            } else if lower.contains("high") {
                confidence = "high";
            }
        } else if lower.contains("severity") {
            if lower.contains("critical") {
                severity = "critical";
            } else if lower.contains("high") {
                severity = "high";
            } else if lower.contains("low") {
                severity = "low";
            }
        } else if !trimmed.is_empty() {
            match section {
                Some(Section::Summary) => summary.push(trimmed),
                Some(Section::RootCause) => root_cause.push(trimmed),
                Some(Section::RecentChanges) => recent_changes.push(trimmed),
                Some(Section::Actions) => {
                    if let Some(action) = strip_bullet(trimmed) {
                        actions.push(action.to_string());
                    }
                }
                None => {}
            }
        }
    }

    let joined = |parts: Vec<&str>| Some(parts.join(" ")).filter(|text| !text.is_empty());

    RawAnalysis {
        summary: joined(summary),
        root_cause: joined(root_cause),
        recent_changes: joined(recent_changes),
        recommended_actions: Some(actions),
        confidence: Some(confidence.to_string()),
        severity: Some(severity.to_string()),
    }
}

/// Text of a bulleted line, or `None` if the line is not a non-empty bullet.
fn strip_bullet(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('•'))
        .or_else(|| line.strip_prefix("* "))?;
    let rest = rest.trim_start_matches(['-', ' ']).trim();
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let raw = "```json\n{\"summary\":\"x\",\"root_cause\":\"y\",\"recent_changes\":\"z\",\"recommended_actions\":[\"a\"],\"confidence\":\"high\",\"severity\":\"critical\"}\n```";
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "api");

        assert_eq!(path, ParsePath::Strict);
        assert_eq!(analysis.summary, "x");
        assert_eq!(analysis.root_cause, "y");
        assert_eq!(analysis.recent_changes, "z");
        assert_eq!(analysis.recommended_actions, vec!["a"]);
        assert_eq!(analysis.confidence, Confidence::High);
        assert_eq!(analysis.severity, Some(Severity::Critical));
        assert_eq!(analysis.raw_analysis.as_deref(), Some(raw));
        assert_eq!(analysis.service_name, "api");
    }

    #[test]
    fn test_bare_fence_and_whitespace() {
        let raw = "  ```\n{\"summary\":\"only\"}\n```  ";
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "api");

        assert_eq!(path, ParsePath::Strict);
        assert_eq!(analysis.summary, "only");
    }

    #[test]
    fn test_strict_defaults() {
        let analysis = AnalysisParser::parse("{}", "api");

        assert_eq!(analysis.summary, DEFAULT_SUMMARY);
        assert_eq!(analysis.root_cause, DEFAULT_ROOT_CAUSE);
        assert_eq!(analysis.recent_changes, DEFAULT_RECENT_CHANGES);
        assert_eq!(analysis.recommended_actions, vec![DEFAULT_ACTION]);
        assert_eq!(analysis.confidence, Confidence::Medium);
        assert_eq!(analysis.severity, Some(Severity::Medium));
    }

    #[test]
    fn test_unknown_labels_normalize_to_medium() {
        let analysis = AnalysisParser::parse(r#"{"confidence":"certain","severity":"sev1"}"#, "api");
        assert_eq!(analysis.confidence, Confidence::Medium);
        assert_eq!(analysis.severity, Some(Severity::Medium));
    }

    #[test]
    fn test_prose_confidence_line() {
        let raw = "The service looks unhealthy.\nConfidence: high";
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "api");

        assert_eq!(path, ParsePath::Heuristic);
        assert_eq!(analysis.confidence, Confidence::High);
        assert_eq!(analysis.raw_analysis.as_deref(), Some(raw));
    }

    #[test]
    fn test_prose_sections() {
        let raw = "\
Summary:
Checkout is failing.
Requests time out.

Root Cause:
Connection pool exhausted.

What changed:
v1.4.2 rolled out.

Recommended Actions:
- Roll back v1.4.2
• Raise the pool size
* Watch the error rate
-
not a bullet
Severity: Critical
";
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "checkout");

        assert_eq!(path, ParsePath::Heuristic);
        assert_eq!(analysis.summary, "Checkout is failing. Requests time out.");
        assert_eq!(analysis.root_cause, "Connection pool exhausted.");
        assert_eq!(analysis.recent_changes, "v1.4.2 rolled out.");
        assert_eq!(
            analysis.recommended_actions,
            vec!["Roll back v1.4.2", "Raise the pool size", "Watch the error rate"]
        );
        assert_eq!(analysis.severity, Some(Severity::Critical));
        assert_eq!(analysis.confidence, Confidence::Medium);
    }

    #[test]
    fn test_tiers_share_defaults() {
        let strict = AnalysisParser::parse("{}", "api");
        let heuristic = AnalysisParser::parse("nothing useful here", "api");

        assert_eq!(strict.summary, heuristic.summary);
        assert_eq!(strict.root_cause, heuristic.root_cause);
        assert_eq!(strict.recent_changes, heuristic.recent_changes);
        assert_eq!(strict.recommended_actions, heuristic.recommended_actions);
        assert_eq!(strict.confidence, heuristic.confidence);
        assert_eq!(strict.severity, heuristic.severity);
    }

    #[test]
    fn test_non_object_json_falls_back() {
        let (analysis, path) = AnalysisParser::parse_detailed("[1, 2, 3]", "api");
        assert_eq!(path, ParsePath::Heuristic);
        assert_eq!(analysis.recommended_actions, vec![DEFAULT_ACTION]);
    }

    #[test]
    fn test_wrongly_typed_fields_keep_decoded_object() {
        let raw = r#"{
  "summary": "Pool exhausted",
  "root_cause": "Leak in v1.4.2",
  "recent_changes": "v1.4.2",
  "recommended_actions": "Roll back v1.4.2",
  "confidence": 0.9,
  "severity": "high"
}"#;
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "api");

        assert_eq!(path, ParsePath::Strict);
        assert_eq!(analysis.summary, "Pool exhausted");
        assert_eq!(analysis.root_cause, "Leak in v1.4.2");
        assert_eq!(analysis.recent_changes, "v1.4.2");
        assert_eq!(analysis.recommended_actions, vec!["Roll back v1.4.2"]);
        assert_eq!(analysis.confidence, Confidence::Medium);
        assert_eq!(analysis.severity, Some(Severity::High));
    }

    #[test]
    fn test_non_string_values_take_defaults() {
        let raw = r#"{"summary": 42, "root_cause": null, "recommended_actions": [1, "Restart pods", {}]}"#;
        let (analysis, path) = AnalysisParser::parse_detailed(raw, "api");

        assert_eq!(path, ParsePath::Strict);
        assert_eq!(analysis.summary, DEFAULT_SUMMARY);
        assert_eq!(analysis.root_cause, DEFAULT_ROOT_CAUSE);
        assert_eq!(analysis.recommended_actions, vec!["Restart pods"]);
    }

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("- do it"), Some("do it"));
        assert_eq!(strip_bullet("-- twice"), Some("twice"));
        assert_eq!(strip_bullet("•"), None);
        assert_eq!(strip_bullet("*emphasis*"), None);
        assert_eq!(strip_bullet("1. numbered"), None);
    }
}
