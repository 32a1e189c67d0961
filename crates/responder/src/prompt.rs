//! Prompt rendering for incident analysis.
//!
//! Rendering is deterministic: the same alert and context always produce the
//! same prompt. At most [`PROMPT_LOGS`] logs and [`PROMPT_TRACES`] traces are
//! included; every deployment is.

use crate::models::IncidentContext;

/// Log entries rendered into the prompt.
pub const PROMPT_LOGS: usize = 10;

/// Trace spans rendered into the prompt.
pub const PROMPT_TRACES: usize = 10;

const RESPONSE_FORMAT: &str = r#"Please provide your analysis in the following JSON format:

{
  "summary": "A brief 2-3 sentence summary of what is likely going wrong",
  "root_cause": "Your assessment of the most likely root cause based on the evidence",
  "recent_changes": "What changed recently that might have caused this (deployments, config changes, etc.)",
  "recommended_actions": [
    "Action 1: Specific, actionable step",
    "Action 2: Another specific step",
    "Action 3: Additional step if needed"
  ],
  "confidence": "low|medium|high",
  "severity": "low|medium|high|critical"
}

Be specific, actionable, and base your analysis on the evidence provided. If you're uncertain, indicate low confidence."#;

/// Renders alerts and their context into a language model prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(
        alert_title: &str,
        alert_message: &str,
        service_name: &str,
        context: &IncidentContext,
    ) -> String {
        let error_rate = context
            .error_rate
            .map_or_else(|| "N/A".to_string(), |rate| format!("{rate}%"));
        let latency = context
            .latency_p95
            .map_or_else(|| "N/A".to_string(), |p95| format!("{p95}ms"));

        format!(
            "You are an expert Site Reliability Engineer (SRE) with deep experience in production incident analysis.

Given the following incident context, provide a structured analysis:

## Alert Information
- **Title**: {alert_title}
- **Message**: {alert_message}
- **Service**: {service_name}
- **Error Rate**: {error_rate} (if available)
- **P95 Latency**: {latency} (if available)

## Recent Error Logs
{logs}

## Recent Traces
{traces}

## Recent Deployments
{deployments}

## Metrics Summary
{metrics}

---

{RESPONSE_FORMAT}",
            logs = Self::logs(context),
            traces = Self::traces(context),
            deployments = Self::deployments(context),
            metrics = Self::metrics(context),
        )
    }

    fn logs(context: &IncidentContext) -> String {
        if context.logs.is_empty() {
            return "No recent error logs found.".to_string();
        }

        context
            .logs
            .iter()
            .take(PROMPT_LOGS)
            .map(|log| {
                format!(
                    "- {} [{}]",
                    log.message.as_deref().unwrap_or("N/A"),
                    log.timestamp.as_deref().unwrap_or("N/A")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn traces(context: &IncidentContext) -> String {
        if context.traces.is_empty() {
            return "No recent traces found.".to_string();
        }

        context
            .traces
            .iter()
            .take(PROMPT_TRACES)
            .map(|span| {
                format!(
                    "- {}: {}ms [{}]",
                    span.operation.as_deref().unwrap_or("N/A"),
                    span.duration.unwrap_or(0.0),
                    span.status.as_deref().unwrap_or("N/A")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn deployments(context: &IncidentContext) -> String {
        if context.recent_deployments.is_empty() {
            return "No recent deployments found.".to_string();
        }

        context
            .recent_deployments
            .iter()
            .map(|deploy| {
                format!(
                    "- {} deployed at {}",
                    deploy.version,
                    deploy.timestamp.to_rfc3339()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn metrics(context: &IncidentContext) -> String {
        if context.metrics.is_empty() {
            return "No metrics available".to_string();
        }

        serde_json::to_string_pretty(&context.metrics)
            .unwrap_or_else(|_| "No metrics available".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::synthetic_context;
    use crate::models::{LogEntry, TraceSpan};

    #[test]
    fn test_empty_context_placeholders() {
        let prompt = PromptBuilder::build("Title", "Msg", "api", &IncidentContext::default());

        assert!(prompt.contains("- **Error Rate**: N/A (if available)"));
        assert!(prompt.contains("- **P95 Latency**: N/A (if available)"));
        assert!(prompt.contains("No recent error logs found."));
        assert!(prompt.contains("No recent traces found."));
        assert!(prompt.contains("No recent deployments found."));
        assert!(prompt.contains("No metrics available"));
    }

    #[test]
    fn test_renders_context() {
        let prompt = PromptBuilder::build(
            "High Error Rate",
            "5xx above threshold",
            "api-service",
            &synthetic_context("api-service"),
        );

        assert!(prompt.contains("- **Title**: High Error Rate"));
        assert!(prompt.contains("- **Error Rate**: 15.5% (if available)"));
        assert!(prompt.contains("- **P95 Latency**: 2500ms (if available)"));
        assert!(prompt.contains("- database.query: 5000ms [error]"));
        assert!(prompt.contains("- v1.4.2 deployed at "));
        assert!(prompt.contains("\"error_rate\": 15.5"));
        assert!(prompt.contains("\"severity\": \"low|medium|high|critical\""));
    }

    #[test]
    fn test_truncates_logs_and_traces() {
        let context = IncidentContext {
            logs: (0..15)
                .map(|i| LogEntry {
                    message: Some(format!("log-{i:02}")),
                    ..LogEntry::default()
                })
                .collect(),
            traces: (0..15)
                .map(|i| TraceSpan {
                    operation: Some(format!("op-{i:02}")),
                    ..TraceSpan::default()
                })
                .collect(),
            ..IncidentContext::default()
        };

        let prompt = PromptBuilder::build("t", "m", "s", &context);

        assert!(prompt.contains("- log-09 [N/A]"));
        assert!(!prompt.contains("log-10"));
        assert!(prompt.contains("- op-09: 0ms [N/A]"));
        assert!(!prompt.contains("op-10"));
    }

    #[test]
    fn test_deterministic() {
        let context = synthetic_context("svc");
        assert_eq!(
            PromptBuilder::build("a", "b", "svc", &context),
            PromptBuilder::build("a", "b", "svc", &context)
        );
    }
}
