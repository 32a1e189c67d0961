//! Slack webhook notification channel.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::IncidentEvent;
use crate::NotifyChannel;

/// Slack webhook notification channel.
pub struct SlackChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Create a Slack channel. A `None` webhook URL yields a disabled channel.
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let webhook_url = webhook_url.filter(|url| !url.trim().is_empty());

        if webhook_url.is_some() {
            debug!("Slack notifications enabled");
        } else {
            debug!("Slack notifications disabled (no webhook URL)");
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }

    /// Format an event as a Slack webhook payload.
    fn format_payload(event: &IncidentEvent) -> SlackPayload {
        let severity = event
            .severity
            .map_or("UNKNOWN", |severity| severity.as_str());

        let blocks = vec![
            SlackBlock::Header {
                text: SlackText::plain(event.title()),
            },
            SlackBlock::Section {
                text: None,
                fields: vec![
                    SlackText::markdown(format!("*Incident ID:*\n`{}`", event.incident_id)),
                    SlackText::markdown(format!("*Severity:*\n{severity}")),
                    SlackText::markdown(format!(
                        "*Confidence:*\n{}",
                        event.confidence.to_uppercase()
                    )),
                    SlackText::markdown(format!("*Time:*\n{}", event.timestamp.to_rfc3339())),
                ],
            },
            SlackBlock::Divider,
            SlackBlock::section(format!("*Summary:*\n{}", event.summary)),
            SlackBlock::section(format!("*Root Cause:*\n{}", event.root_cause)),
            SlackBlock::section(format!("*Recent Changes:*\n{}", event.recent_changes)),
            SlackBlock::Divider,
            SlackBlock::section(format!(
                "*Recommended Actions:*\n{}",
                event.actions_text()
            )),
        ];

        SlackPayload {
            text: format!("🚨 Incident Detected: {}", event.service_name),
            attachments: vec![SlackAttachment {
                fallback: event.title(),
                color: event.effective_severity().color().to_string(),
                blocks,
            }],
        }
    }
}

#[async_trait]
impl NotifyChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, event: &IncidentEvent) -> Result<(), ChannelError> {
        let webhook_url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("SLACK_WEBHOOK_URL".to_string()))?;

        let payload = Self::format_payload(event);

        debug!(
            channel = "slack",
            incident_id = %event.incident_id,
            "Sending notification"
        );

        let response = self.client.post(webhook_url).json(&payload).send().await?;

        if response.status().is_success() {
            debug!(channel = "slack", "Notification sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "slack",
                status = %status,
                body = %body,
                "Slack webhook request failed"
            );

            Err(ChannelError::Rejected {
                channel: "slack",
                status: status.as_u16(),
                body,
            })
        }
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SlackPayload {
    text: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    blocks: Vec<SlackBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackBlock {
    Header {
        text: SlackText,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<SlackText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<SlackText>,
    },
    Divider,
}

impl SlackBlock {
    fn section(text: String) -> Self {
        Self::Section {
            text: Some(SlackText::markdown(text)),
            fields: vec![],
        }
    }
}

#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    emoji: Option<bool>,
}

impl SlackText {
    fn plain(text: String) -> Self {
        Self {
            kind: "plain_text",
            text,
            emoji: Some(true),
        }
    }

    fn markdown(text: String) -> Self {
        Self {
            kind: "mrkdwn",
            text,
            emoji: None,
        }
    }
}
