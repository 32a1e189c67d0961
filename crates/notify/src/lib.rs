//! Notification system for incident analyses.
//!
//! Completed incident analyses are delivered to messaging platforms on a
//! best-effort basis: channel failures are logged and reported back as a
//! boolean, never raised to the caller.
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), notify::ChannelError> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use notify::{IncidentEvent, Notifier, NotifyChannel, Severity, SlackChannel};
//!
//! let slack = SlackChannel::new(
//!     Some("https://hooks.slack.com/services/T000/B000/XXX".to_string()),
//!     Duration::from_secs(10),
//! )?;
//! let slack: Arc<dyn NotifyChannel> = Arc::new(slack);
//! let notifier = Notifier::with_channels(vec![slack]);
//!
//! let delivered = notifier
//!     .notify(&IncidentEvent {
//!         incident_id: "inc_20250101_120000".to_string(),
//!         service_name: "api-service".to_string(),
//!         severity: Some(Severity::High),
//!         confidence: "high".to_string(),
//!         summary: "Database connection pool exhausted".to_string(),
//!         root_cause: "Connection leak in v1.4.2".to_string(),
//!         recent_changes: "v1.4.2 deployed 30 minutes ago".to_string(),
//!         recommended_actions: vec!["Roll back v1.4.2".to_string()],
//!         timestamp: chrono::Utc::now(),
//!     })
//!     .await;
//! # let _ = delivered;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`SlackChannel`] implements Slack incoming-webhook notifications
//! - [`Notifier`] dispatches events to all enabled channels

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::slack::SlackChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::{IncidentEvent, Severity};

use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Central notification dispatcher.
///
/// The `Notifier` owns the enabled channels. Disabled channels are dropped at
/// construction so that [`Notifier::is_configured`] reflects real delivery
/// capability.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a notifier with specific channels, keeping only enabled ones.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        let channels: Vec<_> = channels
            .into_iter()
            .filter(|channel| {
                let enabled = channel.enabled();
                if enabled {
                    info!(channel = channel.name(), "Notification channel enabled");
                }
                enabled
            })
            .collect();

        if channels.is_empty() {
            warn!("No notification channels configured");
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Send an event to every channel and collect the per-channel results.
    pub async fn notify_and_wait(
        &self,
        event: &IncidentEvent,
    ) -> Vec<(&'static str, Result<(), ChannelError>)> {
        if !self.is_configured() {
            return vec![];
        }

        let mut results = vec![];

        for channel in &self.channels {
            let result = channel.send(event).await;
            results.push((channel.name(), result));
        }

        results
    }

    /// Deliver an event, returning `true` iff every channel accepted it.
    ///
    /// Failures are logged and swallowed. An unconfigured notifier returns
    /// `false` without sending anything.
    pub async fn notify(&self, event: &IncidentEvent) -> bool {
        if !self.is_configured() {
            debug!("No channels configured, skipping notification");
            return false;
        }

        let mut delivered = true;
        for (channel, result) in self.notify_and_wait(event).await {
            match result {
                Ok(()) => {
                    info!(
                        channel,
                        incident_id = %event.incident_id,
                        "Sent incident analysis"
                    );
                }
                Err(e) => {
                    error!(
                        channel,
                        incident_id = %event.incident_id,
                        error = %e,
                        "Failed to send notification"
                    );
                    delivered = false;
                }
            }
        }

        delivered
    }
}
