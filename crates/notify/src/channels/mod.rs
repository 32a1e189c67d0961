//! Notification channel implementations.

pub mod slack;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::IncidentEvent;

/// Trait for notification channels (Slack, etc.).
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Send an incident event to this channel.
    async fn send(&self, event: &IncidentEvent) -> Result<(), ChannelError>;
}
