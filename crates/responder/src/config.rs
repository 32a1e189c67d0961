//! Runtime configuration.
//!
//! Every setting can come from a flag or an environment variable; a `.env`
//! file is loaded before parsing. Collaborators are built once from the
//! configuration at startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use notify::{Notifier, NotifyChannel, SlackChannel};
use tracing::info;

use crate::context::ContextCollector;
use crate::error::ResponderError;
use crate::llm::{GeminiClient, GeminiConfig};
use crate::orchestrator::AnalysisOrchestrator;
use crate::store::{IncidentStore, MemoryIncidentStore, SqliteIncidentStore};
use crate::telemetry::{DatadogClient, DatadogConfig, StaticDeploymentTracker};

/// Settings for the `serve` command.
#[derive(Debug, Clone, Args)]
pub struct ResponderConfig {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,

    /// Datadog API key
    #[arg(long, env = "DATADOG_API_KEY", hide_env_values = true)]
    pub datadog_api_key: Option<String>,

    /// Datadog application key
    #[arg(long, env = "DATADOG_APP_KEY", hide_env_values = true)]
    pub datadog_app_key: Option<String>,

    /// Datadog site, e.g. datadoghq.eu
    #[arg(long, env = "DATADOG_SITE", default_value = "datadoghq.com")]
    pub datadog_site: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = crate::llm::gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Slack incoming webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    /// Turn off notifications even when a channel is configured
    #[arg(
        long,
        env = "NOTIFY_DISABLED",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub notify_disabled: bool,

    /// SQLite database file; incidents are kept in memory when unset
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Minutes of telemetry collected before an alert
    #[arg(long, env = "CONTEXT_WINDOW_MINUTES", default_value = "15")]
    pub context_window_minutes: u32,

    #[arg(long, env = "TELEMETRY_TIMEOUT_SECS", default_value = "10")]
    pub telemetry_timeout_secs: u64,

    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value = "60")]
    pub model_timeout_secs: u64,

    #[arg(long, env = "NOTIFY_TIMEOUT_SECS", default_value = "10")]
    pub notify_timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            datadog_api_key: None,
            datadog_app_key: None,
            datadog_site: crate::telemetry::datadog::DEFAULT_SITE.to_string(),
            gemini_api_key: None,
            gemini_model: crate::llm::gemini::DEFAULT_MODEL.to_string(),
            slack_webhook_url: None,
            notify_disabled: false,
            database_path: None,
            context_window_minutes: 15,
            telemetry_timeout_secs: 10,
            model_timeout_secs: 60,
            notify_timeout_secs: 10,
        }
    }
}

impl ResponderConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ResponderError> {
        if self.context_window_minutes == 0 {
            return Err(ResponderError::Config(
                "CONTEXT_WINDOW_MINUTES must be at least 1".to_string(),
            ));
        }

        for (name, secs) in [
            ("TELEMETRY_TIMEOUT_SECS", self.telemetry_timeout_secs),
            ("MODEL_TIMEOUT_SECS", self.model_timeout_secs),
            ("NOTIFY_TIMEOUT_SECS", self.notify_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ResponderError::Config(format!("{name} must be at least 1")));
            }
        }

        Ok(())
    }

    pub fn datadog_config(&self) -> DatadogConfig {
        DatadogConfig {
            timeout_secs: self.telemetry_timeout_secs,
            ..DatadogConfig::for_site(
                self.datadog_api_key.clone(),
                self.datadog_app_key.clone(),
                &self.datadog_site,
            )
        }
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.gemini_api_key.clone(),
            model: self.gemini_model.clone(),
            timeout_secs: self.model_timeout_secs,
            ..GeminiConfig::default()
        }
    }

    /// The SQLite store when a path is set, otherwise an in-memory store.
    pub fn open_store(&self) -> Result<Arc<dyn IncidentStore>, ResponderError> {
        match &self.database_path {
            Some(path) => {
                let store = SqliteIncidentStore::open(path)
                    .map_err(|e| ResponderError::Config(format!("cannot open database: {e}")))?;
                Ok(Arc::new(store))
            }
            None => {
                info!("DATABASE_PATH not set, keeping incidents in memory");
                Ok(Arc::new(MemoryIncidentStore::new()))
            }
        }
    }

    pub fn build_notifier(&self) -> Result<Notifier, ResponderError> {
        if self.notify_disabled {
            info!("Notifications disabled");
            return Ok(Notifier::disabled());
        }

        let slack = SlackChannel::new(
            self.slack_webhook_url.clone(),
            Duration::from_secs(self.notify_timeout_secs),
        )
        .map_err(|e| ResponderError::Config(e.to_string()))?;

        let channels: Vec<Arc<dyn NotifyChannel>> = vec![Arc::new(slack)];
        Ok(Notifier::with_channels(channels))
    }

    /// Wire every collaborator into a pipeline.
    pub fn build_orchestrator(&self) -> Result<AnalysisOrchestrator, ResponderError> {
        self.validate()?;

        let datadog = DatadogClient::new(self.datadog_config())
            .map_err(|e| ResponderError::Config(e.to_string()))?;
        let gemini = GeminiClient::new(self.gemini_config())
            .map_err(|e| ResponderError::Config(e.to_string()))?;

        let collector = ContextCollector::new(
            Arc::new(datadog),
            Arc::new(StaticDeploymentTracker::default()),
            Duration::from_secs(self.telemetry_timeout_secs),
        );

        Ok(AnalysisOrchestrator::new(
            collector,
            Arc::new(gemini),
            self.open_store()?,
            Arc::new(self.build_notifier()?),
        )
        .with_window_minutes(self.context_window_minutes)
        .with_model_timeout(Duration::from_secs(self.model_timeout_secs)))
    }
}
