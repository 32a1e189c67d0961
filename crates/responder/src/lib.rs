//! Incident responder.
//!
//! Turns monitoring alerts into structured incident analyses:
//!
//! 1. [`context::ContextCollector`] gathers logs, traces, metrics and
//!    deployments for the alerting service
//! 2. [`prompt::PromptBuilder`] renders the alert and context into a prompt
//! 3. a [`llm::LanguageModel`] reasons over it
//! 4. [`parser::AnalysisParser`] turns the answer into an [`IncidentAnalysis`]
//! 5. [`orchestrator::AnalysisOrchestrator`] stamps, stores and announces it
//!
//! Missing credentials or failing services never fail an alert: telemetry
//! degrades to a synthetic context and the model to a mock analysis.

pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod server;
pub mod smoke;
pub mod store;
pub mod telemetry;

pub use config::ResponderConfig;
pub use error::{ModelError, ResponderError, StoreError, TelemetryError};
pub use models::{AlertRequest, Confidence, IncidentAnalysis, IncidentContext, Severity};
pub use orchestrator::AnalysisOrchestrator;
