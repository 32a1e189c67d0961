//! Incident persistence.
//!
//! Incidents are stored as whole documents keyed by `incident_id`; writing an
//! existing identifier replaces the document. Reads return newest first.

pub mod memory;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{IncidentAnalysis, Severity};

pub use memory::MemoryIncidentStore;
pub use sqlite::SqliteIncidentStore;

/// Default number of incidents returned by listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// A persisted incident with its storage identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIncident {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub analysis: IncidentAnalysis,
}

/// Query over stored incidents. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub service: Option<String>,
    pub severity: Option<Severity>,
    /// Words that must all appear in the summary, root cause or actions
    pub text: Option<String>,
}

impl IncidentFilter {
    /// Whitespace-separated search terms, if any.
    pub fn terms(&self) -> Vec<&str> {
        self.text
            .as_deref()
            .map(|text| text.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Durable incident storage.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Insert or replace the incident with the analysis's identifier.
    async fn upsert(&self, analysis: &IncidentAnalysis) -> Result<(), StoreError>;

    /// Up to `limit` incidents matching `filter`, newest first.
    async fn find(
        &self,
        filter: &IncidentFilter,
        limit: usize,
    ) -> Result<Vec<StoredIncident>, StoreError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredIncident>, StoreError> {
        self.find(&IncidentFilter::default(), limit).await
    }

    async fn list_by_service(
        &self,
        service: &str,
        limit: usize,
    ) -> Result<Vec<StoredIncident>, StoreError> {
        let filter = IncidentFilter {
            service: Some(service.to_string()),
            ..IncidentFilter::default()
        };
        self.find(&filter, limit).await
    }

    async fn list_by_severity(
        &self,
        severity: Severity,
        limit: usize,
    ) -> Result<Vec<StoredIncident>, StoreError> {
        let filter = IncidentFilter {
            severity: Some(severity),
            ..IncidentFilter::default()
        };
        self.find(&filter, limit).await
    }

    /// Full-text search over summary, root cause and recommended actions.
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<StoredIncident>, StoreError> {
        let filter = IncidentFilter {
            text: Some(text.to_string()),
            ..IncidentFilter::default()
        };
        self.find(&filter, limit).await
    }
}

/// Lowercase label stored alongside a document for severity lookups.
pub(crate) fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}
