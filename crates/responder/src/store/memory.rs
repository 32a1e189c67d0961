//! In-process incident store, used when no database is configured.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{IncidentFilter, IncidentStore, StoredIncident};
use crate::error::StoreError;
use crate::models::IncidentAnalysis;

#[derive(Debug, Default)]
struct Records {
    next_id: u64,
    by_incident: HashMap<String, StoredIncident>,
}

/// Incident store held in memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryIncidentStore {
    records: Mutex<Records>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(filter: &IncidentFilter, analysis: &IncidentAnalysis) -> bool {
    if let Some(service) = &filter.service {
        if &analysis.service_name != service {
            return false;
        }
    }

    if filter.severity.is_some() && analysis.severity != filter.severity {
        return false;
    }

    let terms = filter.terms();
    if terms.is_empty() {
        return true;
    }

    let fields = [
        words(&analysis.summary),
        words(&analysis.root_cause),
        words(&analysis.recommended_actions.join(" ")),
    ];

    terms.iter().all(|term| {
        let phrase = words(term);
        !phrase.is_empty()
            && fields
                .iter()
                .any(|field| field.windows(phrase.len()).any(|window| window == phrase))
    })
}

/// Lowercase alphanumeric tokens, split the way the SQLite full-text index
/// splits them.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, analysis: &IncidentAnalysis) -> Result<(), StoreError> {
        let incident_id = analysis
            .incident_id
            .clone()
            .ok_or(StoreError::MissingIncidentId)?;

        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;

        let id = match records.by_incident.get(&incident_id) {
            Some(existing) => existing.id.clone(),
            None => {
                records.next_id += 1;
                records.next_id.to_string()
            }
        };

        records.by_incident.insert(
            incident_id,
            StoredIncident {
                id,
                analysis: analysis.clone(),
            },
        );

        Ok(())
    }

    async fn find(
        &self,
        filter: &IncidentFilter,
        limit: usize,
    ) -> Result<Vec<StoredIncident>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut found: Vec<StoredIncident> = records
            .by_incident
            .values()
            .filter(|stored| matches(filter, &stored.analysis))
            .cloned()
            .collect();
        drop(records);

        found.sort_by(|a, b| {
            b.analysis
                .timestamp
                .cmp(&a.analysis.timestamp)
                .then_with(|| b.analysis.incident_id.cmp(&a.analysis.incident_id))
        });
        found.truncate(limit);

        Ok(found)
    }
}
