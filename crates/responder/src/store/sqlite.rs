//! SQLite-backed incident store.
//!
//! Each incident is one row holding the full JSON document plus the columns
//! that back its indexes. Calls run on the blocking pool behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, info};

use super::schema::{self, INDEXES};
use super::{severity_label, IncidentFilter, IncidentStore, StoredIncident};
use crate::error::StoreError;
use crate::models::IncidentAnalysis;

/// Incident store backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteIncidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIncidentStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        info!(path = %path.display(), "Opened incident database");
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Names of the incident indexes present in the database.
    pub async fn index_names(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = 'incidents' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&conn)
        })
        .await?
    }
}

/// FTS5 query requiring every term, each quoted so user input is literal.
fn fts_query(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_sql(filter: &IncidentFilter, limit: usize) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("SELECT incidents.id, incidents.document FROM incidents");
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    let terms = filter.terms();
    if !terms.is_empty() {
        sql.push_str(
            " JOIN incident_text_search ON incident_text_search.rowid = incidents.id",
        );
        clauses.push("incident_text_search MATCH ?");
        values.push(SqlValue::Text(fts_query(&terms)));
    }
    if let Some(service) = &filter.service {
        clauses.push("incidents.service_name = ?");
        values.push(SqlValue::Text(service.clone()));
    }
    if let Some(severity) = filter.severity {
        clauses.push("incidents.severity = ?");
        values.push(SqlValue::Text(severity_label(severity).to_string()));
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    sql.push_str(" ORDER BY incidents.timestamp DESC, incidents.id DESC LIMIT ?");
    values.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    (sql, values)
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn upsert(&self, analysis: &IncidentAnalysis) -> Result<(), StoreError> {
        let incident_id = analysis
            .incident_id
            .clone()
            .ok_or(StoreError::MissingIncidentId)?;
        let timestamp = analysis
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true));
        let severity = analysis.severity.map(severity_label);
        let actions = serde_json::to_string(&analysis.recommended_actions)?;
        let document = serde_json::to_string(analysis)?;
        let service_name = analysis.service_name.clone();
        let summary = analysis.summary.clone();
        let root_cause = analysis.root_cause.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO incidents
                    (incident_id, timestamp, service_name, severity, summary, root_cause,
                     recommended_actions, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(incident_id) DO UPDATE SET
                    timestamp = excluded.timestamp,
                    service_name = excluded.service_name,
                    severity = excluded.severity,
                    summary = excluded.summary,
                    root_cause = excluded.root_cause,
                    recommended_actions = excluded.recommended_actions,
                    document = excluded.document",
                params![
                    incident_id,
                    timestamp,
                    service_name,
                    severity,
                    summary,
                    root_cause,
                    actions,
                    document
                ],
            )?;
            debug!(incident_id = %incident_id, "Upserted incident");
            Ok(())
        })
        .await
    }

    async fn find(
        &self,
        filter: &IncidentFilter,
        limit: usize,
    ) -> Result<Vec<StoredIncident>, StoreError> {
        let (sql, values) = select_sql(filter, limit);

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, document)| -> Result<StoredIncident, StoreError> {
                    Ok(StoredIncident {
                        id: id.to_string(),
                        analysis: serde_json::from_str(&document)?,
                    })
                })
                .collect()
        })
        .await
    }
}

impl std::fmt::Debug for SqliteIncidentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIncidentStore").finish_non_exhaustive()
    }
}

/// Expected index names, for reporting by `setup-store`.
pub fn expected_indexes() -> impl Iterator<Item = &'static str> {
    INDEXES.iter().copied()
}
