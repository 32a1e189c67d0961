//! SQLite schema for the incident store.

use rusqlite::Connection;

/// Indexes created by [`initialize_schema`].
pub const INDEXES: &[&str] = &[
    "incident_id_unique",
    "service_index",
    "severity_index",
    "timestamp_desc_index",
];

/// Full-text index over summary, root cause and recommended actions.
pub const TEXT_SEARCH_TABLE: &str = "incident_text_search";

/// Create the incidents table, its indexes and the full-text index.
///
/// Safe to run repeatedly.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS incidents (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            incident_id         TEXT    NOT NULL,
            timestamp           TEXT,
            service_name        TEXT    NOT NULL,
            severity            TEXT,
            summary             TEXT    NOT NULL,
            root_cause          TEXT    NOT NULL,
            recommended_actions TEXT    NOT NULL,
            document            TEXT    NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS incident_id_unique ON incidents(incident_id);
        CREATE INDEX IF NOT EXISTS service_index ON incidents(service_name);
        CREATE INDEX IF NOT EXISTS severity_index ON incidents(severity);
        CREATE INDEX IF NOT EXISTS timestamp_desc_index ON incidents(timestamp DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS incident_text_search USING fts5(
            summary,
            root_cause,
            recommended_actions,
            content = 'incidents',
            content_rowid = 'id'
        );

        CREATE TRIGGER IF NOT EXISTS incidents_ai AFTER INSERT ON incidents BEGIN
            INSERT INTO incident_text_search(rowid, summary, root_cause, recommended_actions)
            VALUES (new.id, new.summary, new.root_cause, new.recommended_actions);
        END;

        CREATE TRIGGER IF NOT EXISTS incidents_ad AFTER DELETE ON incidents BEGIN
            INSERT INTO incident_text_search(incident_text_search, rowid, summary, root_cause, recommended_actions)
            VALUES ('delete', old.id, old.summary, old.root_cause, old.recommended_actions);
        END;

        CREATE TRIGGER IF NOT EXISTS incidents_au AFTER UPDATE ON incidents BEGIN
            INSERT INTO incident_text_search(incident_text_search, rowid, summary, root_cause, recommended_actions)
            VALUES ('delete', old.id, old.summary, old.root_cause, old.recommended_actions);
            INSERT INTO incident_text_search(rowid, summary, root_cause, recommended_actions)
            VALUES (new.id, new.summary, new.root_cause, new.recommended_actions);
        END;",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_names(conn: &Connection, kind: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names
    }

    #[test]
    fn test_initialize_schema_creates_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let indexes = object_names(&conn, "index");
        for index in INDEXES {
            assert!(indexes.iter().any(|name| name == index), "missing {index}");
        }

        let tables = object_names(&conn, "table");
        assert!(tables.iter().any(|name| name == TEXT_SEARCH_TABLE));
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
    }
}
