use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Opaque simulation engine output, one row per resource
CREATE TABLE IF NOT EXISTS simulation_snapshots (
    resource_id TEXT PRIMARY KEY NOT NULL,
    owner_id    TEXT NOT NULL,
    inputs      TEXT NOT NULL,               -- JSON
    result      TEXT NOT NULL,               -- JSON
    cash_flows  TEXT NOT NULL,               -- JSON
    updated_at  TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
