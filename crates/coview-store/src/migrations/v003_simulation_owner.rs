use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Snapshots belong to one owner's copy of a resource
CREATE TABLE simulation_snapshots_v3 (
    resource_id TEXT NOT NULL,
    owner_id    TEXT NOT NULL,
    inputs      TEXT NOT NULL,               -- JSON
    result      TEXT NOT NULL,               -- JSON
    cash_flows  TEXT NOT NULL,               -- JSON
    updated_at  TEXT NOT NULL,

    PRIMARY KEY (resource_id, owner_id)
);

INSERT INTO simulation_snapshots_v3
    (resource_id, owner_id, inputs, result, cash_flows, updated_at)
SELECT resource_id, owner_id, inputs, result, cash_flows, updated_at
FROM simulation_snapshots;

DROP TABLE simulation_snapshots;
ALTER TABLE simulation_snapshots_v3 RENAME TO simulation_snapshots;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
