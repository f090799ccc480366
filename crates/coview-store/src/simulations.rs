//! Opaque simulation engine output attached to a resource.
//!
//! Snapshots are scoped to the owner of the resource: two owners who share
//! the same resource id each see and write only their own row.

use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::SimulationSnapshot;
use crate::row::{json_at, now, time_at, ts};

impl Database {
    /// Store (or replace) `owner_id`'s snapshot of a resource.
    pub fn put_simulation(
        &self,
        resource_id: &str,
        owner_id: &str,
        inputs: serde_json::Value,
        result: serde_json::Value,
        cash_flows: serde_json::Value,
    ) -> Result<SimulationSnapshot> {
        let updated_at = now();

        self.conn().execute(
            "INSERT INTO simulation_snapshots
                 (resource_id, owner_id, inputs, result, cash_flows, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(resource_id, owner_id) DO UPDATE SET
                 inputs = excluded.inputs,
                 result = excluded.result,
                 cash_flows = excluded.cash_flows,
                 updated_at = excluded.updated_at",
            params![
                resource_id,
                owner_id,
                serde_json::to_string(&inputs)?,
                serde_json::to_string(&result)?,
                serde_json::to_string(&cash_flows)?,
                ts(&updated_at),
            ],
        )?;

        tracing::debug!(resource_id, owner = owner_id, "simulation snapshot stored");
        self.get_simulation(resource_id, owner_id)
    }

    pub fn get_simulation(&self, resource_id: &str, owner_id: &str) -> Result<SimulationSnapshot> {
        self.conn()
            .query_row(
                "SELECT resource_id, owner_id, inputs, result, cash_flows, updated_at
                 FROM simulation_snapshots WHERE resource_id = ?1 AND owner_id = ?2",
                params![resource_id, owner_id],
                |row| {
                    Ok(SimulationSnapshot {
                        resource_id: row.get(0)?,
                        owner_id: row.get(1)?,
                        inputs: json_at(row, 2)?,
                        result: json_at(row, 3)?,
                        cash_flows: json_at(row, 4)?,
                        updated_at: time_at(row, 5)?,
                    })
                },
            )
            .map_err(StoreError::from_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_replace() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_simulation("prop-1", "owner"),
            Err(StoreError::NotFound)
        ));

        let first = db
            .put_simulation(
                "prop-1",
                "owner",
                json!({ "price": 250000 }),
                json!({ "net_yield": 0.041 }),
                json!([{ "year": 1, "net": 1200 }]),
            )
            .unwrap();
        assert_eq!(first.result["net_yield"], json!(0.041));

        let second = db
            .put_simulation("prop-1", "owner", json!({ "price": 240000 }), json!({}), json!([]))
            .unwrap();
        assert_eq!(second.inputs["price"], json!(240000));
        assert_eq!(db.get_simulation("prop-1", "owner").unwrap(), second);
    }

    #[test]
    fn owners_do_not_see_each_other() {
        let db = Database::open_in_memory().unwrap();
        db.put_simulation("prop-1", "alice", json!({}), json!({ "secret": 42 }), json!([]))
            .unwrap();

        assert!(matches!(
            db.get_simulation("prop-1", "mallory"),
            Err(StoreError::NotFound)
        ));

        db.put_simulation("prop-1", "mallory", json!({}), json!({ "secret": 0 }), json!([]))
            .unwrap();
        let alice = db.get_simulation("prop-1", "alice").unwrap();
        assert_eq!(alice.result["secret"], json!(42));
        assert_eq!(alice.owner_id, "alice");
    }
}
