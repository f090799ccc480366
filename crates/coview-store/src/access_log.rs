//! Append-only access log.

use coview_shared::AccessAction;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::AccessLogEntry;
use crate::row::{now, parsed_at, time_at, ts, uuid_at};

/// Longest client context kept per entry; anything beyond is cut.
const MAX_CLIENT_CONTEXT: usize = 512;

impl Database {
    /// Append an entry. There is deliberately no update or delete counterpart.
    pub fn log_access(
        &self,
        share_id: Uuid,
        actor_id: Option<&str>,
        action: AccessAction,
        client_context: &str,
    ) -> Result<AccessLogEntry> {
        let entry = AccessLogEntry {
            id: Uuid::new_v4(),
            share_id,
            actor_id: actor_id.map(str::to_string),
            action,
            client_context: client_context.chars().take(MAX_CLIENT_CONTEXT).collect(),
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO access_log (id, share_id, actor_id, action, client_context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id.to_string(),
                entry.share_id.to_string(),
                entry.actor_id,
                entry.action.as_str(),
                entry.client_context,
                ts(&entry.created_at),
            ],
        )?;

        Ok(entry)
    }

    /// Most recent entries for a share, newest first.
    pub fn list_access_log(&self, share_id: Uuid, limit: u32) -> Result<Vec<AccessLogEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, share_id, actor_id, action, client_context, created_at
             FROM access_log
             WHERE share_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![share_id.to_string(), limit], |row| {
            Ok(AccessLogEntry {
                id: uuid_at(row, 0)?,
                share_id: uuid_at(row, 1)?,
                actor_id: row.get(2)?,
                action: parsed_at(row, 3)?,
                client_context: row.get(4)?,
                created_at: time_at(row, 5)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewShare;

    #[test]
    fn append_and_list() {
        let db = Database::open_in_memory().unwrap();
        let share = db
            .create_share(NewShare {
                resource_id: Some("prop-1".into()),
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();

        db.log_access(share.id, None, AccessAction::View, "curl/8").unwrap();
        db.log_access(share.id, Some("u1"), AccessAction::Comment, "").unwrap();

        let entries = db.list_access_log(share.id, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AccessAction::Comment);
        assert_eq!(entries[0].actor_id.as_deref(), Some("u1"));
        assert_eq!(entries[1].actor_id, None);

        assert_eq!(db.list_access_log(share.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn unknown_share_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        assert!(db
            .log_access(Uuid::new_v4(), None, AccessAction::View, "")
            .is_err());
    }

    #[test]
    fn client_context_is_capped() {
        let db = Database::open_in_memory().unwrap();
        let share = db
            .create_share(NewShare {
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        let long = "x".repeat(MAX_CLIENT_CONTEXT * 2);
        let entry = db.log_access(share.id, None, AccessAction::Download, &long).unwrap();
        assert_eq!(entry.client_context.len(), MAX_CLIENT_CONTEXT);
    }
}
