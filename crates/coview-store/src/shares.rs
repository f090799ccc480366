//! CRUD operations for [`Share`] records.

use coview_shared::constants::SYNTHETIC_RESOURCE_PREFIX;
use coview_shared::TokenCodec;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{is_placeholder_resource, NewShare, Share};
use crate::row::{now, opt_time_at, time_at, truncate, ts, uuid_at};

/// Title given to shares created without one.
const DEFAULT_TITLE: &str = "Shared simulation";

/// Attempts at drawing a token that is not already taken.
const TOKEN_ATTEMPTS: usize = 3;

const SELECT_SHARE: &str = "SELECT id, resource_id, owner_id, share_token, title, description,
        created_at, expires_at
 FROM shares";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a share with a fresh token.
    ///
    /// An absent or placeholder resource id is replaced by a synthesized
    /// `draft-…` id so the record is always creatable; see
    /// [`Database::backfill_resource_id`].
    pub fn create_share(&self, new: NewShare) -> Result<Share> {
        let share = build_share(new);
        let share = insert_with_fresh_token(self.conn(), share)?;

        tracing::info!(
            share_id = %share.id,
            resource_id = %share.resource_id,
            owner = %share.owner_id,
            "share created"
        );

        Ok(share)
    }

    /// Return the caller's share for `resource_id`, creating it on first use.
    ///
    /// Lookup and insert run in one `BEGIN IMMEDIATE` transaction, so
    /// concurrent first calls for the same resource are serialized by the
    /// SQLite write lock and cannot create two shares.
    pub fn get_or_create_share(
        &mut self,
        resource_id: &str,
        owner_id: &str,
        title: &str,
    ) -> Result<Share> {
        let new = NewShare {
            resource_id: Some(resource_id.to_string()),
            owner_id: owner_id.to_string(),
            title: Some(title.to_string()),
            ..Default::default()
        };

        // A placeholder can never match an existing share.
        if is_placeholder_resource(resource_id) {
            return self.create_share(new);
        }

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = query_by_resource(&tx, resource_id, owner_id)? {
            tx.commit()?;
            tracing::debug!(share_id = %existing.id, "reusing existing share");
            return Ok(existing);
        }

        let share = insert_with_fresh_token(&tx, build_share(new))?;
        tx.commit()?;

        tracing::info!(
            share_id = %share.id,
            resource_id = %share.resource_id,
            owner = %share.owner_id,
            "share created on first use"
        );

        Ok(share)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single share by id.
    pub fn get_share(&self, id: Uuid) -> Result<Share> {
        self.conn()
            .query_row(
                &format!("{SELECT_SHARE} WHERE id = ?1"),
                params![id.to_string()],
                row_to_share,
            )
            .map_err(StoreError::from_query)
    }

    /// Fetch a share by its bearer token.
    pub fn get_share_by_token(&self, token: &str) -> Result<Share> {
        self.conn()
            .query_row(
                &format!("{SELECT_SHARE} WHERE share_token = ?1"),
                params![token],
                row_to_share,
            )
            .map_err(StoreError::from_query)
    }

    /// Fetch the owner's share for a resource. The most recent one wins if
    /// several exist.
    pub fn get_share_by_resource(&self, resource_id: &str, owner_id: &str) -> Result<Share> {
        query_by_resource(self.conn(), resource_id, owner_id)?.ok_or(StoreError::NotFound)
    }

    /// List an owner's shares, newest first.
    pub fn list_shares_for_owner(&self, owner_id: &str) -> Result<Vec<Share>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_SHARE} WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![owner_id], row_to_share)?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?);
        }
        Ok(shares)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a synthesized resource id with the real one once the resource
    /// has been persisted.
    ///
    /// A snapshot saved under the draft id moves along with the share, unless
    /// the owner already has one under the real id.
    ///
    /// Best effort: returns `false` when the share does not exist, already
    /// carries a real resource id, or `resource_id` is itself a placeholder.
    pub fn backfill_resource_id(&mut self, share_id: Uuid, resource_id: &str) -> Result<bool> {
        let resource_id = resource_id.trim();
        if is_placeholder_resource(resource_id) {
            return Ok(false);
        }

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let draft: Option<(String, String)> = tx
            .query_row(
                "SELECT resource_id, owner_id FROM shares
                 WHERE id = ?1 AND substr(resource_id, 1, ?2) = ?3",
                params![
                    share_id.to_string(),
                    SYNTHETIC_RESOURCE_PREFIX.len() as i64,
                    SYNTHETIC_RESOURCE_PREFIX,
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((draft_id, owner_id)) = draft else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE shares SET resource_id = ?2 WHERE id = ?1",
            params![share_id.to_string(), resource_id],
        )?;
        let moved = tx.execute(
            "UPDATE OR IGNORE simulation_snapshots SET resource_id = ?3
             WHERE resource_id = ?1 AND owner_id = ?2",
            params![draft_id, owner_id, resource_id],
        )?;
        tx.commit()?;

        tracing::info!(
            share_id = %share_id,
            resource_id,
            snapshot_moved = moved > 0,
            "resource id backfilled"
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_share(new: NewShare) -> Share {
    let resource_id = match new.resource_id {
        Some(id) if !is_placeholder_resource(&id) => id.trim().to_string(),
        _ => format!("{SYNTHETIC_RESOURCE_PREFIX}{}", Uuid::new_v4()),
    };
    let title = new
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    Share {
        id: Uuid::new_v4(),
        resource_id,
        owner_id: new.owner_id,
        share_token: TokenCodec::generate(),
        title,
        description: new.description.filter(|d| !d.trim().is_empty()),
        created_at: now(),
        expires_at: new.expires_at.map(truncate),
    }
}

/// Insert `share`, drawing a new token if the current one collides.
fn insert_with_fresh_token(conn: &Connection, mut share: Share) -> Result<Share> {
    let mut attempt = 1;
    loop {
        match insert_share(conn, &share) {
            Ok(()) => return Ok(share),
            Err(e) if e.is_constraint_violation() && attempt < TOKEN_ATTEMPTS => {
                tracing::warn!(attempt, "share token collision, regenerating");
                share.share_token = TokenCodec::generate();
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn insert_share(conn: &Connection, share: &Share) -> Result<()> {
    conn.execute(
        "INSERT INTO shares (id, resource_id, owner_id, share_token, title, description,
                             created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            share.id.to_string(),
            share.resource_id,
            share.owner_id,
            share.share_token,
            share.title,
            share.description,
            ts(&share.created_at),
            share.expires_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

fn query_by_resource(conn: &Connection, resource_id: &str, owner_id: &str) -> Result<Option<Share>> {
    let share = conn
        .query_row(
            &format!(
                "{SELECT_SHARE} WHERE resource_id = ?1 AND owner_id = ?2
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            params![resource_id.trim(), owner_id],
            row_to_share,
        )
        .optional()?;
    Ok(share)
}

/// Map a `rusqlite::Row` to a [`Share`].
fn row_to_share(row: &rusqlite::Row<'_>) -> rusqlite::Result<Share> {
    Ok(Share {
        id: uuid_at(row, 0)?,
        resource_id: row.get(1)?,
        owner_id: row.get(2)?,
        share_token: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        created_at: time_at(row, 6)?,
        expires_at: opt_time_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_share(resource_id: Option<&str>) -> NewShare {
        NewShare {
            resource_id: resource_id.map(str::to_string),
            owner_id: "owner".into(),
            title: Some("Demo".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_and_fetch_by_token() {
        let db = db();
        let share = db.create_share(new_share(Some("prop-1"))).unwrap();
        assert_eq!(share.resource_id, "prop-1");
        assert!(TokenCodec::is_well_formed(&share.share_token));

        let fetched = db.get_share_by_token(&share.share_token).unwrap();
        assert_eq!(fetched, share);
        assert!(matches!(
            db.get_share_by_token("nope"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn tokens_are_unique_per_share() {
        let db = db();
        let a = db.create_share(new_share(Some("prop-1"))).unwrap();
        let b = db.create_share(new_share(Some("prop-1"))).unwrap();
        assert_ne!(a.share_token, b.share_token);
    }

    #[test]
    fn placeholder_resource_is_synthesized_and_backfilled() {
        let mut db = db();
        let share = db.create_share(new_share(Some("undefined"))).unwrap();
        assert!(share.has_synthetic_resource());

        let absent = db.create_share(new_share(None)).unwrap();
        assert!(absent.has_synthetic_resource());
        assert_ne!(share.resource_id, absent.resource_id);

        assert!(!db.backfill_resource_id(share.id, "new").unwrap());
        assert!(db.backfill_resource_id(share.id, "prop-9").unwrap());
        assert_eq!(db.get_share(share.id).unwrap().resource_id, "prop-9");

        // Only synthesized ids are replaced.
        assert!(!db.backfill_resource_id(share.id, "prop-10").unwrap());
        assert_eq!(db.get_share(share.id).unwrap().resource_id, "prop-9");
    }

    #[test]
    fn backfill_carries_the_draft_snapshot() {
        let mut db = db();
        let share = db.create_share(new_share(None)).unwrap();
        db.put_simulation(
            &share.resource_id,
            "owner",
            serde_json::json!({ "price": 1 }),
            serde_json::json!({ "net_yield": 0.05 }),
            serde_json::json!([]),
        )
        .unwrap();

        assert!(db.backfill_resource_id(share.id, "prop-3").unwrap());

        let snapshot = db.get_simulation("prop-3", "owner").unwrap();
        assert_eq!(snapshot.result["net_yield"], serde_json::json!(0.05));
        assert!(matches!(
            db.get_simulation(&share.resource_id, "owner"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut db = db();
        let first = db.get_or_create_share("prop-1", "owner", "Demo").unwrap();
        let second = db.get_or_create_share("prop-1", "owner", "Demo").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_shares_for_owner("owner").unwrap().len(), 1);

        // Different owner gets a separate share.
        let other = db.get_or_create_share("prop-1", "someone", "Demo").unwrap();
        assert_ne!(other.id, first.id);
    }

    #[test]
    fn get_or_create_reuses_explicitly_created_share() {
        let mut db = db();
        let created = db.create_share(new_share(Some("prop-2"))).unwrap();
        let got = db.get_or_create_share("prop-2", "owner", "Other").unwrap();
        assert_eq!(got.id, created.id);
        assert_eq!(got.title, "Demo");
    }

    #[test]
    fn fetch_by_resource_most_recent_wins() {
        let db = db();
        let _older = db.create_share(new_share(Some("prop-1"))).unwrap();
        let newer = db.create_share(new_share(Some("prop-1"))).unwrap();
        assert_eq!(db.get_share_by_resource("prop-1", "owner").unwrap().id, newer.id);
        assert!(matches!(
            db.get_share_by_resource("prop-1", "stranger"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn default_title_when_blank() {
        let db = db();
        let mut new = new_share(Some("prop-3"));
        new.title = Some("   ".into());
        assert_eq!(db.create_share(new).unwrap().title, DEFAULT_TITLE);
    }
}
