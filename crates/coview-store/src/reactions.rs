use std::collections::{BTreeMap, HashMap};

use coview_shared::ReactionKind;
use rusqlite::{params, TransactionBehavior};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Reaction, ReactionCount, Toggle};
use crate::row::{now, parsed_at, time_at, ts, uuid_at};

impl Database {
    /// Flip one identity's reaction on a comment.
    ///
    /// An identical reaction is removed, otherwise one is created. The unique
    /// index on `(comment_id, author_id, reaction)` keeps duplicates out even
    /// when two toggles race.
    pub fn toggle_reaction(
        &mut self,
        comment_id: Uuid,
        author_id: &str,
        kind: ReactionKind,
    ) -> Result<Toggle> {
        // NotFound for unknown comments, before taking the write lock.
        self.get_comment(comment_id)?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "DELETE FROM reactions WHERE comment_id = ?1 AND author_id = ?2 AND reaction = ?3",
            params![comment_id.to_string(), author_id, kind.as_str()],
        )?;

        let outcome = if removed > 0 {
            Toggle::Removed
        } else {
            tx.execute(
                "INSERT OR IGNORE INTO reactions (id, comment_id, author_id, reaction, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    comment_id.to_string(),
                    author_id,
                    kind.as_str(),
                    ts(&now()),
                ],
            )?;
            Toggle::Applied
        };

        tx.commit()?;

        tracing::debug!(comment_id = %comment_id, reaction = %kind, ?outcome, "reaction toggled");
        Ok(outcome)
    }

    pub fn get_reactions_for_comment(&self, comment_id: Uuid) -> Result<Vec<Reaction>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, comment_id, author_id, reaction, created_at
             FROM reactions WHERE comment_id = ?1 ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![comment_id.to_string()], |row| {
            Ok(Reaction {
                id: uuid_at(row, 0)?,
                comment_id: uuid_at(row, 1)?,
                author_id: row.get(2)?,
                kind: parsed_at(row, 3)?,
                created_at: time_at(row, 4)?,
            })
        })?;

        let mut reactions = Vec::new();
        for row in rows {
            reactions.push(row?);
        }
        Ok(reactions)
    }

    /// Reaction totals of a single comment, ordered by kind.
    pub fn comment_reaction_counts(
        &self,
        comment_id: Uuid,
        viewer: Option<&str>,
    ) -> Result<Vec<ReactionCount>> {
        let mut totals: BTreeMap<ReactionKind, ReactionCount> = BTreeMap::new();
        for reaction in self.get_reactions_for_comment(comment_id)? {
            let total = totals.entry(reaction.kind).or_insert(ReactionCount {
                kind: reaction.kind,
                count: 0,
                mine: false,
            });
            total.count += 1;
            total.mine |= viewer == Some(reaction.author_id.as_str());
        }
        Ok(totals.into_values().collect())
    }

    /// Per-comment reaction totals for a whole share, computed on read.
    ///
    /// `viewer` sets the `mine` flag; pass `None` for anonymous visitors.
    /// Comments without reactions are absent from the map.
    pub fn reaction_counts(
        &self,
        share_id: Uuid,
        viewer: Option<&str>,
    ) -> Result<HashMap<Uuid, Vec<ReactionCount>>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.comment_id, r.reaction, COUNT(*),
                    SUM(CASE WHEN r.author_id = ?2 THEN 1 ELSE 0 END)
             FROM reactions r
             JOIN comments c ON c.id = r.comment_id
             WHERE c.share_id = ?1
             GROUP BY r.comment_id, r.reaction",
        )?;

        let rows = stmt.query_map(params![share_id.to_string(), viewer], |row| {
            let comment_id = uuid_at(row, 0)?;
            let kind: ReactionKind = parsed_at(row, 1)?;
            let count: u32 = row.get(2)?;
            let mine: i64 = row.get(3)?;
            Ok((comment_id, ReactionCount { kind, count, mine: mine > 0 }))
        })?;

        let mut map: HashMap<Uuid, Vec<ReactionCount>> = HashMap::new();
        for row in rows {
            let (comment_id, count) = row?;
            map.entry(comment_id).or_default().push(count);
        }
        for counts in map.values_mut() {
            counts.sort_by_key(|c| c.kind);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Comment, NewShare};

    fn setup() -> (Database, Comment) {
        let db = Database::open_in_memory().unwrap();
        let share = db
            .create_share(NewShare {
                resource_id: Some("prop-1".into()),
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        let comment = db.post_comment(share.id, "u1", "hello", &[], None).unwrap();
        (db, comment)
    }

    #[test]
    fn toggle_parity() {
        let (mut db, c) = setup();

        for n in 1..=6 {
            let outcome = db.toggle_reaction(c.id, "u2", ReactionKind::Agree).unwrap();
            let expected = if n % 2 == 1 { Toggle::Applied } else { Toggle::Removed };
            assert_eq!(outcome, expected);

            let mine = db
                .get_reactions_for_comment(c.id)
                .unwrap()
                .into_iter()
                .filter(|r| r.author_id == "u2" && r.kind == ReactionKind::Agree)
                .count();
            assert_eq!(mine, n % 2);
        }
    }

    #[test]
    fn different_values_are_independent() {
        let (mut db, c) = setup();
        db.toggle_reaction(c.id, "u2", ReactionKind::Agree).unwrap();
        db.toggle_reaction(c.id, "u2", ReactionKind::Question).unwrap();
        db.toggle_reaction(c.id, "u3", ReactionKind::Agree).unwrap();
        assert_eq!(db.get_reactions_for_comment(c.id).unwrap().len(), 3);
    }

    #[test]
    fn counts_computed_on_read() {
        let (mut db, c) = setup();
        db.toggle_reaction(c.id, "u2", ReactionKind::Agree).unwrap();
        db.toggle_reaction(c.id, "u3", ReactionKind::Agree).unwrap();
        db.toggle_reaction(c.id, "u3", ReactionKind::Disagree).unwrap();

        let counts = db.reaction_counts(c.share_id, Some("u2")).unwrap();
        let for_comment = &counts[&c.id];
        assert_eq!(
            for_comment,
            &vec![
                ReactionCount { kind: ReactionKind::Agree, count: 2, mine: true },
                ReactionCount { kind: ReactionKind::Disagree, count: 1, mine: false },
            ]
        );

        let anonymous = db.reaction_counts(c.share_id, None).unwrap();
        assert!(anonymous[&c.id].iter().all(|rc| !rc.mine));

        // The single-comment view agrees with the share-wide one.
        assert_eq!(
            &db.comment_reaction_counts(c.id, Some("u2")).unwrap(),
            for_comment
        );
    }

    #[test]
    fn unknown_comment_not_found() {
        let (mut db, _) = setup();
        let err = db
            .toggle_reaction(Uuid::new_v4(), "u2", ReactionKind::Agree)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn reactions_go_with_their_comment() {
        let (mut db, c) = setup();
        db.toggle_reaction(c.id, "u2", ReactionKind::Agree).unwrap();
        db.delete_comment(c.id, "u1").unwrap();
        assert!(db.get_reactions_for_comment(c.id).unwrap().is_empty());
    }
}
