use std::collections::BTreeSet;

use coview_shared::{validate, ValidationError};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Comment;
use crate::row::{json_at, now, opt_uuid_at, time_at, ts, uuid_at};

const SELECT_COMMENT: &str = "SELECT id, share_id, author_id, content, tags, parent_id,
        created_at, updated_at
 FROM comments";

impl Database {
    /// Post a comment, or a reply when `parent_id` is set.
    ///
    /// Replies must point at a top-level comment of the same share; a reply
    /// to a reply is rejected.
    pub fn post_comment(
        &self,
        share_id: Uuid,
        author_id: &str,
        content: &str,
        tags: &[String],
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let content = validate::comment_content(content)?;
        let tags = validate::tags(tags)?;

        if let Some(parent_id) = parent_id {
            let parent = match self.get_comment(parent_id) {
                Ok(parent) => parent,
                Err(StoreError::NotFound) => return Err(ValidationError::InvalidParent.into()),
                Err(e) => return Err(e),
            };
            if parent.share_id != share_id || parent.parent_id.is_some() {
                return Err(ValidationError::InvalidParent.into());
            }
        }

        self.get_share(share_id)?;

        let created_at = now();
        let comment = Comment {
            id: Uuid::new_v4(),
            share_id,
            author_id: author_id.to_string(),
            content,
            tags,
            parent_id,
            created_at,
            updated_at: created_at,
        };

        self.conn().execute(
            "INSERT INTO comments (id, share_id, author_id, content, tags, parent_id,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                comment.id.to_string(),
                comment.share_id.to_string(),
                comment.author_id,
                comment.content,
                serde_json::to_string(&comment.tags)?,
                comment.parent_id.map(|p| p.to_string()),
                ts(&comment.created_at),
                ts(&comment.updated_at),
            ],
        )?;

        tracing::debug!(
            comment_id = %comment.id,
            share_id = %share_id,
            reply = parent_id.is_some(),
            "comment posted"
        );

        Ok(comment)
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.conn()
            .query_row(
                &format!("{SELECT_COMMENT} WHERE id = ?1"),
                params![id.to_string()],
                row_to_comment,
            )
            .map_err(StoreError::from_query)
    }

    /// Every comment of a share, flat, in creation order.
    pub fn list_comments(&self, share_id: Uuid) -> Result<Vec<Comment>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COMMENT} WHERE share_id = ?1 ORDER BY rowid ASC"))?;

        let rows = stmt.query_map(params![share_id.to_string()], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    /// Replace content and tags. Only the author may edit.
    pub fn edit_comment(
        &self,
        id: Uuid,
        author_id: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Comment> {
        let mut comment = self.get_comment(id)?;
        if comment.author_id != author_id {
            tracing::debug!(comment_id = %id, "edit denied, not the author");
            return Err(StoreError::Denied);
        }

        comment.content = validate::comment_content(content)?;
        comment.tags = validate::tags(tags)?;
        comment.updated_at = now();

        self.conn().execute(
            "UPDATE comments SET content = ?2, tags = ?3, updated_at = ?4
             WHERE id = ?1 AND author_id = ?5",
            params![
                id.to_string(),
                comment.content,
                serde_json::to_string(&comment.tags)?,
                ts(&comment.updated_at),
                author_id,
            ],
        )?;

        Ok(comment)
    }

    /// Delete a comment. Only the author may delete.
    ///
    /// Replies are left in place; with their parent gone they surface as
    /// top-level comments.
    pub fn delete_comment(&self, id: Uuid, author_id: &str) -> Result<()> {
        let comment = self.get_comment(id)?;
        if comment.author_id != author_id {
            tracing::debug!(comment_id = %id, "delete denied, not the author");
            return Err(StoreError::Denied);
        }

        self.conn().execute(
            "DELETE FROM comments WHERE id = ?1 AND author_id = ?2",
            params![id.to_string(), author_id],
        )?;

        tracing::debug!(comment_id = %id, "comment deleted");
        Ok(())
    }
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_at(row, 0)?,
        share_id: uuid_at(row, 1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        tags: json_at::<BTreeSet<String>>(row, 4)?,
        parent_id: opt_uuid_at(row, 5)?,
        created_at: time_at(row, 6)?,
        updated_at: time_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewShare, Share};

    fn setup() -> (Database, Share) {
        let db = Database::open_in_memory().unwrap();
        let share = db
            .create_share(NewShare {
                resource_id: Some("prop-1".into()),
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        (db, share)
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn post_and_list_in_creation_order() {
        let (db, share) = setup();
        let a = db.post_comment(share.id, "u1", " first ", &tags(&["Risk"]), None).unwrap();
        let b = db.post_comment(share.id, "u2", "second", &[], None).unwrap();

        assert_eq!(a.content, "first");
        assert!(a.tags.contains("risk"));

        let listed: Vec<Uuid> = db.list_comments(share.id).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(listed, vec![a.id, b.id]);
        assert_eq!(db.get_comment(a.id).unwrap(), a);
    }

    #[test]
    fn empty_content_rejected() {
        let (db, share) = setup();
        let err = db.post_comment(share.id, "u1", "   ", &[], None).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyContent)));
        assert!(db.list_comments(share.id).unwrap().is_empty());
    }

    #[test]
    fn reply_rules() {
        let (db, share) = setup();
        let top = db.post_comment(share.id, "u1", "top", &[], None).unwrap();
        let reply = db.post_comment(share.id, "u2", "reply", &[], Some(top.id)).unwrap();
        assert_eq!(reply.parent_id, Some(top.id));

        // Reply to a reply.
        let err = db.post_comment(share.id, "u1", "nested", &[], Some(reply.id)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::InvalidParent)));

        // Missing parent.
        let err = db.post_comment(share.id, "u1", "x", &[], Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::InvalidParent)));

        // Parent from another share.
        let other = db
            .create_share(NewShare {
                resource_id: Some("prop-2".into()),
                owner_id: "owner".into(),
                ..Default::default()
            })
            .unwrap();
        let err = db.post_comment(other.id, "u1", "x", &[], Some(top.id)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::InvalidParent)));
    }

    #[test]
    fn unknown_share_not_found() {
        let (db, _) = setup();
        let err = db.post_comment(Uuid::new_v4(), "u1", "hi", &[], None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn only_author_edits() {
        let (db, share) = setup();
        let c = db.post_comment(share.id, "u1", "original", &[], None).unwrap();

        let err = db.edit_comment(c.id, "u2", "hijacked", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Denied));
        assert_eq!(db.get_comment(c.id).unwrap(), c);

        let edited = db.edit_comment(c.id, "u1", "updated", &tags(&["needs-review"])).unwrap();
        assert_eq!(edited.content, "updated");
        assert!(edited.tags.contains("needs-review"));
        assert!(edited.updated_at >= c.updated_at);
        assert_eq!(db.get_comment(c.id).unwrap(), edited);
    }

    #[test]
    fn only_author_deletes_and_replies_survive() {
        let (db, share) = setup();
        let top = db.post_comment(share.id, "u1", "top", &[], None).unwrap();
        let reply = db.post_comment(share.id, "u2", "reply", &[], Some(top.id)).unwrap();

        assert!(matches!(db.delete_comment(top.id, "u2"), Err(StoreError::Denied)));
        assert_eq!(db.list_comments(share.id).unwrap().len(), 2);

        db.delete_comment(top.id, "u1").unwrap();
        let remaining = db.list_comments(share.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, reply.id);
        assert!(matches!(db.get_comment(top.id), Err(StoreError::NotFound)));
    }
}
