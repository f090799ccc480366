//! Assembling the flat comment list of a share into a displayable thread.
//!
//! Nothing here touches the database: these are pure functions over the
//! output of [`Database::list_comments`](crate::Database::list_comments).

use std::collections::HashMap;

use coview_shared::constants::HIGH_ATTENTION_TAGS;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Comment;

/// A top-level comment with its direct replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

impl Thread {
    fn new(comment: Comment) -> Self {
        Self {
            comment,
            replies: Vec::new(),
        }
    }

    /// Whether the top-level comment carries a high-attention tag.
    pub fn is_high_attention(&self) -> bool {
        is_high_attention(&self.comment)
    }
}

pub fn is_high_attention(comment: &Comment) -> bool {
    HIGH_ATTENTION_TAGS
        .iter()
        .any(|tag| comment.tags.contains(*tag))
}

/// Group comments (in creation order) into threads in a single pass.
///
/// A comment is attached as a reply when its parent has already been seen as
/// a top-level comment. Comments whose parent is missing, not yet seen, or
/// itself a reply are promoted to top-level.
pub fn build_threads(comments: Vec<Comment>) -> Vec<Thread> {
    let mut threads: Vec<Thread> = Vec::new();
    let mut top_level: HashMap<Uuid, usize> = HashMap::new();

    for comment in comments {
        let parent_slot = comment
            .parent_id
            .and_then(|parent| top_level.get(&parent).copied());

        match parent_slot {
            Some(slot) => threads[slot].replies.push(comment),
            None => {
                top_level.insert(comment.id, threads.len());
                threads.push(Thread::new(comment));
            }
        }
    }

    threads
}

/// Stable priority ordering: high-attention threads first, otherwise the
/// original order is kept.
pub fn prioritize(mut threads: Vec<Thread>) -> Vec<Thread> {
    // `sort_by_key` is stable.
    threads.sort_by_key(|t| !t.is_high_attention());
    threads
}

/// Display-only truncation to at most `limit` top-level threads.
pub fn visible(threads: &[Thread], limit: Option<usize>) -> &[Thread] {
    match limit {
        Some(limit) if limit < threads.len() => &threads[..limit],
        _ => threads,
    }
}
