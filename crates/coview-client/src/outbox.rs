//! Comments that have not reached the server yet.
//!
//! A comment whose post fails for a transient reason is kept here with an
//! explicit sync state instead of being shown as posted. [`Outbox::flush`]
//! retries them in order.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, CommentEntry, NewComment};
use crate::error::{ClientError, Result};

/// Where a queued comment stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    /// Never tried since it was queued.
    Pending,
    /// Tried and failed; `last_error` is what the last attempt reported.
    Failed { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingComment {
    /// Local handle, distinct from the id the server will assign.
    pub local_id: Uuid,
    /// Share or invitation token the comment is posted through.
    pub token: String,
    pub comment: NewComment,
    pub queued_at: DateTime<Utc>,
    pub state: SyncState,
}

impl PendingComment {
    pub fn attempts(&self) -> u32 {
        match &self.state {
            SyncState::Pending => 0,
            SyncState::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Destination for queued comments.
#[async_trait]
pub trait CommentSink: Send + Sync {
    async fn post(&self, token: &str, comment: &NewComment) -> Result<CommentEntry>;
}

#[async_trait]
impl CommentSink for ApiClient {
    async fn post(&self, token: &str, comment: &NewComment) -> Result<CommentEntry> {
        self.post_comment(token, comment).await
    }
}

/// Result of [`Outbox::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Posted(CommentEntry),
    /// Kept for a later [`Outbox::flush`].
    Queued(Uuid),
}

/// What one [`Outbox::flush`] achieved.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Server copies of the comments that went through.
    pub posted: Vec<CommentEntry>,
    /// Comments the server refused for good, with its reason. They have
    /// left the outbox.
    pub rejected: Vec<(PendingComment, String)>,
    /// Comments still waiting.
    pub remaining: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Outbox {
    items: Vec<PendingComment>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PendingComment] {
        &self.items
    }

    /// Queue a comment without trying to post it.
    pub fn enqueue(&mut self, token: &str, comment: NewComment) -> Uuid {
        let local_id = Uuid::new_v4();
        self.items.push(PendingComment {
            local_id,
            token: token.to_string(),
            comment,
            queued_at: Utc::now(),
            state: SyncState::Pending,
        });
        debug!(%local_id, "comment queued");
        local_id
    }

    /// Give up on a queued comment.
    pub fn discard(&mut self, local_id: Uuid) -> Option<PendingComment> {
        let index = self.items.iter().position(|p| p.local_id == local_id)?;
        Some(self.items.remove(index))
    }

    /// Post now; on a failure worth retrying, queue instead.
    ///
    /// Errors that retrying cannot fix (validation, permissions, sign-in)
    /// are returned to the caller and nothing is queued.
    pub async fn submit(
        &mut self,
        sink: &dyn CommentSink,
        token: &str,
        comment: NewComment,
    ) -> Result<Submission> {
        match sink.post(token, &comment).await {
            Ok(entry) => Ok(Submission::Posted(entry)),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "comment not posted, keeping it for later");
                let local_id = self.enqueue(token, comment);
                self.mark_failed(local_id, &e);
                Ok(Submission::Queued(local_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Retry every queued comment in order.
    ///
    /// Posted comments leave the outbox, and so do comments refused for a
    /// reason retrying cannot fix. The rest stay with their attempt count
    /// bumped.
    pub async fn flush(&mut self, sink: &dyn CommentSink) -> FlushReport {
        let mut report = FlushReport::default();
        let mut kept = Vec::with_capacity(self.items.len());

        for mut item in std::mem::take(&mut self.items) {
            match sink.post(&item.token, &item.comment).await {
                Ok(entry) => {
                    debug!(local_id = %item.local_id, comment_id = %entry.id, "queued comment posted");
                    report.posted.push(entry);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(local_id = %item.local_id, error = %e, "queued comment rejected");
                    report.rejected.push((item, e.to_string()));
                }
                Err(e) => {
                    item.state = SyncState::Failed {
                        attempts: item.attempts() + 1,
                        last_error: e.to_string(),
                    };
                    kept.push(item);
                }
            }
        }

        self.items = kept;
        report.remaining = self.items.len();
        if !report.posted.is_empty() || !report.rejected.is_empty() {
            info!(
                posted = report.posted.len(),
                rejected = report.rejected.len(),
                remaining = report.remaining,
                "outbox flushed"
            );
        }
        report
    }

    fn mark_failed(&mut self, local_id: Uuid, error: &ClientError) {
        if let Some(item) = self.items.iter_mut().find(|p| p.local_id == local_id) {
            item.state = SyncState::Failed {
                attempts: item.attempts() + 1,
                last_error: error.to_string(),
            };
        }
    }

    /// Read a saved outbox; a missing file is an empty outbox.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Accepts posts only while `online` is set.
    struct FakeSink {
        online: AtomicBool,
        posted: Mutex<Vec<(String, NewComment)>>,
    }

    impl FakeSink {
        fn new(online: bool) -> Self {
            Self {
                online: AtomicBool::new(online),
                posted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommentSink for FakeSink {
        async fn post(&self, token: &str, comment: &NewComment) -> Result<CommentEntry> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(ClientError::Status {
                    status: 503,
                    message: "Storage unavailable".into(),
                });
            }
            if comment.content.trim().is_empty() {
                return Err(ClientError::Status {
                    status: 400,
                    message: "Comment content is empty".into(),
                });
            }
            self.posted
                .lock()
                .unwrap()
                .push((token.to_string(), comment.clone()));
            let now = Utc::now();
            Ok(CommentEntry {
                id: Uuid::new_v4(),
                share_id: Uuid::nil(),
                author_id: "u1".into(),
                content: comment.content.clone(),
                tags: comment.tags.clone(),
                parent_id: comment.parent_id,
                created_at: now,
                updated_at: now,
                reactions: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn submit_posts_when_online() {
        let sink = FakeSink::new(true);
        let mut outbox = Outbox::new();
        let submission = outbox
            .submit(&sink, "tok", NewComment::new("hello"))
            .await
            .unwrap();
        assert!(matches!(submission, Submission::Posted(ref e) if e.content == "hello"));
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn failed_post_is_kept_not_faked() {
        let sink = FakeSink::new(false);
        let mut outbox = Outbox::new();

        let submission = outbox
            .submit(&sink, "tok", NewComment::new("offline").tagged("risk"))
            .await
            .unwrap();
        let Submission::Queued(local_id) = submission else {
            panic!("expected the comment to be queued");
        };
        assert!(sink.posted.lock().unwrap().is_empty());
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.items()[0].local_id, local_id);
        assert!(matches!(
            outbox.items()[0].state,
            SyncState::Failed { attempts: 1, .. }
        ));

        // Still down: the attempt count grows.
        let report = outbox.flush(&sink).await;
        assert!(report.posted.is_empty());
        assert_eq!(report.remaining, 1);
        assert_eq!(outbox.items()[0].attempts(), 2);

        sink.online.store(true, Ordering::SeqCst);
        let report = outbox.flush(&sink).await;
        assert_eq!(report.posted.len(), 1);
        assert_eq!(report.posted[0].tags, vec!["risk".to_string()]);
        assert!(outbox.is_empty());
        assert_eq!(sink.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_queued() {
        let sink = FakeSink::new(true);
        let mut outbox = Outbox::new();
        let err = outbox
            .submit(&sink, "tok", NewComment::new("   "))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn flush_drops_comments_the_server_refuses() {
        let sink = FakeSink::new(true);
        let mut outbox = Outbox::new();
        outbox.enqueue("tok", NewComment::new("   "));
        outbox.enqueue("tok", NewComment::new("fine"));

        let report = outbox.flush(&sink).await;
        assert_eq!(report.posted.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0.comment.content, "   ");
        assert!(report.rejected[0].1.contains("Comment content is empty"));
        assert_eq!(report.remaining, 0);
        assert!(outbox.is_empty());

        // Nothing left to resend.
        let report = outbox.flush(&sink).await;
        assert!(report.posted.is_empty() && report.rejected.is_empty());
        assert_eq!(sink.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn flush_keeps_order_and_discard_removes() {
        let sink = FakeSink::new(true);
        let mut outbox = Outbox::new();
        let a = outbox.enqueue("tok", NewComment::new("a"));
        outbox.enqueue("tok", NewComment::new("b"));
        let c = outbox.enqueue("tok", NewComment::new("c"));

        assert_eq!(outbox.discard(c).map(|p| p.comment.content), Some("c".to_string()));
        assert!(outbox.discard(c).is_none());
        assert_eq!(outbox.items()[0].local_id, a);
        assert_eq!(outbox.items()[0].state, SyncState::Pending);

        let report = outbox.flush(&sink).await;
        let contents: Vec<_> = report.posted.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.json");
        assert!(Outbox::load(&path).unwrap().is_empty());

        let mut outbox = Outbox::new();
        outbox.enqueue("tok", NewComment::new("persisted").reply_to(Uuid::nil()));
        outbox.save(&path).unwrap();

        let loaded = Outbox::load(&path).unwrap();
        assert_eq!(loaded.items(), outbox.items());
    }
}
