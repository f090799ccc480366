//! Remembering an invitation across sign-in.
//!
//! An anonymous visitor who opens an invitation link has to sign in before
//! accepting it. The token is parked on disk in the meantime and picked up
//! again once an identity is available.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{AcceptResult, ApiClient};
use crate::error::{ClientError, Result};

const FILE_NAME: &str = "continuation.json";

/// An invitation waiting for its visitor to sign in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub pending_token: String,
    pub pending_title: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// JSON file holding at most one [`Continuation`].
#[derive(Debug, Clone)]
pub struct ContinuationStore {
    path: PathBuf,
}

impl ContinuationStore {
    /// Store in the platform data directory.
    pub fn new() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("com", "coview", "coview")
            .ok_or(ClientError::NoDataDir)?;
        Ok(Self::at(dirs.data_dir().join(FILE_NAME)))
    }

    /// Store at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Park a token, replacing whatever was parked before.
    pub fn save(&self, token: &str, title: Option<&str>) -> Result<Continuation> {
        let continuation = Continuation {
            pending_token: token.to_string(),
            pending_title: title.map(str::to_string),
            saved_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&continuation)?)?;
        std::fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), "continuation saved");
        Ok(continuation)
    }

    /// The parked continuation, if any. An unreadable file counts as none.
    pub fn load(&self) -> Result<Option<Continuation>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(continuation) => Ok(Some(continuation)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable continuation");
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Something that can redeem invitation tokens.
#[async_trait]
pub trait InvitationAcceptor: Send + Sync {
    async fn accept(&self, token: &str) -> Result<AcceptResult>;
}

#[async_trait]
impl InvitationAcceptor for ApiClient {
    async fn accept(&self, token: &str) -> Result<AcceptResult> {
        self.accept_invitation(token).await
    }
}

/// What happened to an invitation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptFlow {
    /// Redeemed (or already redeemed earlier).
    Done(AcceptResult),
    /// Nobody is signed in; the token was parked for later.
    Deferred(Continuation),
}

/// Accept now, or park the token until the visitor has signed in.
pub async fn accept_or_defer(
    acceptor: &dyn InvitationAcceptor,
    store: &ContinuationStore,
    token: &str,
    title: Option<&str>,
) -> Result<AcceptFlow> {
    match acceptor.accept(token).await {
        Ok(result) => Ok(AcceptFlow::Done(result)),
        Err(ClientError::Unauthorized(_)) => Ok(AcceptFlow::Deferred(store.save(token, title)?)),
        Err(e) => Err(e),
    }
}

/// After sign-in: accept the parked invitation, if any, and forget it.
///
/// The continuation is kept when accepting fails for a reason worth
/// retrying, so a later call can pick it up again.
pub async fn resume(
    acceptor: &dyn InvitationAcceptor,
    store: &ContinuationStore,
) -> Result<Option<AcceptResult>> {
    let Some(continuation) = store.load()? else {
        return Ok(None);
    };

    match acceptor.accept(&continuation.pending_token).await {
        Ok(result) => {
            store.clear()?;
            Ok(Some(result))
        }
        Err(e) if e.is_retryable() || matches!(e, ClientError::Unauthorized(_)) => Err(e),
        Err(e) => {
            warn!(error = %e, "dropping continuation that cannot be accepted");
            store.clear()?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::AcceptStatus;

    /// Answers with a queue of canned results and records the tokens asked.
    struct FakeAcceptor {
        answers: Mutex<Vec<Result<AcceptResult>>>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeAcceptor {
        fn new(answers: Vec<Result<AcceptResult>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InvitationAcceptor for FakeAcceptor {
        async fn accept(&self, token: &str) -> Result<AcceptResult> {
            self.seen.lock().unwrap().push(token.to_string());
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn accepted() -> AcceptResult {
        AcceptResult {
            status: AcceptStatus::Accepted,
            share_id: None,
            role: None,
            url: "http://localhost:8080/collaborate/tok".into(),
        }
    }

    fn store() -> (tempfile::TempDir, ContinuationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContinuationStore::at(dir.path().join("nested").join(FILE_NAME));
        (dir, store)
    }

    #[test]
    fn save_load_clear() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), None);

        let saved = store.save("tok-1", Some("Rental yield")).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));

        store.save("tok-2", None).unwrap();
        assert_eq!(store.load().unwrap().unwrap().pending_token, "tok-2");

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{not json").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn anonymous_accept_is_deferred_then_resumed() {
        let (_dir, store) = store();
        let acceptor = FakeAcceptor::new(vec![
            Err(ClientError::Unauthorized("sign in to accept this invitation".into())),
            Ok(accepted()),
        ]);

        let flow = accept_or_defer(&acceptor, &store, "tok-1", Some("Yield")).await.unwrap();
        assert!(matches!(flow, AcceptFlow::Deferred(ref c) if c.pending_token == "tok-1"));
        assert!(store.load().unwrap().is_some());

        let result = resume(&acceptor, &store).await.unwrap();
        assert_eq!(result, Some(accepted()));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(*acceptor.seen.lock().unwrap(), vec!["tok-1", "tok-1"]);
    }

    #[tokio::test]
    async fn resume_keeps_token_on_transient_failure() {
        let (_dir, store) = store();
        store.save("tok-1", None).unwrap();
        let acceptor = FakeAcceptor::new(vec![Err(ClientError::Status {
            status: 503,
            message: "Storage unavailable".into(),
        })]);

        assert!(resume(&acceptor, &store).await.is_err());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn resume_drops_dead_token() {
        let (_dir, store) = store();
        store.save("tok-1", None).unwrap();
        let acceptor = FakeAcceptor::new(vec![Err(ClientError::Status {
            status: 404,
            message: "invitation does not exist".into(),
        })]);

        assert!(resume(&acceptor, &store).await.is_err());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn nothing_to_resume() {
        let (_dir, store) = store();
        let acceptor = FakeAcceptor::new(Vec::new());
        assert_eq!(resume(&acceptor, &store).await.unwrap(), None);
    }
}
