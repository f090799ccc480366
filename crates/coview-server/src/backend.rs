//! Async access to the synchronous store.
//!
//! Every call runs on the blocking pool under a deadline; a call that misses
//! it is reported as [`ServerError::Timeout`] instead of holding the request.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use coview_store::Database;
use tracing::{error, warn};

use crate::error::ServerError;

#[derive(Clone)]
pub struct Backend {
    db: Arc<Mutex<Database>>,
    timeout: Duration,
}

impl Backend {
    pub fn new(db: Database, timeout: Duration) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            timeout,
        }
    }

    /// Run `f` against the database on a blocking thread.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> coview_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))?;
            f(&mut *guard).map_err(ServerError::from)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!(error = %join_error, "store task failed");
                Err(ServerError::Internal("store task failed".to_string()))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(ServerError::Timeout)
            }
        }
    }
}
