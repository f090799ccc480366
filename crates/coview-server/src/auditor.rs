//! Fire-and-forget access logging.

use coview_shared::AccessAction;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::resolver::Resolution;

#[derive(Clone)]
pub struct AccessAuditor {
    backend: Backend,
}

impl AccessAuditor {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Record an access to a resolved share without holding up the request.
    ///
    /// Fallback shares exist nowhere and are never logged.
    pub fn log(
        &self,
        resolution: &Resolution,
        actor_id: Option<&str>,
        action: AccessAction,
        client_context: String,
    ) -> Option<JoinHandle<()>> {
        if resolution.is_degraded() {
            return None;
        }
        Some(self.record(resolution.share.id, actor_id, action, client_context))
    }

    /// Spawn the log write. Failures are reported at `warn` and dropped; the
    /// handle is only awaited in tests.
    pub fn record(
        &self,
        share_id: Uuid,
        actor_id: Option<&str>,
        action: AccessAction,
        client_context: String,
    ) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let actor_id = actor_id.map(str::to_string);

        tokio::spawn(async move {
            let result = backend
                .call(move |db| {
                    db.log_access(share_id, actor_id.as_deref(), action, &client_context)
                })
                .await;

            match result {
                Ok(entry) => debug!(share_id = %share_id, action = %entry.action, "access logged"),
                Err(e) => warn!(share_id = %share_id, %action, error = %e, "access log write failed"),
            }
        })
    }
}
