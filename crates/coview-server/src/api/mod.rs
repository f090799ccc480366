//! HTTP surface.
//!
//! Owner endpoints live under `/shares`, invitation redemption under
//! `/invitations`, and everything reached through a shareable URL under
//! `/collaborate/:token`. Comment-level changes are addressed by comment id.

mod collaborate;
mod comments;
mod invitations;
mod shares;


use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use coview_shared::{links, Capability, Identity, Permissions};
use chrono::Utc;
use coview_store::{Database, Share};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auditor::AccessAuditor;
use crate::backend::Backend;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::identity::Caller;
use crate::rate_limit::{rate_limit_middleware, Operation, RateKey, RateLimiter};
use crate::resolver::AccessResolver;

/// Request bodies are small JSON documents; simulation snapshots are the
/// largest of them.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub resolver: AccessResolver,
    pub auditor: AccessAuditor,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let backend = Backend::new(db, config.store_timeout);
        Self {
            resolver: AccessResolver::new(backend.clone()),
            auditor: AccessAuditor::new(backend.clone()),
            rate_limiter: RateLimiter::for_server(
                config.rate_limit_per_sec,
                config.rate_limit_burst,
            ),
            backend,
            config: Arc::new(config),
        }
    }

    /// Shareable URL for a share or invitation token.
    fn url(&self, token: &str) -> String {
        links::share_url(&self.config.public_origin, token)
    }

    /// Take one token from the caller's bucket for `operation`.
    async fn limit(&self, caller: &Caller, operation: Operation) -> Result<(), ServerError> {
        let key = RateKey::new(caller.subject(), operation);
        if self.rate_limiter.check(&key).await {
            Ok(())
        } else {
            warn!(subject = %key.subject, ?operation, "Rate limit exceeded");
            Err(ServerError::RateLimited)
        }
    }

    /// Load a share the caller owns.
    async fn owned_share(&self, share_id: Uuid, identity: &Identity) -> Result<Share, ServerError> {
        let share = self.backend.call(move |db| db.get_share(share_id)).await?;
        if share.owner_id != identity.id {
            return Err(ServerError::Forbidden(
                "only the owner can manage this share".to_string(),
            ));
        }
        Ok(share)
    }
}

fn require(permissions: &Permissions, capability: Capability) -> Result<(), ServerError> {
    if permissions.allows(capability) {
        return Ok(());
    }
    let action = match capability {
        Capability::View => "view this share",
        Capability::Comment => "comment on this share",
        Capability::ModifyInputs => "change the simulation inputs",
    };
    Err(ServerError::Forbidden(format!("your role does not allow you to {action}")))
}

/// Expired shares accept no further changes.
fn ensure_live(share: &Share) -> Result<(), ServerError> {
    if share.is_expired(Utc::now()) {
        return Err(ServerError::Forbidden("this share has expired".to_string()));
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/shares", get(shares::list).post(shares::create))
        .route("/shares/get-or-create", post(shares::get_or_create))
        .route("/shares/by-resource/:resource_id", get(shares::by_resource))
        .route("/shares/:share_id/resource", put(shares::backfill_resource))
        .route(
            "/shares/:share_id/invitations",
            get(invitations::list).post(invitations::send),
        )
        .route("/shares/:share_id/access-log", get(shares::access_log))
        .route("/invitations/:token/accept", post(invitations::accept))
        .route("/collaborate/:token", get(collaborate::view))
        .route("/collaborate/:token/comments", post(collaborate::post_comment))
        .route(
            "/collaborate/:token/simulation",
            get(collaborate::download_simulation).put(collaborate::put_simulation),
        )
        .route(
            "/comments/:comment_id",
            patch(comments::edit).delete(comments::delete),
        )
        .route("/comments/:comment_id/reactions", post(comments::toggle_reaction))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
