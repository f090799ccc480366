//! Everything reached through a shareable URL.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use coview_shared::{AccessAction, Capability, Permissions, Role};
use coview_store::thread::{build_threads, prioritize, visible};
use coview_store::{Comment, ReactionCount, Share, SimulationSnapshot, Thread};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{require, AppState};
use crate::error::ServerError;
use crate::identity::Caller;
use crate::rate_limit::Operation;
use crate::resolver::{FallbackReason, Resolution};

#[derive(Deserialize)]
pub(super) struct ViewQuery {
    /// Show at most this many top-level threads.
    limit: Option<usize>,
    /// High-attention threads first.
    #[serde(default)]
    priority: bool,
}

#[derive(Deserialize)]
pub(super) struct PostCommentRequest {
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub(super) struct SimulationRequest {
    #[serde(default)]
    inputs: serde_json::Value,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    cash_flows: serde_json::Value,
}

#[derive(Serialize)]
pub(super) struct CommentView {
    #[serde(flatten)]
    comment: Comment,
    reactions: Vec<ReactionCount>,
}

#[derive(Serialize)]
pub(super) struct ThreadView {
    #[serde(flatten)]
    comment: CommentView,
    replies: Vec<CommentView>,
}

#[derive(Serialize)]
pub(super) struct ViewResponse {
    share: Share,
    url: String,
    /// Set when the token did not resolve and a demo share is shown.
    degraded: bool,
    fallback_reason: Option<FallbackReason>,
    invitation_role: Option<Role>,
    permissions: Permissions,
    threads: Vec<ThreadView>,
    /// Top-level threads before display truncation.
    total_threads: usize,
    /// `false` when the thread could not be loaded and is shown empty.
    thread_available: bool,
    simulation: Option<SimulationSnapshot>,
}

type Counts = HashMap<Uuid, Vec<ReactionCount>>;

fn comment_view(comment: Comment, counts: &mut Counts) -> CommentView {
    CommentView {
        reactions: counts.remove(&comment.id).unwrap_or_default(),
        comment,
    }
}

fn thread_view(thread: Thread, counts: &mut Counts) -> ThreadView {
    ThreadView {
        comment: comment_view(thread.comment, counts),
        replies: thread
            .replies
            .into_iter()
            .map(|reply| comment_view(reply, counts))
            .collect(),
    }
}

impl AppState {
    /// Comments and reaction totals of a share. Reads degrade to an empty
    /// thread when the store fails.
    async fn load_thread(
        &self,
        share_id: Uuid,
        viewer: Option<&str>,
    ) -> Option<(Vec<Comment>, Counts)> {
        let viewer = viewer.map(str::to_string);
        let loaded = self
            .backend
            .call(move |db| {
                let comments = db.list_comments(share_id)?;
                let counts = db.reaction_counts(share_id, viewer.as_deref())?;
                Ok((comments, counts))
            })
            .await;

        match loaded {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                warn!(share_id = %share_id, error = %e, "thread unavailable, showing it empty");
                None
            }
        }
    }

    /// The snapshot the share's owner saved for its resource.
    async fn load_simulation(&self, share: &Share) -> Option<SimulationSnapshot> {
        let resource_id = share.resource_id.clone();
        let owner_id = share.owner_id.clone();
        match self
            .backend
            .call(move |db| db.get_simulation(&resource_id, &owner_id))
            .await
        {
            Ok(snapshot) => Some(snapshot),
            Err(ServerError::NotFound(_)) => None,
            Err(e) => {
                warn!(error = %e, "simulation snapshot unavailable");
                None
            }
        }
    }

    /// Resolve a token for a write, refusing the fallback share.
    async fn resolve_for_write(&self, token: &str) -> Result<Resolution, ServerError> {
        let resolution = self.resolver.resolve(token).await;
        if resolution.is_degraded() {
            return Err(ServerError::Forbidden(
                "this link is view-only".to_string(),
            ));
        }
        Ok(resolution)
    }
}

pub(super) async fn view(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<ViewQuery>,
    caller: Caller,
) -> Result<Json<ViewResponse>, ServerError> {
    state.limit(&caller, Operation::Resolve).await?;

    let resolution = state.resolver.resolve(&token).await;
    state.auditor.log(
        &resolution,
        caller.user_id(),
        AccessAction::View,
        caller.client_context(),
    );

    let permissions = state
        .resolver
        .permissions(&resolution, caller.identity.as_ref())
        .await;

    let (comments, mut counts, thread_available) = if resolution.is_degraded() {
        (Vec::new(), Counts::new(), true)
    } else {
        match state.load_thread(resolution.share.id, caller.user_id()).await {
            Some((comments, counts)) => (comments, counts, true),
            None => (Vec::new(), Counts::new(), false),
        }
    };

    let mut threads = build_threads(comments);
    if query.priority {
        threads = prioritize(threads);
    }
    let total_threads = threads.len();
    let shown = visible(&threads, query.limit.or(state.config.thread_display_limit)).len();
    threads.truncate(shown);

    let simulation = if resolution.is_degraded() {
        None
    } else {
        state.load_simulation(&resolution.share).await
    };

    let url = state.url(&token);
    Ok(Json(ViewResponse {
        degraded: resolution.is_degraded(),
        fallback_reason: resolution.fallback_reason(),
        invitation_role: resolution.invitation_role_for(caller.identity.as_ref()),
        threads: threads
            .into_iter()
            .map(|thread| thread_view(thread, &mut counts))
            .collect(),
        share: resolution.share,
        url,
        permissions,
        total_threads,
        thread_available,
        simulation,
    }))
}

pub(super) async fn post_comment(
    State(state): State<AppState>,
    Path(token): Path<String>,
    caller: Caller,
    Json(req): Json<PostCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ServerError> {
    let identity = caller.require("comment")?;
    state.limit(&caller, Operation::PostComment).await?;

    let resolution = state.resolve_for_write(&token).await?;
    let permissions = state.resolver.permissions(&resolution, Some(identity)).await;
    require(&permissions, Capability::Comment)?;

    let share_id = resolution.share.id;
    let author_id = identity.id.clone();
    let comment = state
        .backend
        .call(move |db| {
            db.post_comment(share_id, &author_id, &req.content, &req.tags, req.parent_id)
        })
        .await?;

    state.auditor.log(
        &resolution,
        Some(&identity.id),
        AccessAction::Comment,
        caller.client_context(),
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

pub(super) async fn put_simulation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    caller: Caller,
    Json(req): Json<SimulationRequest>,
) -> Result<Json<SimulationSnapshot>, ServerError> {
    let identity = caller.require("change the simulation")?;

    let resolution = state.resolve_for_write(&token).await?;
    let permissions = state.resolver.permissions(&resolution, Some(identity)).await;
    require(&permissions, Capability::ModifyInputs)?;

    let resource_id = resolution.share.resource_id.clone();
    let owner_id = resolution.share.owner_id.clone();
    let snapshot = state
        .backend
        .call(move |db| {
            db.put_simulation(&resource_id, &owner_id, req.inputs, req.result, req.cash_flows)
        })
        .await?;

    state.auditor.log(
        &resolution,
        Some(&identity.id),
        AccessAction::Edit,
        caller.client_context(),
    );

    Ok(Json(snapshot))
}

/// The snapshot on its own, for export. Recorded as a download.
pub(super) async fn download_simulation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    caller: Caller,
) -> Result<Json<SimulationSnapshot>, ServerError> {
    state.limit(&caller, Operation::Resolve).await?;

    let resolution = state.resolver.resolve(&token).await;
    if resolution.is_degraded() {
        return Err(ServerError::NotFound(
            "no simulation behind this link".to_string(),
        ));
    }

    let resource_id = resolution.share.resource_id.clone();
    let owner_id = resolution.share.owner_id.clone();
    let snapshot = state
        .backend
        .call(move |db| db.get_simulation(&resource_id, &owner_id))
        .await
        .map_err(|e| match e {
            ServerError::NotFound(_) => {
                ServerError::NotFound("no simulation has been saved yet".to_string())
            }
            other => other,
        })?;

    state.auditor.log(
        &resolution,
        caller.user_id(),
        AccessAction::Download,
        caller.client_context(),
    );

    Ok(Json(snapshot))
}
