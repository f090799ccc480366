//! Changes addressed by comment id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use coview_shared::{AccessAction, Capability, ReactionKind};
use coview_store::{Comment, ReactionCount, Share, Toggle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ensure_live, require, AppState};
use crate::error::ServerError;
use crate::identity::Caller;
use crate::rate_limit::Operation;

#[derive(Deserialize)]
pub(super) struct EditCommentRequest {
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
pub(super) struct ReactionRequest {
    kind: ReactionKind,
    /// Token the caller opened the share with, so an invitation role it
    /// carries counts.
    #[serde(default)]
    token: Option<String>,
}

#[derive(Serialize)]
pub(super) struct ReactionResponse {
    outcome: Toggle,
    reactions: Vec<ReactionCount>,
}

impl AppState {
    /// The share a comment belongs to, refusing expired shares.
    async fn live_share_of(&self, comment_id: Uuid) -> Result<Share, ServerError> {
        let share = self
            .backend
            .call(move |db| {
                let comment = db.get_comment(comment_id)?;
                db.get_share(comment.share_id)
            })
            .await?;
        ensure_live(&share)?;
        Ok(share)
    }
}

pub(super) async fn edit(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    caller: Caller,
    Json(req): Json<EditCommentRequest>,
) -> Result<Json<Comment>, ServerError> {
    let author_id = caller.require("edit comments")?.id.clone();
    state.live_share_of(comment_id).await?;

    let comment = state
        .backend
        .call(move |db| db.edit_comment(comment_id, &author_id, &req.content, &req.tags))
        .await?;

    state.auditor.record(
        comment.share_id,
        caller.user_id(),
        AccessAction::Edit,
        caller.client_context(),
    );

    Ok(Json(comment))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    caller: Caller,
) -> Result<StatusCode, ServerError> {
    let author_id = caller.require("delete comments")?.id.clone();
    let share_id = state.live_share_of(comment_id).await?.id;

    state
        .backend
        .call(move |db| db.delete_comment(comment_id, &author_id))
        .await?;

    state.auditor.record(
        share_id,
        caller.user_id(),
        AccessAction::Edit,
        caller.client_context(),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Flip the caller's reaction on a comment and return the fresh totals.
pub(super) async fn toggle_reaction(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    caller: Caller,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<ReactionResponse>, ServerError> {
    let identity = caller.require("react")?;
    state.limit(&caller, Operation::React).await?;

    let share = state.live_share_of(comment_id).await?;

    let invitation_role = match req.token.as_deref() {
        Some(token) => {
            let resolution = state.resolver.resolve(token).await;
            if resolution.share.id == share.id {
                resolution.invitation_role_for(Some(identity))
            } else {
                None
            }
        }
        None => None,
    };
    let permissions = state
        .resolver
        .share_permissions(&share, invitation_role, Some(identity))
        .await;
    require(&permissions, Capability::Comment)?;

    let author_id = identity.id.clone();
    let kind = req.kind;
    let (outcome, reactions) = state
        .backend
        .call(move |db| {
            let outcome = db.toggle_reaction(comment_id, &author_id, kind)?;
            let reactions = db.comment_reaction_counts(comment_id, Some(&author_id))?;
            Ok((outcome, reactions))
        })
        .await?;

    Ok(Json(ReactionResponse { outcome, reactions }))
}
