use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use coview_shared::{AudienceType, Role, TokenCodec};
use coview_store::{AcceptOutcome, Invitation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{ensure_live, AppState};
use crate::error::ServerError;
use crate::identity::Caller;
use crate::rate_limit::{Operation, RateKey};

#[derive(Deserialize)]
pub(super) struct SendInvitationRequest {
    email: String,
    role: Role,
    #[serde(default)]
    audience_type: AudienceType,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
pub(super) struct InvitationResponse {
    #[serde(flatten)]
    invitation: Invitation,
    /// Link to hand to the invitee; delivery happens elsewhere.
    url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum AcceptStatus {
    Accepted,
    AlreadyAccepted,
}

#[derive(Serialize)]
pub(super) struct AcceptResponse {
    status: AcceptStatus,
    share_id: Option<Uuid>,
    role: Option<Role>,
    /// Where to continue after accepting.
    url: String,
}

pub(super) async fn send(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
    caller: Caller,
    Json(req): Json<SendInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ServerError> {
    let identity = caller.require("invite people")?;
    state.owned_share(share_id, identity).await?;
    state.limit(&caller, Operation::SendInvitation).await?;

    let invited_by = identity.id.clone();
    let invitation = state
        .backend
        .call(move |db| {
            db.send_invitation(
                share_id,
                &invited_by,
                &req.email,
                req.role,
                req.audience_type,
                req.message.as_deref(),
            )
        })
        .await?;

    info!(
        invitation_id = %invitation.id,
        share_id = %share_id,
        role = %invitation.role,
        token = %TokenCodec::fingerprint(&invitation.invitation_token),
        "invitation sent"
    );

    let url = state.url(&invitation.invitation_token);
    Ok((StatusCode::CREATED, Json(InvitationResponse { invitation, url })))
}

pub(super) async fn list(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
    caller: Caller,
) -> Result<Json<Vec<Invitation>>, ServerError> {
    let identity = caller.require("see invitations")?;
    state.owned_share(share_id, identity).await?;

    let invitations = state
        .backend
        .call(move |db| db.list_invitations(share_id))
        .await?;

    Ok(Json(invitations))
}

/// Redeem an invitation. Anonymous callers get 401 so the client can keep
/// the token and come back after signing in.
pub(super) async fn accept(
    State(state): State<AppState>,
    Path(token): Path<String>,
    caller: Caller,
) -> Result<Json<AcceptResponse>, ServerError> {
    let user_id = caller.require("accept this invitation")?.id.clone();

    let lookup = token.clone();
    let share = state
        .backend
        .call(move |db| {
            let invitation = db.get_invitation_by_token(&lookup)?;
            db.get_share(invitation.share_id)
        })
        .await
        .map_err(|e| match e {
            ServerError::NotFound(_) => {
                ServerError::NotFound("invitation does not exist".to_string())
            }
            other => other,
        })?;
    ensure_live(&share)?;

    let lookup = token.clone();
    let outcome = state
        .backend
        .call(move |db| db.accept_invitation(&lookup, &user_id))
        .await?;

    // The accepted role shows up on the next view load; start it afresh.
    state
        .rate_limiter
        .reset(&RateKey::new(caller.subject(), Operation::Resolve))
        .await;

    let url = state.url(&token);
    match outcome {
        AcceptOutcome::Accepted(invitation) => Ok(Json(AcceptResponse {
            status: AcceptStatus::Accepted,
            share_id: Some(invitation.share_id),
            role: Some(invitation.role),
            url,
        })),
        AcceptOutcome::AlreadyAccepted => Ok(Json(AcceptResponse {
            status: AcceptStatus::AlreadyAccepted,
            share_id: None,
            role: None,
            url,
        })),
        AcceptOutcome::NotFound => Err(ServerError::NotFound(
            "invitation does not exist".to_string(),
        )),
    }
}
