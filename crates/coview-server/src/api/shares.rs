//! Owner-side share management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use coview_store::{AccessLogEntry, NewShare, Share};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::error::ServerError;
use crate::identity::Caller;

const DEFAULT_ACCESS_LOG_LIMIT: u32 = 100;
const MAX_ACCESS_LOG_LIMIT: u32 = 1000;

#[derive(Deserialize)]
pub(super) struct CreateShareRequest {
    #[serde(default)]
    resource_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub(super) struct GetOrCreateRequest {
    resource_id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct BackfillRequest {
    resource_id: String,
}

#[derive(Deserialize)]
pub(super) struct AccessLogQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
pub(super) struct ShareResponse {
    #[serde(flatten)]
    share: Share,
    url: String,
}

#[derive(Serialize)]
pub(super) struct BackfillResponse {
    updated: bool,
}

impl AppState {
    fn share_response(&self, share: Share) -> ShareResponse {
        ShareResponse {
            url: self.url(&share.share_token),
            share,
        }
    }
}

pub(super) async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), ServerError> {
    let owner_id = caller.require("share a simulation")?.id.clone();

    let share = state
        .backend
        .call(move |db| {
            db.create_share(NewShare {
                resource_id: req.resource_id,
                owner_id,
                title: req.title,
                description: req.description,
                expires_at: req.expires_at,
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(state.share_response(share))))
}

pub(super) async fn get_or_create(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<GetOrCreateRequest>,
) -> Result<Json<ShareResponse>, ServerError> {
    let owner_id = caller.require("share a simulation")?.id.clone();

    let share = state
        .backend
        .call(move |db| {
            db.get_or_create_share(
                &req.resource_id,
                &owner_id,
                req.title.as_deref().unwrap_or_default(),
            )
        })
        .await?;

    Ok(Json(state.share_response(share)))
}

pub(super) async fn list(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ShareResponse>>, ServerError> {
    let owner_id = caller.require("list your shares")?.id.clone();

    let shares = state
        .backend
        .call(move |db| db.list_shares_for_owner(&owner_id))
        .await?;

    Ok(Json(
        shares
            .into_iter()
            .map(|share| state.share_response(share))
            .collect(),
    ))
}

pub(super) async fn by_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    caller: Caller,
) -> Result<Json<ShareResponse>, ServerError> {
    let owner_id = caller.require("look up your shares")?.id.clone();

    let share = state
        .backend
        .call(move |db| db.get_share_by_resource(&resource_id, &owner_id))
        .await?;

    Ok(Json(state.share_response(share)))
}

pub(super) async fn backfill_resource(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
    caller: Caller,
    Json(req): Json<BackfillRequest>,
) -> Result<Json<BackfillResponse>, ServerError> {
    let identity = caller.require("update a share")?;
    state.owned_share(share_id, identity).await?;

    let updated = state
        .backend
        .call(move |db| db.backfill_resource_id(share_id, &req.resource_id))
        .await?;

    Ok(Json(BackfillResponse { updated }))
}

pub(super) async fn access_log(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
    Query(query): Query<AccessLogQuery>,
    caller: Caller,
) -> Result<Json<Vec<AccessLogEntry>>, ServerError> {
    let identity = caller.require("read the access log")?;
    state.owned_share(share_id, identity).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACCESS_LOG_LIMIT)
        .min(MAX_ACCESS_LOG_LIMIT);
    let entries = state
        .backend
        .call(move |db| db.list_access_log(share_id, limit))
        .await?;

    info!(share_id = %share_id, entries = entries.len(), "access log read");
    Ok(Json(entries))
}
