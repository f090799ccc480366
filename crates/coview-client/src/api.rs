//! Typed HTTP client for the Coview server.

use chrono::{DateTime, Utc};
use coview_shared::constants::{USER_EMAIL_HEADER, USER_ID_HEADER};
use coview_shared::links;
use coview_shared::{AudienceType, Identity, Permissions, ReactionKind, Role};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// A share as the owner sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub id: Uuid,
    pub resource_id: String,
    pub owner_id: String,
    pub share_token: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Shareable URL; absent on the share embedded in a view.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateShare {
    pub resource_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendInvitation {
    pub email: String,
    pub role: Role,
    pub audience_type: AudienceType,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationInfo {
    pub id: Uuid,
    pub share_id: Uuid,
    pub invitee_email: String,
    pub role: Role,
    pub invitation_token: String,
    pub accepted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptStatus {
    Accepted,
    AlreadyAccepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResult {
    pub status: AcceptStatus,
    pub share_id: Option<Uuid>,
    pub role: Option<Role>,
    pub url: String,
}

/// A comment to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl NewComment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            parent_id: None,
        }
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn reply_to(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTotal {
    pub kind: ReactionKind,
    pub count: u32,
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub id: Uuid,
    pub share_id: Uuid,
    pub author_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present on comments delivered inside a view.
    #[serde(default)]
    pub reactions: Vec<ReactionTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry {
    #[serde(flatten)]
    pub comment: CommentEntry,
    pub replies: Vec<CommentEntry>,
}

/// Everything needed to render a shared view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedView {
    pub share: ShareInfo,
    pub url: String,
    /// The link did not resolve; a view-only demo is shown instead.
    pub degraded: bool,
    pub fallback_reason: Option<String>,
    pub invitation_role: Option<Role>,
    pub permissions: Permissions,
    pub threads: Vec<ThreadEntry>,
    pub total_threads: usize,
    pub thread_available: bool,
    pub simulation: Option<serde_json::Value>,
}

/// Display options for [`ApiClient::view`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOptions {
    pub limit: Option<usize>,
    pub priority: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Applied,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionUpdate {
    pub outcome: ToggleOutcome,
    pub reactions: Vec<ReactionTotal>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client bound to one server and, optionally, one signed-in user.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    identity: Option<Identity>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            identity: None,
        }
    }

    /// Send requests as `identity` from now on.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(identity) = &self.identity {
            builder = builder.header(USER_ID_HEADER, &identity.id);
            if let Some(email) = &identity.email {
                builder = builder.header(USER_EMAIL_HEADER, email);
            }
        }
        builder
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        check(response).await?.json::<T>().await.map_err(ClientError::from)
    }

    pub async fn health(&self) -> Result<bool> {
        let response = self.request(Method::GET, "/health").send().await?;
        Ok(response.status().is_success())
    }

    pub async fn create_share(&self, share: &CreateShare) -> Result<ShareInfo> {
        self.send(self.request(Method::POST, "/shares").json(share))
            .await
    }

    /// The caller's share for `resource_id`, created on first use.
    pub async fn get_or_create_share(&self, resource_id: &str, title: &str) -> Result<ShareInfo> {
        let body = serde_json::json!({ "resource_id": resource_id, "title": title });
        self.send(self.request(Method::POST, "/shares/get-or-create").json(&body))
            .await
    }

    pub async fn my_shares(&self) -> Result<Vec<ShareInfo>> {
        self.send(self.request(Method::GET, "/shares")).await
    }

    pub async fn send_invitation(
        &self,
        share_id: Uuid,
        invitation: &SendInvitation,
    ) -> Result<InvitationInfo> {
        let path = format!("/shares/{share_id}/invitations");
        self.send(self.request(Method::POST, &path).json(invitation))
            .await
    }

    /// Accept an invitation, given its token or its full link. Fails with
    /// [`ClientError::Unauthorized`] when nobody is signed in.
    pub async fn accept_invitation(&self, token: &str) -> Result<AcceptResult> {
        let token = bare_token(token);
        let path = format!("/invitations/{token}/accept");
        self.send(self.request(Method::POST, &path)).await
    }

    /// Load a shared view by token or by full link.
    pub async fn view(&self, token: &str, options: ViewOptions) -> Result<SharedView> {
        let token = bare_token(token);
        let mut builder = self.request(Method::GET, &format!("/collaborate/{token}"));
        if let Some(limit) = options.limit {
            builder = builder.query(&[("limit", limit.to_string())]);
        }
        if options.priority {
            builder = builder.query(&[("priority", "true")]);
        }
        let view: SharedView = self.send(builder).await?;
        debug!(share_id = %view.share.id, degraded = view.degraded, "view loaded");
        Ok(view)
    }

    pub async fn post_comment(&self, token: &str, comment: &NewComment) -> Result<CommentEntry> {
        let path = format!("/collaborate/{token}/comments");
        self.send(self.request(Method::POST, &path).json(comment))
            .await
    }

    pub async fn toggle_reaction(
        &self,
        comment_id: Uuid,
        kind: ReactionKind,
        token: Option<&str>,
    ) -> Result<ReactionUpdate> {
        let path = format!("/comments/{comment_id}/reactions");
        let body = serde_json::json!({ "kind": kind, "token": token });
        self.send(self.request(Method::POST, &path).json(&body))
            .await
    }
}

/// The token inside a pasted share link, or the input itself.
fn bare_token(input: &str) -> &str {
    links::token_from_url(input).unwrap_or(input)
}

/// Turn error statuses into [`ClientError`], keeping the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(message));
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_payload_deserializes() {
        let payload = serde_json::json!({
            "share": {
                "id": "6f1c5d2e-8a3b-4c1d-9e2f-0a1b2c3d4e5f",
                "resource_id": "prop-1",
                "owner_id": "owner",
                "share_token": "tok",
                "title": "Rental yield",
                "description": null,
                "created_at": "2026-01-01T00:00:00.000000Z",
                "expires_at": null
            },
            "url": "http://localhost:8080/collaborate/tok",
            "degraded": false,
            "fallback_reason": null,
            "invitation_role": "commenter",
            "permissions": { "role": "commenter", "can_view": true, "can_comment": true, "can_modify_inputs": false },
            "threads": [{
                "id": "0b1c5d2e-8a3b-4c1d-9e2f-0a1b2c3d4e5f",
                "share_id": "6f1c5d2e-8a3b-4c1d-9e2f-0a1b2c3d4e5f",
                "author_id": "u1",
                "content": "vacancy?",
                "tags": ["risk"],
                "parent_id": null,
                "created_at": "2026-01-01T00:00:00.000000Z",
                "updated_at": "2026-01-01T00:00:00.000000Z",
                "reactions": [{ "kind": "question", "count": 2, "mine": false }],
                "replies": []
            }],
            "total_threads": 1,
            "thread_available": true,
            "simulation": null
        });

        let view: SharedView = serde_json::from_value(payload).unwrap();
        assert!(view.permissions.can_comment);
        assert_eq!(view.invitation_role, Some(Role::Commenter));
        assert_eq!(view.threads[0].comment.tags, vec!["risk".to_string()]);
        assert_eq!(view.threads[0].comment.reactions[0].count, 2);
        assert!(view.share.url.is_none());
    }

    #[test]
    fn links_and_tokens_are_both_accepted() {
        assert_eq!(bare_token("abc123"), "abc123");
        assert_eq!(
            bare_token("https://coview.example.com/collaborate/abc123"),
            "abc123"
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
        assert!(client.identity().is_none());

        let client = client.with_identity(Identity::new("u1"));
        assert_eq!(client.identity().map(|i| i.id.as_str()), Some("u1"));
    }
}
