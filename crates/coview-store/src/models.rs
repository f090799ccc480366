//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the API layer.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use coview_shared::constants::{PLACEHOLDER_RESOURCE_IDS, SYNTHETIC_RESOURCE_PREFIX};
use coview_shared::{AccessAction, AudienceType, InvitationStatus, ReactionKind, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Share
// ---------------------------------------------------------------------------

/// One resource exposed for external viewing through a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Share {
    pub id: Uuid,
    /// The shared resource (a simulation result). May be a synthesized
    /// `draft-…` id until the resource is persisted.
    pub resource_id: String,
    pub owner_id: String,
    /// Globally unique, never reused.
    pub share_token: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Past this instant the share is unusable, but it is kept.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Share {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the resource id was synthesized at creation and may still be
    /// backfilled.
    pub fn has_synthetic_resource(&self) -> bool {
        self.resource_id.starts_with(SYNTHETIC_RESOURCE_PREFIX)
    }
}

/// Parameters for [`Database::create_share`](crate::Database::create_share).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewShare {
    pub resource_id: Option<String>,
    pub owner_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Whether a caller-supplied resource id means "not persisted yet".
pub fn is_placeholder_resource(resource_id: &str) -> bool {
    let id = resource_id.trim();
    PLACEHOLDER_RESOURCE_IDS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(id))
}

// ---------------------------------------------------------------------------
// Invitation
// ---------------------------------------------------------------------------

/// An offer of access to a share, bound to an email and a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitation {
    pub id: Uuid,
    pub share_id: Uuid,
    pub invitee_email: String,
    pub role: Role,
    pub audience_type: AudienceType,
    pub invitation_token: String,
    pub status: InvitationStatus,
    pub invited_by: String,
    pub accepted_by: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of redeeming an invitation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This call moved the invitation from pending to accepted.
    Accepted(Invitation),
    /// The invitation had already been accepted; nothing changed.
    AlreadyAccepted,
    /// No invitation carries this token.
    NotFound,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// One message in the discussion thread of a share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub share_id: Uuid,
    pub author_id: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    /// Top-level comment this one replies to.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// One identity's reaction to a comment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub author_id: String,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Applied,
    Removed,
}

/// Aggregate for one reaction value on one comment, computed on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCount {
    pub kind: ReactionKind,
    pub count: u32,
    /// Whether the viewing identity is among the reactors.
    pub mine: bool,
}

// ---------------------------------------------------------------------------
// Access log
// ---------------------------------------------------------------------------

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub id: Uuid,
    pub share_id: Uuid,
    /// `None` for anonymous visitors.
    pub actor_id: Option<String>,
    pub action: AccessAction,
    /// Opaque client description (user agent, client ip, ...).
    pub client_context: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Simulation snapshot
// ---------------------------------------------------------------------------

/// Output of the external simulation engine for one resource. The payloads
/// are displayed as-is and never validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSnapshot {
    pub resource_id: String,
    pub owner_id: String,
    pub inputs: serde_json::Value,
    pub result: serde_json::Value,
    pub cash_flows: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn placeholder_resources() {
        for id in ["", "  ", "new", "TEMP", "undefined", "null"] {
            assert!(is_placeholder_resource(id), "{id:?}");
        }
        assert!(!is_placeholder_resource("prop-1"));
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        let mut share = Share {
            id: Uuid::new_v4(),
            resource_id: "draft-x".into(),
            owner_id: "o".into(),
            share_token: "t".into(),
            title: "T".into(),
            description: None,
            created_at: now,
            expires_at: None,
        };
        assert!(!share.is_expired(now));
        assert!(share.has_synthetic_resource());

        share.expires_at = Some(now - Duration::seconds(1));
        assert!(share.is_expired(now));
        share.expires_at = Some(now + Duration::hours(1));
        assert!(!share.is_expired(now));
    }
}
